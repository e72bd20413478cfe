//! Conversion pipeline: extract -> parse -> cover -> flatten -> render -> merge.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::assemble::assemble;
use crate::book::BookInfo;
use crate::cover::synthesize_cover;
use crate::epub::{extract_epub, parse_package};
use crate::error::Result;
use crate::flatten::flatten_spine;
use crate::render::{ChromiumRenderer, PageRenderer, PageSpec};

/// Producer string written into the output PDF's Info dictionary.
pub const PRODUCER: &str = "epub2pdf (Chromium print engine)";

/// Convert an EPUB to a PDF using the default Chromium renderer.
///
/// The output path defaults to the input path with its extension replaced.
/// Returns the path of the written PDF.
pub fn convert(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    convert_with_renderer(input, output, &ChromiumRenderer::default())
}

/// Convert with an explicit rendering backend.
///
/// The whole run is strictly sequential and works inside one temporary
/// extraction directory, which is removed on every exit path, including
/// failure. No retries anywhere: the first stage error aborts the run.
pub fn convert_with_renderer(
    input: &Path,
    output: Option<&Path>,
    renderer: &dyn PageRenderer,
) -> Result<PathBuf> {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("pdf"),
    };

    let workdir = tempfile::Builder::new().prefix("epub2pdf-").tempdir()?;

    info!("extracting {}", input.display());
    extract_epub(input, workdir.path())?;

    info!("parsing package document");
    let package = parse_package(workdir.path())?;
    info!(
        "title: {}",
        package.metadata.title.as_deref().unwrap_or("Unknown")
    );
    info!(
        "author: {}",
        package.metadata.creator.as_deref().unwrap_or("Unknown")
    );
    info!("chapters: {}", package.spine.len());

    let page = PageSpec::default();

    let cover_pdf = match &package.cover_image {
        Some(image) if image.exists() => {
            info!("creating full-bleed cover page");
            let path = workdir.path().join("_cover.pdf");
            synthesize_cover(image, &path, &page)?;
            Some(path)
        }
        _ => {
            info!("no cover image found, skipping cover page");
            None
        }
    };

    info!("flattening {} spine items into one document", package.spine.len());
    let flattened = flatten_spine(
        &package.spine,
        &package.content_root,
        cover_pdf.is_some(),
        package.metadata.title.as_deref(),
    )?;
    info!("combined {} chapters", flattened.block_count);

    info!("rendering with Chromium print engine");
    let content_bytes = renderer.render(&flattened.path, &page)?;
    let content_pdf = workdir.path().join("_content.pdf");
    fs::write(&content_pdf, &content_bytes)?;

    info!("merging final PDF");
    let pages = assemble(
        cover_pdf.as_deref(),
        &content_pdf,
        &package.metadata,
        &output,
    )?;
    info!("wrote {} ({} pages)", output.display(), pages);

    Ok(output)
}

/// Inspect an archive's metadata without converting it.
pub fn inspect(input: &Path) -> Result<BookInfo> {
    let workdir = tempfile::Builder::new().prefix("epub2pdf-").tempdir()?;
    extract_epub(input, workdir.path())?;
    let package = parse_package(workdir.path())?;

    Ok(BookInfo {
        title: package.metadata.title,
        creator: package.metadata.creator,
        chapters: package.spine.len(),
        cover: package
            .cover_image
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned()),
    })
}
