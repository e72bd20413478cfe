//! EPUB archive extraction.

use std::fs::File;
use std::path::Path;

use zip::ZipArchive;

use crate::error::{Error, Result};

/// Fully materialize an EPUB archive (a ZIP container) into `dest`.
///
/// A corrupt or truncated archive is fatal and reported as
/// [`Error::MalformedArchive`].
pub fn extract_epub(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| Error::MalformedArchive(e.to_string()))?;
    archive
        .extract(dest)
        .map_err(|e| Error::MalformedArchive(e.to_string()))?;
    Ok(())
}
