//! Spine flattening: one navigable HTML document from many chapter files.
//!
//! Cross-chapter hyperlinks only work in a paginated PDF if every chapter
//! lives in the same document, so the flattener concatenates body content in
//! spine order, rewrites `*.xhtml` links into same-document anchors, and
//! inserts page-break markers between chapters.
//!
//! The result is written as `.html` (not `.xhtml`): Chromium's strict XHTML
//! parser silently yields an empty body when it meets EPUB namespace residue,
//! which would corrupt pagination.

mod cover_page;

pub use cover_page::is_cover_page;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{info, warn};
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};

use crate::book::ManifestItem;
use crate::error::Result;
use crate::util::{anchor_id, decode_text, file_uri, normalize_path};

pub(crate) static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap());
pub(crate) static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
pub(crate) static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img[\s/>]").unwrap());
pub(crate) static BODY_COVER_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<body[^>]*class="[^"]*cover[^"]*""#).unwrap());

static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?html[^>]*>").unwrap());
static CSS_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<link[^>]+href=["']([^"']+\.css)["']"#).unwrap());
static XHTML_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"href="([^"#]+?\.xhtml)(?:#[^"]*)?""##).unwrap());
static XMLNS_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+xmlns(?::[A-Za-z0-9_.-]+)?="[^"]*""#).unwrap());
static EPUB_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+epub:type="[^"]*""#).unwrap());

/// Print stylesheet enforcing chapter breaks and sane pagination.
const PRINT_CSS: &str = r#"
.chapter-break {
    page-break-before: always !important;
    break-before: page !important;
}
@media print {
    body {
        orphans: 3;
        widows: 3;
    }
    img {
        max-width: 100% !important;
        height: auto !important;
        page-break-inside: avoid;
    }
    p {
        page-break-inside: avoid;
    }
    h1, h2, h3, h4, h5, h6 {
        page-break-after: avoid;
    }
}
"#;

/// The flattened document, written to disk for the renderer.
///
/// Kept as a file rather than passed in-memory: the renderer resolves
/// relative resources (images) against the document's own location.
#[derive(Debug)]
pub struct FlattenedDocument {
    pub path: PathBuf,
    pub block_count: usize,
    /// Resolved stylesheet paths, deduplicated, in lexicographic order.
    pub stylesheets: Vec<PathBuf>,
    /// Href of the cover wrapper page that was elided, if any.
    pub skipped_cover: Option<String>,
}

/// Walk the spine in order and assemble one self-contained HTML document.
///
/// When `skip_cover` is set, the first spine item the detector flags as a
/// cover wrapper is elided; at most one item is ever elided per pass.
pub fn flatten_spine(
    spine: &[ManifestItem],
    content_root: &Path,
    skip_cover: bool,
    title: Option<&str>,
) -> Result<FlattenedDocument> {
    let mut stylesheets: BTreeSet<PathBuf> = BTreeSet::new();
    let mut blocks: Vec<String> = Vec::new();
    let mut skipped_cover: Option<String> = None;

    for item in spine {
        let Ok(bytes) = fs::read(&item.path) else {
            warn!("chapter file missing, skipping: {}", item.href);
            continue;
        };

        if skip_cover && skipped_cover.is_none() && is_cover_page(item) {
            info!("skipping cover wrapper page: {}", item.filename());
            skipped_cover = Some(item.href.clone());
            continue;
        }

        let content = decode_text(&bytes);
        let chapter_dir = item.path.parent().unwrap_or(content_root);
        collect_stylesheets(&content, chapter_dir, &mut stylesheets);

        let body = extract_body(&content);
        let body = rewrite_chapter_links(&body);
        let body = strip_epub_attrs(&body);

        // No forced break before the first surviving chapter
        let class = if blocks.is_empty() {
            "chapter-first"
        } else {
            "chapter-break"
        };
        blocks.push(format!(
            "<div id=\"{}\" class=\"{}\">\n{}\n</div>\n",
            item.anchor_id(),
            class,
            body
        ));
    }

    let css_links: String = stylesheets
        .iter()
        .map(|path| {
            format!(
                "    <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
                file_uri(path)
            )
        })
        .collect();

    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"utf-8\"/>\n    \
         <title>{}</title>\n{}    <style type=\"text/css\">{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        title.unwrap_or("Untitled"),
        css_links,
        PRINT_CSS,
        blocks.concat(),
    );

    let path = content_root.join("_combined.html");
    fs::write(&path, html)?;

    Ok(FlattenedDocument {
        path,
        block_count: blocks.len(),
        stylesheets: stylesheets.into_iter().collect(),
        skipped_cover,
    })
}

/// Pull body content out of a chapter file.
///
/// Falls back to everything after `</head>` (outer html tags stripped), then
/// to the whole file, so a chapter without a well-formed body still renders.
fn extract_body(content: &str) -> String {
    if let Some(caps) = BODY_RE.captures(content) {
        return caps[1].to_string();
    }
    if let Some(m) = HEAD_CLOSE_RE.find(content) {
        return HTML_TAG_RE.replace_all(&content[m.end()..], "").into_owned();
    }
    content.to_string()
}

/// Rewrite `href="chapter.xhtml#frag"` into `href="#chapter"`.
///
/// Chapters no longer exist as separate addressable documents once
/// flattened, so the fragment is discarded and the target becomes the
/// chapter's own anchor. `.html` targets and external URLs pass through.
fn rewrite_chapter_links(body: &str) -> String {
    XHTML_HREF_RE
        .replace_all(body, |caps: &Captures| {
            format!("href=\"#{}\"", anchor_id(&caps[1]))
        })
        .into_owned()
}

/// Drop namespace declarations and `epub:type` attributes.
///
/// Some renderers fail silently on unrecognized namespaced attributes,
/// producing an empty-looking page.
fn strip_epub_attrs(body: &str) -> String {
    let body = XMLNS_ATTR_RE.replace_all(body, "");
    EPUB_TYPE_RE.replace_all(&body, "").into_owned()
}

/// Collect stylesheet references from `<link>` tags whose resolved path
/// exists. Duplicates across chapters collapse; the BTreeSet keeps the final
/// ordering lexicographic by resolved path.
fn collect_stylesheets(content: &str, chapter_dir: &Path, found: &mut BTreeSet<PathBuf>) {
    for caps in CSS_LINK_RE.captures_iter(content) {
        let href = percent_decode_str(&caps[1]).decode_utf8_lossy().into_owned();
        let resolved = normalize_path(&chapter_dir.join(&href));
        if resolved.exists() {
            found.insert(resolved);
        }
    }
}
