//! Data model for a parsed EPUB package.
//!
//! Plain structs passed by value between pipeline stages; there is exactly
//! one EPUB dialect handled, so no trait hierarchy is involved.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::util::anchor_id;

/// One `<item>` entry from the package manifest.
///
/// Immutable after parsing; `id` is unique within a manifest.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    /// Href exactly as declared in the package document.
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
    /// Absolute, normalized on-disk location, resolved against the package
    /// document's directory (not the archive root).
    pub path: PathBuf,
}

impl ManifestItem {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }

    /// Final path segment of the href.
    pub fn filename(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }

    /// Identifier this item's content block carries in the flattened document.
    pub fn anchor_id(&self) -> String {
        anchor_id(&self.href)
    }
}

/// Title/creator extracted from the package metadata.
///
/// First occurrence of each wins; absence is valid and never fails the run.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
}

/// Everything the manifest parser produces for one archive.
#[derive(Debug)]
pub struct PackageDoc {
    /// Reading order: `<itemref>` entries resolved against the manifest, in
    /// declaration order. Unresolved idrefs are dropped.
    pub spine: Vec<ManifestItem>,
    pub manifest: HashMap<String, ManifestItem>,
    pub metadata: DocumentMetadata,
    /// Directory containing the package document; all content paths resolve
    /// relative to it.
    pub content_root: PathBuf,
    /// Cover image location, if the package declares one (EPUB 3
    /// `cover-image` property, or the EPUB 2 `<meta name="cover">` fallback).
    pub cover_image: Option<PathBuf>,
}

/// Summary shown by `--info`, extracted without converting.
#[derive(Debug, Clone)]
pub struct BookInfo {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub chapters: usize,
    /// Filename of the declared cover image, if any.
    pub cover: Option<String>,
}
