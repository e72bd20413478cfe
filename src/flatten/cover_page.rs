//! Cover wrapper page detection.
//!
//! Many EPUBs carry a `cover.xhtml` that does nothing but wrap the cover
//! image in an HTML page. Once a dedicated full-bleed cover page has been
//! generated, rendering that wrapper again produces a duplicate, poorly
//! formatted cover.

use std::fs;

use crate::book::ManifestItem;
use crate::util::decode_text;

use super::{BODY_COVER_CLASS_RE, BODY_RE, IMG_RE, TAG_RE};

/// Decide whether a spine item is a pure wrapper around the cover image.
///
/// Only items whose filename contains "cover" are ever flagged. The body
/// must then contain an image with under 100 characters of stripped text,
/// or carry a "cover" class. Any read failure means "not a cover page".
pub fn is_cover_page(item: &ManifestItem) -> bool {
    if !item.filename().to_ascii_lowercase().contains("cover") {
        return false;
    }

    let Ok(bytes) = fs::read(&item.path) else {
        return false;
    };
    let content = decode_text(&bytes);

    if let Some(caps) = BODY_RE.captures(&content) {
        let body = caps[1].trim();
        let text_len = TAG_RE.replace_all(body, "").trim().chars().count();
        if IMG_RE.is_match(body) && text_len < 100 {
            return true;
        }
    }

    BODY_COVER_CLASS_RE.is_match(&content)
}
