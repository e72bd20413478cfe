//! Text decoding and path/URI helpers.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM handled by encoding_rs), then the encoding named in
/// an `<?xml encoding="..."?>` declaration, and falls back to Windows-1252,
/// which is common in old ebooks.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(name) = extract_xml_encoding(bytes)
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding name from an XML declaration, if any.
///
/// Only the first ~100 bytes are checked.
fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Anchor identifier for a chapter href: the final path segment with its
/// extension removed.
///
/// Both the flattener (block ids) and the link rewriter (targets) go through
/// this function, so rewritten links always agree with the ids they point at.
pub fn anchor_id(href: &str) -> String {
    let name = href.rsplit('/').next().unwrap_or(href);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

const FILE_URI_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// Build a `file://` URI for an absolute path.
///
/// The renderer and the flattened document's stylesheet links both resolve
/// resources through file URIs, so reserved characters must be escaped.
pub fn file_uri(path: &Path) -> String {
    let escaped = utf8_percent_encode(&path.to_string_lossy(), FILE_URI_SET).to_string();
    format!("file://{escaped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert_eq!(strip_bom(&[]), b"");
    }

    #[test]
    fn test_decode_text_utf8() {
        assert_eq!(decode_text("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[test]
    fn test_decode_text_cp1252_fallback() {
        // 0xE9 is e-acute in CP1252 but malformed as UTF-8
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes), "caf\u{e9}");
    }

    #[test]
    fn test_decode_text_declared_encoding() {
        let mut bytes = Vec::from(&b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?><p>caf"[..]);
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</p>");
        assert!(decode_text(&bytes).contains("caf\u{e9}"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d.xhtml")),
            PathBuf::from("/a/c/d.xhtml")
        );
        assert_eq!(
            normalize_path(Path::new("OEBPS/text/../style.css")),
            PathBuf::from("OEBPS/style.css")
        );
    }

    #[test]
    fn test_anchor_id() {
        assert_eq!(anchor_id("chapter2.xhtml"), "chapter2");
        assert_eq!(anchor_id("text/chapter2.xhtml"), "chapter2");
        assert_eq!(anchor_id("cover.html"), "cover");
        assert_eq!(anchor_id("notes"), "notes");
        assert_eq!(anchor_id("a.b.xhtml"), "a.b");
    }

    #[test]
    fn test_file_uri_escapes_spaces() {
        let uri = file_uri(Path::new("/tmp/my book/ch 1.html"));
        assert_eq!(uri, "file:///tmp/my%20book/ch%201.html");
    }
}
