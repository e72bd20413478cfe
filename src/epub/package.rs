//! Package document parsing (container.xml + OPF).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::{DocumentMetadata, ManifestItem, PackageDoc};
use crate::error::{Error, Result};
use crate::util::{normalize_path, strip_bom};

/// Parse a decompressed archive into a [`PackageDoc`].
///
/// Locates `META-INF/container.xml`, follows its rootfile entry to the
/// package document, and builds the manifest, spine, metadata, and cover
/// reference. Malformed XML is fatal; there are no retries.
pub fn parse_package(extract_dir: &Path) -> Result<PackageDoc> {
    let container_path = extract_dir.join("META-INF/container.xml");
    if !container_path.exists() {
        return Err(Error::MalformedArchive(
            "missing META-INF/container.xml".into(),
        ));
    }

    let container = fs::read(&container_path)?;
    let rootfile = parse_container(&container)?;

    let opf_path = normalize_path(&extract_dir.join(&rootfile));
    let opf_dir = opf_path.parent().unwrap_or(extract_dir).to_path_buf();
    let opf_bytes = fs::read(&opf_path).map_err(|_| Error::MissingPackageDocument)?;
    let opf = String::from_utf8_lossy(strip_bom(&opf_bytes)).into_owned();

    parse_opf(&opf, &opf_dir)
}

/// Find the package document path declared in `META-INF/container.xml`.
fn parse_container(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8_lossy(strip_bom(bytes)).into_owned();
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr_value(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::MalformedArchive(format!("container.xml: {e}"))),
            _ => {}
        }
    }

    Err(Error::MissingPackageDocument)
}

/// Parse the OPF package document.
///
/// Elements may carry an arbitrary namespace prefix; matching is done on the
/// local name only. `<item>` and `<itemref>` are accepted both self-closing
/// and as start/end pairs.
fn parse_opf(content: &str, opf_dir: &Path) -> Result<PackageDoc> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut manifest: HashMap<String, ManifestItem> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut metadata = DocumentMetadata::default();
    let mut epub2_cover_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"metadata" => in_metadata = true,
                // First occurrence wins; later titles/creators are ignored
                b"title" if in_metadata && metadata.title.is_none() => {
                    current_element = Some("title");
                    buf_text.clear();
                }
                b"creator" if in_metadata && metadata.creator.is_none() => {
                    current_element = Some("creator");
                    buf_text.clear();
                }
                b"item" => collect_item(&e, opf_dir, &mut manifest),
                b"itemref" => collect_itemref(&e, &mut spine_ids),
                b"meta" => collect_cover_meta(&e, &mut epub2_cover_id),
                _ => {}
            },
            Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"item" => collect_item(&e, opf_dir, &mut manifest),
                b"itemref" => collect_itemref(&e, &mut spine_ids),
                b"meta" => collect_cover_meta(&e, &mut epub2_cover_id),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }
                match current_element.take() {
                    Some("title") => metadata.title = Some(buf_text.clone()),
                    Some("creator") => metadata.creator = Some(buf_text.clone()),
                    None => {}
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::MalformedPackageDocument(e.to_string())),
            _ => {}
        }
    }

    // Entries with unresolved idrefs are silently dropped
    let spine: Vec<ManifestItem> = spine_ids
        .iter()
        .filter_map(|id| manifest.get(id).cloned())
        .collect();

    // EPUB 3 cover-image property takes priority over the EPUB 2 meta element
    let cover_image = manifest
        .values()
        .find(|item| item.has_property("cover-image"))
        .map(|item| item.path.clone())
        .or_else(|| {
            epub2_cover_id
                .and_then(|id| manifest.get(&id))
                .map(|item| item.path.clone())
        });

    Ok(PackageDoc {
        spine,
        manifest,
        metadata,
        content_root: opf_dir.to_path_buf(),
        cover_image,
    })
}

fn collect_item(e: &BytesStart, opf_dir: &Path, manifest: &mut HashMap<String, ManifestItem>) {
    let (Some(id), Some(href)) = (attr_value(e, b"id"), attr_value(e, b"href")) else {
        return;
    };
    let media_type = attr_value(e, b"media-type").unwrap_or_default();
    let properties: Vec<String> = attr_value(e, b"properties")
        .map(|p| p.split_ascii_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    // Hrefs may be percent-encoded; decode before touching the filesystem
    let decoded = percent_decode_str(&href).decode_utf8_lossy().into_owned();
    let path = normalize_path(&opf_dir.join(&decoded));

    manifest.insert(
        id.clone(),
        ManifestItem {
            id,
            href,
            media_type,
            properties,
            path,
        },
    );
}

fn collect_itemref(e: &BytesStart, spine_ids: &mut Vec<String>) {
    if let Some(idref) = attr_value(e, b"idref") {
        spine_ids.push(idref);
    }
}

/// EPUB 2 cover declaration: `<meta name="cover" content="item-id"/>`.
fn collect_cover_meta(e: &BytesStart, cover_id: &mut Option<String>) {
    if cover_id.is_none()
        && attr_value(e, b"name").as_deref() == Some("cover")
        && let Some(content) = attr_value(e, b"content")
    {
        *cover_id = Some(content);
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Extract local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}
