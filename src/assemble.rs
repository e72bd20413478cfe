//! Final PDF assembly: cover page + rendered content + metadata.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

use crate::book::DocumentMetadata;
use crate::convert::PRODUCER;
use crate::error::{Error, Result};

/// Page-tree attributes that child pages inherit from their parents.
const INHERITED_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Merge the cover page (if present) and the rendered content into `output`,
/// then attach Title/Author/Producer metadata.
///
/// The merge is a whole-document copy: every object of each source survives
/// under a renumbered id, and the content document's `/Names` (named
/// destinations) and `/Outlines` are grafted onto the new catalog. A
/// page-by-page copy would drop named destinations and break in-document
/// navigation.
///
/// Returns the total page count of the written file.
pub fn assemble(
    cover: Option<&Path>,
    content: &Path,
    metadata: &DocumentMetadata,
    output: &Path,
) -> Result<usize> {
    let mut sources = Vec::new();
    if let Some(path) = cover {
        sources.push(Document::load(path)?);
    }
    sources.push(Document::load(content)?);

    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut names: Option<Object> = None;
    let mut outlines: Option<Object> = None;

    let last = sources.len() - 1;
    for (index, mut doc) in sources.into_iter().enumerate() {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // In-document navigation lives in the content document's catalog
        if index == last
            && let Ok(root) = doc.trailer.get(b"Root").and_then(Object::as_reference)
            && let Ok(catalog) = doc.get_dictionary(root)
        {
            names = catalog.get(b"Names").ok().cloned();
            outlines = catalog.get(b"Outlines").ok().cloned();
        }

        let source_pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

        for (&id, object) in &doc.objects {
            if !is_page_tree_node(object) {
                merged.objects.insert(id, object.clone());
            }
        }

        // The source page tree is discarded, so attributes pages inherited
        // from it must be pushed down before the dictionaries go stale
        for &page_id in &source_pages {
            for key in INHERITED_KEYS {
                let missing = merged
                    .get_dictionary(page_id)
                    .map(|dict| dict.get(key).is_err())
                    .unwrap_or(false);
                if missing
                    && let Some(value) = inherited_attr(&doc, page_id, key)
                    && let Ok(Object::Dictionary(dict)) = merged.get_object_mut(page_id)
                {
                    dict.set(key, value);
                }
            }
        }

        page_ids.extend(source_pages);
    }

    if page_ids.is_empty() {
        return Err(Error::MergeFailure("no pages in intermediate PDFs".into()));
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
            page.set("Parent", pages_id);
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_ids.len() as i64,
            "Kids" => kids,
        }),
    );

    let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
    if let Some(names) = names {
        catalog.set("Names", names);
    }
    if let Some(outlines) = outlines {
        catalog.set("Outlines", outlines);
        catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
    }
    let catalog_id = merged.add_object(catalog);
    merged.trailer.set("Root", catalog_id);

    let info_id = merged.add_object(info_dictionary(metadata));
    merged.trailer.set("Info", info_id);

    merged.renumber_objects();
    merged.compress();
    merged.save(output)?;

    Ok(page_ids.len())
}

fn info_dictionary(metadata: &DocumentMetadata) -> Dictionary {
    let mut info = dictionary! { "Producer" => Object::string_literal(PRODUCER) };
    if let Some(title) = &metadata.title {
        info.set("Title", Object::string_literal(title.as_str()));
    }
    if let Some(creator) = &metadata.creator {
        info.set("Author", Object::string_literal(creator.as_str()));
    }
    info
}

/// Catalog and page-tree nodes must not be copied into the merged document;
/// everything else (pages, content, fonts, annotations, destinations) is.
fn is_page_tree_node(object: &Object) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .map(|name| name == b"Catalog" || name == b"Pages")
        .unwrap_or(false)
}

/// Look up a page attribute, walking up the source page tree if the page
/// dictionary itself does not carry it.
fn inherited_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
}
