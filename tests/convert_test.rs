//! End-to-end pipeline tests over a programmatically built archive.
//!
//! Rendering is stubbed out so the pipeline can be exercised without a
//! Chromium install; the stub captures the flattened HTML and hands back a
//! fixed two-page PDF for assembly.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use epub2pdf::{Error, PageRenderer, PageSpec, convert_with_renderer};

struct StubRenderer {
    captured: Mutex<Option<String>>,
}

impl StubRenderer {
    fn new() -> Self {
        Self {
            captured: Mutex::new(None),
        }
    }

    fn captured_html(&self) -> String {
        self.captured.lock().unwrap().clone().expect("render was never called")
    }
}

impl PageRenderer for StubRenderer {
    fn render(&self, html: &Path, _page: &PageSpec) -> epub2pdf::Result<Vec<u8>> {
        let content = std::fs::read_to_string(html)?;
        *self.captured.lock().unwrap() = Some(content);
        Ok(content_pdf_bytes(2))
    }
}

/// A minimal n-page PDF with a /Names tree, standing in for Chromium output.
fn content_pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![Operation::new("q", vec![]), Operation::new("Q", vec![])],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        kids.push(
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 396.into(), 612.into()],
            })
            .into(),
        );
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
        }),
    );

    let dests_id = doc.add_object(dictionary! {
        "Names" => vec![Object::string_literal("chapter2"), Object::Null],
    });
    let names_id = doc.add_object(dictionary! { "Dests" => dests_id });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Names" => names_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut Cursor::new(&mut bytes)).unwrap();
    bytes
}

fn cover_png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(60, 100, image::Rgb([12, 24, 200]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Three-chapter archive: a cover wrapper page at spine position 0, a real
/// cover image declared via manifest property, and two content chapters.
fn write_fixture_epub(path: &Path) {
    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Fixture Book</dc:title>
    <dc:creator>Fixture Author</dc:creator>
  </metadata>
  <manifest>
    <item id="cover-img" href="images/cover.png" media-type="image/png" properties="cover-image"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="cover"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    const COVER: &str = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Cover</title></head>
<body><div><img src="images/cover.png" alt="the cover image"/></div></body>
</html>"#;

    const CHAPTER1: &str = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><link rel="stylesheet" type="text/css" href="style.css"/></head>
<body epub:type="bodymatter">
<h1>Chapter One</h1>
<p>See <a href="chapter2.xhtml#section-a">the next chapter</a>.</p>
</body>
</html>"#;

    const CHAPTER2: &str = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><link rel="stylesheet" type="text/css" href="style.css"/></head>
<body>
<h1>Chapter Two</h1>
<p id="section-a">Arrival point.</p>
</body>
</html>"#;

    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let mut add = |name: &str, data: &[u8]| {
        zip.start_file(name, options).unwrap();
        zip.write_all(data).unwrap();
    };
    add("mimetype", b"application/epub+zip");
    add(
        "META-INF/container.xml",
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    );
    add("OEBPS/content.opf", OPF.as_bytes());
    add("OEBPS/cover.xhtml", COVER.as_bytes());
    add("OEBPS/chapter1.xhtml", CHAPTER1.as_bytes());
    add("OEBPS/chapter2.xhtml", CHAPTER2.as_bytes());
    add("OEBPS/style.css", b"p { margin: 0.5em 0; }");
    add("OEBPS/images/cover.png", &cover_png_bytes());
    zip.finish().unwrap();
}

#[test]
fn converts_fixture_archive_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fixture.epub");
    write_fixture_epub(&input);

    let renderer = StubRenderer::new();
    let output = convert_with_renderer(&input, None, &renderer).unwrap();

    // Output path defaults to the input with its extension replaced
    assert_eq!(output, dir.path().join("fixture.pdf"));
    assert!(output.exists());

    let html = renderer.captured_html();

    // The cover wrapper was elided; both content chapters survive in order
    assert!(!html.contains(r#"<div id="cover" "#));
    assert!(html.contains(r#"<div id="chapter1" class="chapter-first">"#));
    assert!(html.contains(r#"<div id="chapter2" class="chapter-break">"#));

    // The TOC link was rewritten to a same-document anchor, fragment dropped
    assert!(html.contains(r##"href="#chapter2""##));
    assert!(!html.contains("chapter2.xhtml"));

    // Three chapters referencing the same stylesheet produce one link
    assert_eq!(html.matches("style.css").count(), 1);

    // EPUB namespace residue is stripped
    assert!(!html.contains("epub:type"));

    // Final document: 1 cover page + 2 content pages, with metadata
    let doc = Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    let info = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .unwrap();
    assert_eq!(
        info.get(b"Title").and_then(Object::as_str).unwrap(),
        b"Fixture Book"
    );
    assert_eq!(
        info.get(b"Author").and_then(Object::as_str).unwrap(),
        b"Fixture Author"
    );

    // Named destinations from the rendered content survive the merge
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference).unwrap();
    let catalog = doc.get_dictionary(root).unwrap();
    assert!(catalog.get(b"Names").is_ok());
}

#[test]
fn rejects_archive_without_container() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.epub");

    let file = File::create(&input).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("mimetype", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.finish().unwrap();

    let renderer = StubRenderer::new();
    let err = convert_with_renderer(&input, None, &renderer).unwrap_err();
    assert!(matches!(err, Error::MalformedArchive(_)));

    // Nothing was rendered and no output was produced
    assert!(renderer.captured.lock().unwrap().is_none());
    assert!(!dir.path().join("broken.pdf").exists());
}

#[test]
fn rejects_non_zip_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("not-an-epub.epub");
    std::fs::write(&input, b"plain text, no zip magic").unwrap();

    let err = convert_with_renderer(&input, None, &StubRenderer::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedArchive(_)));
}
