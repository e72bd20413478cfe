//! Full-bleed cover page synthesis.
//!
//! Scales the cover image to fill the entire trim size with no margins and
//! emits it as a single-page PDF, the way dedicated conversion tools handle
//! cover pages.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::error::Result;
use crate::render::PageSpec;

/// Scale/crop plan for covering a page with an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverGeometry {
    pub scaled_w: u32,
    pub scaled_h: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// Compute the cover-fit geometry: scale preserving aspect ratio until both
/// page dimensions are covered, then center-crop the overflow.
pub fn cover_geometry(img_w: u32, img_h: u32, page_w: u32, page_h: u32) -> CoverGeometry {
    let img_aspect = img_w as f64 / img_h as f64;
    let page_aspect = page_w as f64 / page_h as f64;

    let (scaled_w, scaled_h) = if img_aspect > page_aspect {
        // Wider than the page: fit to height, crop width
        ((page_h as f64 * img_aspect).round() as u32, page_h)
    } else {
        // Taller than the page: fit to width, crop height
        (page_w, (page_w as f64 / img_aspect).round() as u32)
    };

    CoverGeometry {
        scaled_w,
        scaled_h,
        crop_x: (scaled_w - page_w) / 2,
        crop_y: (scaled_h - page_h) / 2,
    }
}

/// Build a full-bleed single-page cover PDF from an image file.
///
/// The image is normalized to opaque RGB (alpha composited over white),
/// resampled with Lanczos3, center-cropped to the exact page pixel
/// dimensions at the spec's DPI, and embedded as a JPEG.
pub fn synthesize_cover(image_path: &Path, output: &Path, page: &PageSpec) -> Result<()> {
    let img = image::open(image_path)?;
    let rgb = flatten_to_rgb(img);

    let (page_w, page_h) = (page.pixel_width(), page.pixel_height());
    let geom = cover_geometry(rgb.width(), rgb.height(), page_w, page_h);

    let scaled = imageops::resize(&rgb, geom.scaled_w, geom.scaled_h, FilterType::Lanczos3);
    let cropped = imageops::crop_imm(&scaled, geom.crop_x, geom.crop_y, page_w, page_h).to_image();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 90).write_image(
        cropped.as_raw(),
        page_w,
        page_h,
        ExtendedColorType::Rgb8,
    )?;

    write_image_pdf(&jpeg, page_w, page_h, page, output)
}

/// Composite any alpha channel over a white background.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}

/// Emit a one-page PDF whose media box equals the trim size, with the JPEG
/// drawn edge to edge as a DCTDecode image XObject.
fn write_image_pdf(jpeg: &[u8], px_w: u32, px_h: u32, page: &PageSpec, output: &Path) -> Result<()> {
    let (w_pt, h_pt) = (page.point_width(), page.point_height());

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    w_pt.into(),
                    0.into(),
                    0.into(),
                    h_pt.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_aspect_needs_no_crop() {
        // 825x1275 is exactly 5.5in x 8.5in at 150 DPI
        let geom = cover_geometry(825, 1275, 825, 1275);
        assert_eq!(
            geom,
            CoverGeometry { scaled_w: 825, scaled_h: 1275, crop_x: 0, crop_y: 0 }
        );

        // Same aspect at a different resolution also lands exactly
        let geom = cover_geometry(1650, 2550, 825, 1275);
        assert_eq!(geom.scaled_w, 825);
        assert_eq!(geom.scaled_h, 1275);
        assert_eq!((geom.crop_x, geom.crop_y), (0, 0));
    }

    #[test]
    fn test_double_width_crops_symmetrically() {
        let geom = cover_geometry(1650, 1275, 825, 1275);
        assert_eq!(geom.scaled_h, 1275);
        assert_eq!(geom.scaled_w, 1650);
        // 825 pixels of overflow split evenly left and right
        assert_eq!(geom.crop_x, 412);
        assert_eq!(geom.crop_y, 0);
        assert_eq!(geom.scaled_w - geom.crop_x - 825, 413);
    }

    #[test]
    fn test_tall_image_crops_vertically() {
        let geom = cover_geometry(825, 2550, 825, 1275);
        assert_eq!(geom.scaled_w, 825);
        assert_eq!(geom.scaled_h, 2550);
        assert_eq!(geom.crop_x, 0);
        assert!(geom.crop_y > 0);
    }

    #[test]
    fn test_flatten_to_rgb_composites_over_white() {
        use image::{Rgba, RgbaImage};
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0])); // fully transparent black
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(img));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_synthesize_cover_writes_single_page_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("cover.png");
        let pdf_path = dir.path().join("cover.pdf");

        let img = RgbImage::from_pixel(110, 170, Rgb([200, 30, 30]));
        img.save(&image_path).unwrap();

        synthesize_cover(&image_path, &pdf_path, &PageSpec::default()).unwrap();

        let doc = Document::load(&pdf_path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
