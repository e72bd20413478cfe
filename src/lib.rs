//! # epub2pdf
//!
//! Converts an EPUB archive into a single paginated PDF, the same way
//! Calibre does it: unpack the archive, rebuild reading order from the
//! package manifest, flatten every chapter into one navigable HTML document,
//! render it through the Chromium print engine, and merge the result with a
//! synthesized full-bleed cover page.
//!
//! ## Pipeline
//!
//! ```text
//! archive -> epub::extract_epub -> epub::parse_package
//!         -> cover::synthesize_cover          (full-bleed cover PDF)
//!         -> flatten::flatten_spine           (one HTML document)
//!         -> render::ChromiumRenderer         (paginated content PDF)
//!         -> assemble::assemble               (final PDF + metadata)
//! ```
//!
//! Flattening is where the real work happens: cross-chapter hyperlinks are
//! rewritten into same-document anchors so TOC navigation survives
//! pagination, redundant cover wrapper pages are detected and elided, and
//! EPUB namespace residue that breaks strict HTML parsers is stripped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! let output = epub2pdf::convert(Path::new("book.epub"), None)?;
//! println!("wrote {}", output.display());
//! # Ok::<(), epub2pdf::Error>(())
//! ```

pub mod assemble;
pub mod book;
pub mod convert;
pub mod cover;
pub mod epub;
pub mod error;
pub mod flatten;
pub mod render;
pub(crate) mod util;

pub use book::{BookInfo, DocumentMetadata, ManifestItem, PackageDoc};
pub use convert::{convert, convert_with_renderer, inspect};
pub use error::{Error, Result};
pub use flatten::{FlattenedDocument, flatten_spine};
pub use render::{ChromiumRenderer, PageRenderer, PageSpec};
