//! Error types for the conversion pipeline.

use thiserror::Error;

/// Errors that can occur while converting an EPUB to a PDF.
///
/// Every stage-level failure is fatal: there is no partial-output mode and no
/// retry anywhere in the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid EPUB archive: {0}")]
    MalformedArchive(String),

    #[error("container.xml has no usable rootfile entry")]
    MissingPackageDocument,

    #[error("package document failed to parse: {0}")]
    MalformedPackageDocument(String),

    #[error("cover image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("renderer error: {0}")]
    Render(String),

    #[error("render did not finish within {0} seconds")]
    RenderTimeout(u64),

    #[error("PDF assembly failed: {0}")]
    MergeFailure(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::MalformedArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::MalformedPackageDocument(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::MergeFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
