mod archive;
mod package;

pub use archive::extract_epub;
pub use package::parse_package;
