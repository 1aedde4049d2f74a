pub mod error;
pub mod framing;
pub mod header;
pub mod reader;
pub mod tag;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::FlvError;
pub use framing::ParsedTagHeader;
pub use header::FlvHeader;
pub use reader::{FlvPreamble, FlvTagReader, PrevTagSizeMode, ReaderConfig};
pub use tag::{FlvTag, FlvTagType};
