use bytes_util::CursorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated {context}: expected {expected} bytes, got {got}")]
    Truncated {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("first tag is not a metadata tag (type 0x{found:02x})")]
    MissingMetadataTag { found: u8 },

    #[error("unexpected tag type 0x{tag_type:02x} at tag #{index}")]
    UnexpectedTagType { tag_type: u8, index: u64 },

    #[error("PreviousTagSize mismatch (expected {expected}, got {got})")]
    PrevTagSizeMismatch { expected: u32, got: u32 },

    #[error("tag data size {size} exceeds limit {max}")]
    TagTooLarge { size: u32, max: u32 },

    #[error("malformed tag: {0}")]
    Cursor(#[from] CursorError),
}
