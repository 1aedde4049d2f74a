use std::path::PathBuf;

use bytes_util::CursorError;
use flv::FlvError;
use rtmp::RtmpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to connect: {0}")]
    Connect(#[source] RtmpError),

    #[error("cannot open source {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("first tag is not a metadata tag (type 0x{found:02x})")]
    MissingMetadataTag { found: u8 },

    #[error("unexpected tag type 0x{tag_type:02x} at tag #{index}")]
    UnexpectedTagType { tag_type: u8, index: u64 },

    #[error("FLV error: {0}")]
    Flv(FlvError),

    #[error("buffer error: {0}")]
    Buffer(#[from] CursorError),

    #[error("failed to send packet: {0}")]
    Send(#[source] RtmpError),

    #[error("push cancelled")]
    Cancelled,
}

impl PushError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PushError::Cancelled)
    }
}

impl From<FlvError> for PushError {
    fn from(err: FlvError) -> Self {
        match err {
            FlvError::MissingMetadataTag { found } => PushError::MissingMetadataTag { found },
            FlvError::UnexpectedTagType { tag_type, index } => {
                PushError::UnexpectedTagType { tag_type, index }
            }
            FlvError::Cursor(e) => PushError::Buffer(e),
            other => PushError::Flv(other),
        }
    }
}
