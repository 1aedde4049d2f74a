use std::fmt;

use bytes::Bytes;

use crate::framing::{PREV_TAG_SIZE_FIELD_SIZE, TAG_HEADER_SIZE};

/// One FLV tag as read from the file.
///
/// `raw` holds the exact bytes of the tag: the 11-byte header, the payload
/// and the 4-byte `PreviousTagSize` trailer. `data` is a zero-copy view of the
/// payload inside `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvTag {
    pub tag_type: FlvTagType,
    pub data_size: u32,
    /// A timestamp in milliseconds
    pub timestamp_ms: u32,
    /// Always 0 in conforming files
    pub stream_id: u32,
    pub data: Bytes,
    pub prev_tag_size: u32,
    pub raw: Bytes,
}

impl FlvTag {
    pub fn is_script_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::ScriptData)
    }

    pub fn is_audio_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::Audio)
    }

    pub fn is_video_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::Video)
    }

    /// Header plus payload, without the trailer.
    pub fn size(&self) -> usize {
        TAG_HEADER_SIZE + self.data.len()
    }

    /// Bytes this tag occupied in the file, trailer included.
    pub fn encoded_size(&self) -> usize {
        self.size() + PREV_TAG_SIZE_FIELD_SIZE
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.raw[..TAG_HEADER_SIZE]
    }

    /// Whether the trailer matches `11 + data_size`.
    pub fn has_consistent_trailer(&self) -> bool {
        self.prev_tag_size == self.size() as u32
    }

    /// Video frame type nibble is 1 for key frames.
    pub fn is_key_frame(&self) -> bool {
        self.is_video_tag() && self.data.first().is_some_and(|b| (b >> 4) & 0x07 == 1)
    }
}

/// FLV Tag Type
///
/// Audio(8), Video(9) and ScriptData(18) are the only types defined by the
/// container; any other byte is kept as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
    ScriptData,
    Unknown(u8),
}

impl From<u8> for FlvTagType {
    fn from(value: u8) -> Self {
        match value {
            8 => FlvTagType::Audio,
            9 => FlvTagType::Video,
            18 => FlvTagType::ScriptData,
            _ => FlvTagType::Unknown(value),
        }
    }
}

impl From<FlvTagType> for u8 {
    fn from(value: FlvTagType) -> Self {
        match value {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::ScriptData => 18,
            FlvTagType::Unknown(val) => val,
        }
    }
}

impl fmt::Display for FlvTagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlvTagType::Audio => write!(f, "Audio"),
            FlvTagType::Video => write!(f, "Video"),
            FlvTagType::ScriptData => write!(f, "Script"),
            FlvTagType::Unknown(value) => write!(f, "Unknown({value})"),
        }
    }
}
