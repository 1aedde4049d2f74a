use bytes_util::{ByteCursor, CursorError};

use crate::tag::FlvTagType;

pub const FLV_HEADER_SIZE: usize = 9;
pub const PREV_TAG_SIZE_FIELD_SIZE: usize = 4;
/// FLV header plus `PreviousTagSize0`.
pub const FILE_HEADER_SIZE: usize = FLV_HEADER_SIZE + PREV_TAG_SIZE_FIELD_SIZE;
pub const TAG_HEADER_SIZE: usize = 11;

pub const MAX_TAG_DATA_SIZE: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTagHeader {
    pub tag_type: FlvTagType,
    pub data_size: u32,
    pub timestamp_ms: u32,
    pub stream_id: u32,
}

impl ParsedTagHeader {
    /// Value the trailing `PreviousTagSize` field should carry for this tag.
    pub fn expected_prev_tag_size(&self) -> u32 {
        TAG_HEADER_SIZE as u32 + self.data_size
    }
}

/// Decodes an 11-byte tag header from the start of `bytes`.
///
/// The type byte is taken as-is: a set filter bit (encrypted payload) yields
/// an unknown type instead of being masked away.
pub fn parse_tag_header(bytes: &[u8]) -> Result<ParsedTagHeader, CursorError> {
    let mut cursor = ByteCursor::new(bytes);
    let tag_type = FlvTagType::from(cursor.get_u8()?);
    let data_size = cursor.get_be24()?;
    // Lower 24 bits first, then the extension byte as bits 24..32.
    let timestamp_ms = cursor.get_be24()? | ((cursor.get_u8()? as u32) << 24);
    let stream_id = cursor.get_be24()?;

    Ok(ParsedTagHeader {
        tag_type,
        data_size,
        timestamp_ms,
        stream_id,
    })
}

pub fn parse_prev_tag_size(bytes: &[u8]) -> Result<u32, CursorError> {
    ByteCursor::new(bytes).get_be32()
}
