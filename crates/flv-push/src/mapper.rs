//! FLV tag to RTMP packet mapping.

use bytes::Bytes;
use bytes_util::{ByteCursor, CursorError};
use flv::FlvTag;
use flv::framing::{FILE_HEADER_SIZE, ParsedTagHeader, TAG_HEADER_SIZE, parse_tag_header};
use rtmp::{HeaderClass, MessageType, OutboundPacket};

use crate::config::MetadataFraming;
use crate::error::PushError;

pub const SET_DATA_FRAME: &str = "@setDataFrame";
/// Room reserved ahead of the metadata payload: AMF0 string marker, u16
/// length and the 13 bytes of `@setDataFrame`.
pub const SET_DATA_FRAME_PREFIX_LEN: usize = 16;

const AMF0_STRING_MARKER: u8 = 0x02;

/// Turns FLV tags into outbound packets on one channel and message stream.
#[derive(Debug, Clone, Copy)]
pub struct PacketMapper {
    channel: u8,
    stream_id: u32,
    framing: MetadataFraming,
}

impl PacketMapper {
    pub fn new(channel: u8, stream_id: u32, framing: MetadataFraming) -> Self {
        Self {
            channel,
            stream_id,
            framing,
        }
    }

    /// Builds the metadata packet from the file preamble (13-byte file header,
    /// metadata tag, trailer). `total_size` is the number of valid bytes in
    /// `preamble`.
    pub fn map_header(&self, preamble: &[u8], total_size: usize) -> Result<OutboundPacket, PushError> {
        let valid = preamble.get(..total_size).ok_or(CursorError::BufferUnderflow {
            needed: total_size,
            remaining: preamble.len(),
        })?;

        let mut cursor = ByteCursor::new(valid);
        cursor.skip(FILE_HEADER_SIZE)?;
        let header = read_tag_header(&mut cursor)?;
        let payload = cursor.get_slice(header.data_size as usize)?;

        let body_size = header.data_size as usize + SET_DATA_FRAME_PREFIX_LEN;
        let mut body = ByteCursor::new(vec![0u8; body_size]);
        match self.framing {
            MetadataFraming::Compat => {
                body.put_length_prefixed_string(SET_DATA_FRAME)?;
                body.set_write_position(0)?;
                body.put_slice(payload)?;
            }
            MetadataFraming::SetDataFrame => {
                body.put_u8(AMF0_STRING_MARKER)?;
                body.put_length_prefixed_string(SET_DATA_FRAME)?;
                body.put_slice(payload)?;
            }
        }

        Ok(self.packet(&header, body_size, Bytes::from(body.into_inner())))
    }

    /// Builds a media packet carrying the tag payload verbatim.
    pub fn map_frame(&self, tag: &FlvTag) -> Result<OutboundPacket, PushError> {
        let mut cursor = ByteCursor::new(tag.raw.as_ref());
        let header = read_tag_header(&mut cursor)?;
        let start = cursor.read_position();
        cursor.skip(header.data_size as usize)?;

        let body = tag.raw.slice(start..start + header.data_size as usize);
        Ok(self.packet(&header, header.data_size as usize, body))
    }

    fn packet(&self, header: &ParsedTagHeader, body_size: usize, body: Bytes) -> OutboundPacket {
        OutboundPacket {
            packet_type: MessageType::from(u8::from(header.tag_type)),
            body_size: body_size as u32,
            timestamp: header.timestamp_ms,
            channel: self.channel,
            header_class: HeaderClass::Large,
            stream_id: self.stream_id,
            body,
        }
    }
}

fn read_tag_header(cursor: &mut ByteCursor<&[u8]>) -> Result<ParsedTagHeader, CursorError> {
    parse_tag_header(cursor.get_slice(TAG_HEADER_SIZE)?)
}
