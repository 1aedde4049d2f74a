//! Synthetic FLV byte streams for tests.

use crate::framing::{FILE_HEADER_SIZE, TAG_HEADER_SIZE};

/// Encodes an 11-byte tag header with stream id 0.
pub fn tag_header_bytes(tag_type: u8, data_size: u32, timestamp_ms: u32) -> [u8; TAG_HEADER_SIZE] {
    let mut out = [0u8; TAG_HEADER_SIZE];
    out[0] = tag_type;
    out[1..4].copy_from_slice(&data_size.to_be_bytes()[1..]);
    // Lower 24 bits, then the extension byte.
    out[4..7].copy_from_slice(&timestamp_ms.to_be_bytes()[1..]);
    out[7] = (timestamp_ms >> 24) as u8;
    out
}

/// Builds FLV files tag by tag.
#[derive(Debug, Clone)]
pub struct FlvFileBuilder {
    buf: Vec<u8>,
}

impl Default for FlvFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlvFileBuilder {
    /// Starts with a standard audio+video header and `PreviousTagSize0 = 0`.
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(FILE_HEADER_SIZE);
        buf.extend_from_slice(b"FLV");
        buf.extend_from_slice(&[0x01, 0x05, 0x00, 0x00, 0x00, 0x09]);
        buf.extend_from_slice(&[0x00; 4]);
        Self { buf }
    }

    /// Appends a tag with a correct `PreviousTagSize` trailer.
    pub fn tag(self, tag_type: u8, timestamp_ms: u32, payload: &[u8]) -> Self {
        let trailer = (TAG_HEADER_SIZE + payload.len()) as u32;
        self.tag_with_trailer(tag_type, timestamp_ms, payload, trailer)
    }

    pub fn tag_with_trailer(
        mut self,
        tag_type: u8,
        timestamp_ms: u32,
        payload: &[u8],
        trailer: u32,
    ) -> Self {
        self.buf.extend_from_slice(&tag_header_bytes(
            tag_type,
            payload.len() as u32,
            timestamp_ms,
        ));
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&trailer.to_be_bytes());
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
