use bytes::Bytes;

use crate::message::MessageType;

/// Chunk header class requested for the first chunk of a packet.
///
/// `Large` always carries the full message header. `Compressed` lets the
/// chunk serializer drop fields repeated from the previous message on the
/// same chunk stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderClass {
    #[default]
    Large,
    Compressed,
}

impl HeaderClass {
    pub fn is_uncompressed(self) -> bool {
        matches!(self, HeaderClass::Large)
    }
}

/// One outgoing RTMP message ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPacket {
    pub packet_type: MessageType,
    pub body_size: u32,
    pub timestamp: u32,
    /// Logical channel the packet belongs to. Chunk stream ids on the wire
    /// are assigned by the chunk serializer per message type.
    pub channel: u8,
    pub header_class: HeaderClass,
    /// Message stream id
    pub stream_id: u32,
    pub body: Bytes,
}

impl OutboundPacket {
    pub fn new(packet_type: MessageType, timestamp: u32, channel: u8, body: Bytes) -> Self {
        Self {
            packet_type,
            body_size: body.len() as u32,
            timestamp,
            channel,
            header_class: HeaderClass::Large,
            stream_id: 0,
            body,
        }
    }

    pub fn with_stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn with_header_class(mut self, header_class: HeaderClass) -> Self {
        self.header_class = header_class;
        self
    }

    /// The bytes actually transmitted: `body` cut to `body_size`.
    pub fn payload(&self) -> Bytes {
        let len = (self.body_size as usize).min(self.body.len());
        self.body.slice(..len)
    }
}
