use std::fmt::Display;

use bytes_util::{ByteCursor, CursorError};

use crate::framing::FLV_HEADER_SIZE;

pub const FLV_SIGNATURE: u32 = 0x464C56;

/// The 9-byte FLV file header.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvHeader {
    pub signature: u32, // 3 bytes, 'FLV'
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    // Always 9 for the files this crate reads
    pub data_offset: u32,
}

impl Display for FlvHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let signature: String = self.signature.to_be_bytes()[1..]
            .iter()
            .map(|b| *b as char)
            .collect();

        write!(
            f,
            "{} v{} (audio: {}, video: {}, data offset: {})",
            signature, self.version, self.has_audio, self.has_video, self.data_offset
        )
    }
}

impl FlvHeader {
    /// Decodes the header fields without validating them.
    ///
    /// Callers decide what to do with a wrong signature; the pusher only
    /// logs it.
    pub fn parse(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = ByteCursor::new(bytes);
        let signature = cursor.get_be24()?;
        let version = cursor.get_u8()?;
        let flags = cursor.get_u8()?;
        let data_offset = cursor.get_be32()?;

        Ok(FlvHeader {
            signature,
            version,
            has_audio: (flags & 0b0000_0100) != 0,
            has_video: (flags & 0b0000_0001) != 0,
            data_offset,
        })
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == FLV_SIGNATURE
    }

    pub fn has_standard_offset(&self) -> bool {
        self.data_offset == FLV_HEADER_SIZE as u32
    }
}
