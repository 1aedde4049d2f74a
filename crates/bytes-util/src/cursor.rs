use thiserror::Error;

/// Longest string `put_length_prefixed_string` accepts (u16 length prefix).
pub const MAX_PREFIXED_STRING_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("buffer underflow: need {needed} bytes, {remaining} remaining")]
    BufferUnderflow { needed: usize, remaining: usize },

    #[error("buffer overflow: need {needed} bytes, {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },

    #[error("string of {len} bytes does not fit a 16-bit length prefix")]
    StringTooLong { len: usize },
}

/// Big-endian reader/writer over a caller-owned buffer.
///
/// Reads and writes keep independent positions, so the same cursor can
/// decode a header and then patch a body in place. Every access is bounds
/// checked against the wrapped buffer.
#[derive(Debug)]
pub struct ByteCursor<B> {
    buf: B,
    read_pos: usize,
    write_pos: usize,
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Bytes left for reading.
    pub fn remaining(&self) -> usize {
        self.buf.as_ref().len().saturating_sub(self.read_pos)
    }

    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn take(&mut self, len: usize) -> Result<&[u8], CursorError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CursorError::BufferUnderflow {
                needed: len,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += len;
        Ok(&self.buf.as_ref()[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), CursorError> {
        self.take(len).map(|_| ())
    }

    pub fn get_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_be16(&mut self) -> Result<u16, CursorError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_be24(&mut self) -> Result<u32, CursorError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn get_be32(&mut self) -> Result<u32, CursorError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_slice(&mut self, len: usize) -> Result<&[u8], CursorError> {
        self.take(len)
    }

    /// Reads a u16 length followed by that many raw bytes.
    pub fn get_length_prefixed_string(&mut self) -> Result<&[u8], CursorError> {
        let len = self.get_be16()? as usize;
        self.take(len)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<B> {
    /// Bytes left for writing.
    pub fn write_remaining(&self) -> usize {
        self.buf.as_ref().len().saturating_sub(self.write_pos)
    }

    pub fn set_write_position(&mut self, pos: usize) -> Result<(), CursorError> {
        let len = self.buf.as_ref().len();
        if pos > len {
            return Err(CursorError::BufferOverflow {
                needed: pos,
                remaining: len,
            });
        }
        self.write_pos = pos;
        Ok(())
    }

    pub fn put_slice(&mut self, src: &[u8]) -> Result<(), CursorError> {
        let remaining = self.write_remaining();
        if src.len() > remaining {
            return Err(CursorError::BufferOverflow {
                needed: src.len(),
                remaining,
            });
        }
        let start = self.write_pos;
        self.buf.as_mut()[start..start + src.len()].copy_from_slice(src);
        self.write_pos += src.len();
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), CursorError> {
        self.put_slice(&[value])
    }

    pub fn put_be16(&mut self, value: u16) -> Result<(), CursorError> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_be24(&mut self, value: u32) -> Result<(), CursorError> {
        self.put_slice(&value.to_be_bytes()[1..])
    }

    pub fn put_be32(&mut self, value: u32) -> Result<(), CursorError> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_be64(&mut self, value: u64) -> Result<(), CursorError> {
        self.put_slice(&value.to_be_bytes())
    }

    /// Writes a u16 length then the raw bytes, without a terminator.
    ///
    /// Nothing is written when the string is too long or does not fit.
    pub fn put_length_prefixed_string(&mut self, value: &str) -> Result<(), CursorError> {
        let len = value.len();
        if len > MAX_PREFIXED_STRING_LEN {
            return Err(CursorError::StringTooLong { len });
        }
        let remaining = self.write_remaining();
        if 2 + len > remaining {
            return Err(CursorError::BufferOverflow {
                needed: 2 + len,
                remaining,
            });
        }
        self.put_be16(len as u16)?;
        self.put_slice(value.as_bytes())
    }
}
