//! # bytes-util
//!
//! Small big-endian helpers shared by the FLV reader and the packet mapper.
//!
//! - [`ByteCursor`] reads and writes fixed-width big-endian fields over a
//!   caller-owned buffer, failing instead of running past its end.
//! - [`BytesCursorExt`] extracts zero-copy slices from an `io::Cursor<Bytes>`.

mod cursor;

pub use cursor::{ByteCursor, CursorError, MAX_PREFIXED_STRING_LEN};

use bytes::Bytes;
use std::io;

/// Extension for `io::Cursor<Bytes>` that hands out sub-slices without copying.
pub trait BytesCursorExt {
    /// Extracts `size` bytes starting at the cursor position and advances past them.
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes>;

    /// Extracts everything left in the cursor.
    fn extract_remaining(&mut self) -> Bytes;
}

impl BytesCursorExt for io::Cursor<Bytes> {
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let position = self.position() as usize;
        let available = self.get_ref().len().saturating_sub(position);

        if size > available {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {size} bytes, only {available} left"),
            ));
        }

        let slice = self.get_ref().slice(position..position + size);
        self.set_position((position + size) as u64);
        Ok(slice)
    }

    fn extract_remaining(&mut self) -> Bytes {
        let position = (self.position() as usize).min(self.get_ref().len());
        let slice = self.get_ref().slice(position..);
        self.set_position(self.get_ref().len() as u64);
        slice
    }
}
