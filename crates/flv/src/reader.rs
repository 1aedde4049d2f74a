//! Sequential FLV tag reader.
//!
//! The reader walks a file front to back without seeking: the 13-byte file
//! header and the leading metadata tag first, then one audio/video tag per
//! call. FLV has no resynchronization marker, so every decode error after the
//! file header is final for the stream.

use std::io;

use bytes::{Bytes, BytesMut};
use bytes_util::BytesCursorExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::error::FlvError;
use crate::framing::{
    self, FILE_HEADER_SIZE, FLV_HEADER_SIZE, MAX_TAG_DATA_SIZE, PREV_TAG_SIZE_FIELD_SIZE,
    ParsedTagHeader, TAG_HEADER_SIZE,
};
use crate::header::FlvHeader;
use crate::tag::{FlvTag, FlvTagType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrevTagSizeMode {
    /// Ignore `PreviousTagSize` values (fastest, most tolerant).
    #[default]
    Ignore,
    /// Log mismatches but continue reading.
    Warn,
    /// Treat any mismatch as an error.
    Strict,
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub prev_tag_size_mode: PrevTagSizeMode,
    /// Largest accepted tag payload; never above the 24-bit field limit.
    pub max_tag_size: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            prev_tag_size_mode: PrevTagSizeMode::Ignore,
            max_tag_size: MAX_TAG_DATA_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn with_prev_tag_size_mode(mut self, mode: PrevTagSizeMode) -> Self {
        self.prev_tag_size_mode = mode;
        self
    }

    pub fn with_max_tag_size(mut self, max_tag_size: u32) -> Self {
        self.max_tag_size = max_tag_size.min(MAX_TAG_DATA_SIZE);
        self
    }
}

/// File header, metadata tag and its trailer as one contiguous span.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvPreamble {
    pub header: FlvHeader,
    pub metadata: ParsedTagHeader,
    pub bytes: Bytes,
}

impl FlvPreamble {
    /// 13 + 11 + metadata size + 4.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn metadata_payload(&self) -> Bytes {
        let start = FILE_HEADER_SIZE + TAG_HEADER_SIZE;
        self.bytes
            .slice(start..start + self.metadata.data_size as usize)
    }
}

pub struct FlvTagReader<R> {
    reader: R,
    config: ReaderConfig,
    tag_index: u64,
    audio_tags: u64,
    video_tags: u64,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> FlvTagReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ReaderConfig::default())
    }

    pub fn with_config(reader: R, config: ReaderConfig) -> Self {
        Self {
            reader,
            config,
            tag_index: 0,
            audio_tags: 0,
            video_tags: 0,
            bytes_read: 0,
        }
    }

    /// Number of audio/video tags returned so far; also the 1-based index of
    /// the last one.
    pub fn tags_read(&self) -> u64 {
        self.tag_index
    }

    pub fn audio_tags(&self) -> u64 {
        self.audio_tags
    }

    pub fn video_tags(&self) -> u64 {
        self.video_tags
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the file header and the leading metadata tag into `buf`.
    ///
    /// The first tag must be script data (`onMetaData`); anything else
    /// rejects the file with [`FlvError::MissingMetadataTag`].
    pub async fn read_file_header_and_first_tag(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<FlvPreamble, FlvError> {
        buf.clear();
        self.read_into(buf, FILE_HEADER_SIZE + TAG_HEADER_SIZE, "file header")
            .await?;

        let header = FlvHeader::parse(&buf[..FLV_HEADER_SIZE])?;
        if !header.has_valid_signature() {
            warn!(signature = header.signature, "missing FLV signature");
        }
        if !header.has_standard_offset() {
            warn!(
                data_offset = header.data_offset,
                "non-standard FLV data offset, reading as 9"
            );
        }
        debug!("{header}");

        let metadata = framing::parse_tag_header(&buf[FILE_HEADER_SIZE..])?;
        if metadata.tag_type != FlvTagType::ScriptData {
            return Err(FlvError::MissingMetadataTag {
                found: metadata.tag_type.into(),
            });
        }
        self.check_size(&metadata)?;

        self.read_into(
            buf,
            metadata.data_size as usize + PREV_TAG_SIZE_FIELD_SIZE,
            "metadata tag",
        )
        .await?;
        self.check_trailer(&metadata, &buf[buf.len() - PREV_TAG_SIZE_FIELD_SIZE..])?;

        debug!(
            size = metadata.data_size,
            timestamp = metadata.timestamp_ms,
            "read metadata tag"
        );

        Ok(FlvPreamble {
            header,
            metadata,
            bytes: buf.split().freeze(),
        })
    }

    /// Reads the next audio or video tag into `buf`.
    ///
    /// Returns `Ok(None)` when the input ends exactly at a tag boundary. A tag
    /// of any other type fails with [`FlvError::UnexpectedTagType`] before its
    /// payload is consumed.
    pub async fn read_next_tag(&mut self, buf: &mut BytesMut) -> Result<Option<FlvTag>, FlvError> {
        buf.clear();
        buf.resize(TAG_HEADER_SIZE, 0);
        let got = self.fill(&mut buf[..]).await?;
        if got == 0 {
            buf.clear();
            debug!(
                tags = self.tag_index,
                bytes = self.bytes_read,
                "end of FLV stream"
            );
            return Ok(None);
        }
        if got < TAG_HEADER_SIZE {
            return Err(FlvError::Truncated {
                context: "tag header",
                expected: TAG_HEADER_SIZE,
                got,
            });
        }

        let header = framing::parse_tag_header(&buf[..])?;
        match header.tag_type {
            FlvTagType::Audio => self.audio_tags += 1,
            FlvTagType::Video => self.video_tags += 1,
            other => {
                return Err(FlvError::UnexpectedTagType {
                    tag_type: other.into(),
                    index: self.tag_index + 1,
                });
            }
        }
        self.tag_index += 1;
        self.check_size(&header)?;

        self.read_into(
            buf,
            header.data_size as usize + PREV_TAG_SIZE_FIELD_SIZE,
            "tag body",
        )
        .await?;
        let trailer = &buf[buf.len() - PREV_TAG_SIZE_FIELD_SIZE..];
        let prev_tag_size = framing::parse_prev_tag_size(trailer)?;
        self.check_trailer(&header, trailer)?;

        debug!(
            index = self.tag_index,
            size = header.expected_prev_tag_size(),
            timestamp = header.timestamp_ms,
            "{} tag",
            header.tag_type
        );

        let raw = buf.split().freeze();
        let mut cursor = io::Cursor::new(raw.clone());
        cursor.set_position(TAG_HEADER_SIZE as u64);
        let data = cursor.extract_bytes(header.data_size as usize)?;

        Ok(Some(FlvTag {
            tag_type: header.tag_type,
            data_size: header.data_size,
            timestamp_ms: header.timestamp_ms,
            stream_id: header.stream_id,
            data,
            prev_tag_size,
            raw,
        }))
    }

    fn check_size(&self, header: &ParsedTagHeader) -> Result<(), FlvError> {
        if header.data_size > self.config.max_tag_size {
            return Err(FlvError::TagTooLarge {
                size: header.data_size,
                max: self.config.max_tag_size,
            });
        }
        Ok(())
    }

    fn check_trailer(&self, header: &ParsedTagHeader, trailer: &[u8]) -> Result<(), FlvError> {
        if self.config.prev_tag_size_mode == PrevTagSizeMode::Ignore {
            return Ok(());
        }

        let expected = header.expected_prev_tag_size();
        let got = framing::parse_prev_tag_size(trailer)?;
        if got == expected {
            return Ok(());
        }

        match self.config.prev_tag_size_mode {
            PrevTagSizeMode::Ignore => Ok(()),
            PrevTagSizeMode::Warn => {
                warn!(
                    expected,
                    got,
                    index = self.tag_index,
                    "PreviousTagSize mismatch"
                );
                Ok(())
            }
            PrevTagSizeMode::Strict => Err(FlvError::PrevTagSizeMismatch { expected, got }),
        }
    }

    /// Appends exactly `len` bytes to `buf` or fails with `Truncated`.
    async fn read_into(
        &mut self,
        buf: &mut BytesMut,
        len: usize,
        context: &'static str,
    ) -> Result<(), FlvError> {
        let start = buf.len();
        buf.resize(start + len, 0);
        let got = self.fill(&mut buf[start..]).await?;
        if got < len {
            buf.truncate(start + got);
            return Err(FlvError::Truncated {
                context,
                expected: len,
                got,
            });
        }
        Ok(())
    }

    /// Reads until `dst` is full or the input ends; returns the bytes read.
    async fn fill(&mut self, dst: &mut [u8]) -> Result<usize, FlvError> {
        let mut filled = 0;
        while filled < dst.len() {
            let n = self.reader.read(&mut dst[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        trace!(requested = dst.len(), filled, "fill");
        self.bytes_read += filled as u64;
        Ok(filled)
    }
}
