use std::time::Duration;

use rml_rtmp::chunk_io::{ChunkDeserializationError, ChunkSerializationError};
use rml_rtmp::handshake::HandshakeError;
use rml_rtmp::messages::{MessageDeserializationError, MessageSerializationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtmpError {
    #[error("invalid RTMP URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {after:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server rejected {command}: {code}")]
    Rejected { command: &'static str, code: String },

    #[error("failed to encode RTMP message: {0}")]
    Encode(#[from] MessageSerializationError),

    #[error("failed to decode RTMP message: {0}")]
    Decode(#[from] MessageDeserializationError),

    #[error("failed to write RTMP chunk: {0}")]
    ChunkWrite(#[from] ChunkSerializationError),

    #[error("failed to read RTMP chunk: {0}")]
    ChunkRead(#[from] ChunkDeserializationError),

    #[error("connection is closed")]
    Closed,
}
