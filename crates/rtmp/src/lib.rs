//! A publish-only RTMP client.
//!
//! Handshake and chunking come from `rml_rtmp`; this crate adds URL parsing,
//! the `connect` .. `publish` command sequence and a session that answers
//! the server's control messages. Media is handed over as [`OutboundPacket`]s
//! through the [`Connection`] trait.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packet;
pub mod url;

pub use command::RtmpCommand;
pub use config::RtmpConfig;
pub use connection::{Connection, RtmpConnection, RtmpSession, SessionInfo};
pub use error::RtmpError;
pub use message::MessageType;
pub use packet::{HeaderClass, OutboundPacket};
pub use url::RtmpUrl;
