//! Paced live publishing of stored FLV files over RTMP.
//!
//! [`StreamPusher`] drives one session: it connects through a
//! [`rtmp::Connection`], sends the file's metadata tag as a data packet and
//! then forwards every audio/video tag as its own packet, sleeping between
//! frames according to [`Pacing`].

pub mod config;
pub mod error;
pub mod mapper;
pub mod pusher;

pub use config::{DEFAULT_CHANNEL, MetadataFraming, Pacing, PushConfig};
pub use error::PushError;
pub use mapper::PacketMapper;
pub use pusher::{PushReport, PushState, StreamPusher};
