use std::time::Duration;

pub const DEFAULT_PORT: u16 = 1935;
/// Chunk size every RTMP peer starts with.
pub const PROTOCOL_CHUNK_SIZE: usize = 128;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Largest value a `SetChunkSize` message may carry.
pub const MAX_CHUNK_SIZE: usize = 0x7FFF_FFFF;

/// Publish-side RTMP client settings.
#[derive(Debug, Clone)]
pub struct RtmpConfig {
    /// TCP connect plus handshake budget.
    pub connect_timeout: Duration,
    /// How long to wait for each command response.
    pub response_timeout: Duration,
    /// Outgoing chunk size announced with `SetChunkSize`.
    pub chunk_size: usize,
    pub flash_ver: String,
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(5),
            chunk_size: DEFAULT_CHUNK_SIZE,
            flash_ver: "FMLE/3.0 (compatible; FMSc/1.0)".to_string(),
        }
    }
}

impl RtmpConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Clamped to `1..=0x7FFFFFFF`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn with_flash_ver(mut self, flash_ver: impl Into<String>) -> Self {
        self.flash_ver = flash_ver.into();
        self
    }
}
