use std::time::Duration;

use flv::ReaderConfig;

/// Chunk stream every media and metadata packet is sent on.
pub const DEFAULT_CHANNEL: u8 = 4;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// How long to wait after each transmitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Constant delay after every frame.
    Fixed(Duration),
    /// Release each frame when the wall clock since the first frame reaches
    /// its timestamp offset. Frames already late go out immediately.
    Timestamp,
    /// No delay.
    None,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(DEFAULT_FRAME_INTERVAL)
    }
}

/// Body layout of the metadata packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataFraming {
    /// Writes the length-prefixed `@setDataFrame` name, then the metadata
    /// payload over it from offset 0, in a body of `size + 16` bytes. Matches
    /// what legacy pushers put on the wire.
    #[default]
    Compat,
    /// A proper data message: AMF0 string `@setDataFrame` (16 bytes)
    /// followed by the metadata payload.
    SetDataFrame,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub pacing: Pacing,
    pub metadata_framing: MetadataFraming,
    pub channel: u8,
    pub reader: ReaderConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            metadata_framing: MetadataFraming::default(),
            channel: DEFAULT_CHANNEL,
            reader: ReaderConfig::default(),
        }
    }
}

impl PushConfig {
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_metadata_framing(mut self, framing: MetadataFraming) -> Self {
        self.metadata_framing = framing;
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_reader_config(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }
}
