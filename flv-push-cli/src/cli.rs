use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use flv::{PrevTagSizeMode, ReaderConfig};
use flv_push_engine::{MetadataFraming, Pacing, PushConfig};
use rtmp::RtmpConfig;
use rtmp::config::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, PROTOCOL_CHUNK_SIZE};

use crate::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "flv-push",
    version,
    about = "Publish a stored FLV file to an RTMP server as a live stream"
)]
pub struct Args {
    /// Destination URL, e.g. rtmp://host/app/stream
    pub url: String,

    /// FLV file to publish
    pub input: PathBuf,

    /// How frames are spaced in time
    #[arg(long, value_enum, default_value_t = PacingMode::Fixed)]
    pub pacing: PacingMode,

    /// Delay after each frame with `--pacing fixed`, in milliseconds
    #[arg(long, default_value_t = 40)]
    pub interval_ms: u64,

    /// Layout of the metadata packet
    #[arg(long, value_enum, default_value_t = FramingMode::Compat)]
    pub metadata_framing: FramingMode,

    /// What to do when a previous-tag-size trailer disagrees with its tag
    #[arg(long, value_enum, default_value_t = TrailerMode::Ignore)]
    pub prev_tag_size: TrailerMode,

    /// Outgoing RTMP chunk size
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Connect and handshake timeout, in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
    Fixed,
    Timestamp,
    None,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    Compat,
    SetDataFrame,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailerMode {
    Ignore,
    Warn,
    Strict,
}

impl Args {
    pub fn push_config(&self) -> PushConfig {
        let pacing = match self.pacing {
            PacingMode::Fixed => Pacing::Fixed(Duration::from_millis(self.interval_ms)),
            PacingMode::Timestamp => Pacing::Timestamp,
            PacingMode::None => Pacing::None,
        };
        let framing = match self.metadata_framing {
            FramingMode::Compat => MetadataFraming::Compat,
            FramingMode::SetDataFrame => MetadataFraming::SetDataFrame,
        };
        let trailer = match self.prev_tag_size {
            TrailerMode::Ignore => PrevTagSizeMode::Ignore,
            TrailerMode::Warn => PrevTagSizeMode::Warn,
            TrailerMode::Strict => PrevTagSizeMode::Strict,
        };

        PushConfig::default()
            .with_pacing(pacing)
            .with_metadata_framing(framing)
            .with_reader_config(ReaderConfig::default().with_prev_tag_size_mode(trailer))
    }

    pub fn rtmp_config(&self) -> Result<RtmpConfig, AppError> {
        if !(PROTOCOL_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(AppError::InvalidArgument(format!(
                "chunk size {} is outside {PROTOCOL_CHUNK_SIZE}..={MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }
        if self.connect_timeout == 0 {
            return Err(AppError::InvalidArgument(
                "connect timeout must be at least one second".to_string(),
            ));
        }

        Ok(RtmpConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["flv-push", "rtmp://127.0.0.1/live/test", "movie.flv"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_engine() {
        let args = parse(&[]);
        assert_eq!(args.input, PathBuf::from("movie.flv"));

        let push = args.push_config();
        assert_eq!(push.pacing, Pacing::Fixed(Duration::from_millis(40)));
        assert_eq!(push.metadata_framing, MetadataFraming::Compat);
        assert_eq!(push.channel, flv_push_engine::DEFAULT_CHANNEL);
        assert_eq!(push.reader.prev_tag_size_mode, PrevTagSizeMode::Ignore);

        let rtmp = args.rtmp_config().unwrap();
        assert_eq!(rtmp.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(rtmp.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn options_are_mapped() {
        let args = parse(&[
            "--pacing",
            "timestamp",
            "--metadata-framing",
            "set-data-frame",
            "--prev-tag-size",
            "strict",
            "--chunk-size",
            "60000",
            "-v",
        ]);
        assert!(args.verbose);

        let push = args.push_config();
        assert_eq!(push.pacing, Pacing::Timestamp);
        assert_eq!(push.metadata_framing, MetadataFraming::SetDataFrame);
        assert_eq!(push.reader.prev_tag_size_mode, PrevTagSizeMode::Strict);
        assert_eq!(args.rtmp_config().unwrap().chunk_size, 60000);

        let fixed = parse(&["--interval-ms", "5"]).push_config();
        assert_eq!(fixed.pacing, Pacing::Fixed(Duration::from_millis(5)));
        assert_eq!(parse(&["--pacing", "none"]).push_config().pacing, Pacing::None);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            parse(&["--chunk-size", "64"]).rtmp_config(),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse(&["--connect-timeout", "0"]).rtmp_config(),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(
            Args::try_parse_from(["flv-push", "rtmp://h/a/s", "f.flv", "-v", "-q"]).is_err()
        );
        assert!(Args::try_parse_from(["flv-push", "rtmp://h/a/s"]).is_err());
    }
}
