//! The push session: connect, send the metadata packet, then stream paced
//! media frames until the file ends.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use bytes::BytesMut;
use flv::FlvTagReader;
use rtmp::{Connection, OutboundPacket, SessionInfo};
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{Pacing, PushConfig};
use crate::error::PushError;
use crate::mapper::PacketMapper;

const READ_BUFFER_CAPACITY: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushState {
    #[default]
    Idle,
    Connected,
    HeaderSent,
    Streaming,
    Finished,
    Failed,
}

impl PushState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PushState::Finished | PushState::Failed)
    }
}

impl fmt::Display for PushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushState::Idle => "idle",
            PushState::Connected => "connected",
            PushState::HeaderSent => "header sent",
            PushState::Streaming => "streaming",
            PushState::Finished => "finished",
            PushState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Totals for one push session, kept up to date while it runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    pub packets_sent: u64,
    pub audio_tags: u64,
    pub video_tags: u64,
    /// Sum of transmitted packet body sizes.
    pub bytes_sent: u64,
    pub last_timestamp: u32,
    pub elapsed: Duration,
    pub final_state: PushState,
}

/// Pushes one FLV source to one destination.
pub struct StreamPusher<C> {
    connection: C,
    config: PushConfig,
    cancel: CancellationToken,
    state: PushState,
    session: Option<SessionInfo>,
    report: PushReport,
    buf: BytesMut,
}

impl<C: Connection> StreamPusher<C> {
    pub fn new(connection: C, config: PushConfig) -> Self {
        Self {
            connection,
            config,
            cancel: CancellationToken::new(),
            state: PushState::Idle,
            session: None,
            report: PushReport::default(),
            buf: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Uses `token` to stop the session from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PushState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn report(&self) -> &PushReport {
        &self.report
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Connects to `url`, then streams the FLV file at `path`.
    ///
    /// The file is opened only once the connection is up.
    pub async fn run(&mut self, url: &str, path: impl AsRef<Path>) -> Result<PushReport, PushError> {
        let started = Instant::now();
        let session = self.connect(url, started).await?;

        let path = path.as_ref();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(source) => {
                let err = PushError::SourceUnavailable {
                    path: path.to_path_buf(),
                    source,
                };
                return Err(self.fail(err, started).await);
            }
        };
        info!(path = %path.display(), "opened source");

        self.stream(
            session,
            BufReader::with_capacity(READ_BUFFER_CAPACITY, file),
            started,
        )
        .await
    }

    /// Connects to `url`, then streams FLV bytes from `reader`.
    pub async fn run_with_reader<R>(&mut self, url: &str, reader: R) -> Result<PushReport, PushError>
    where
        R: AsyncRead + Unpin,
    {
        let started = Instant::now();
        let session = self.connect(url, started).await?;
        self.stream(session, reader, started).await
    }

    async fn connect(&mut self, url: &str, started: Instant) -> Result<SessionInfo, PushError> {
        if self.state != PushState::Idle {
            warn!(state = %self.state, "restarting a used pusher");
            self.state = PushState::Idle;
            self.report = PushReport::default();
        }

        let connected = cancellable(&self.cancel, self.connection.connect(url)).await;
        match connected {
            Ok(Ok(session)) => {
                info!(
                    stream_id = session.stream_id,
                    local = ?session.local_addr,
                    peer = ?session.peer_addr,
                    "connected"
                );
                self.session = Some(session);
                self.state = PushState::Connected;
                Ok(session)
            }
            Ok(Err(e)) => Err(self.fail(PushError::Connect(e), started).await),
            Err(cancelled) => Err(self.fail(cancelled, started).await),
        }
    }

    async fn stream<R>(
        &mut self,
        session: SessionInfo,
        reader: R,
        started: Instant,
    ) -> Result<PushReport, PushError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = FlvTagReader::with_config(reader, self.config.reader.clone());
        let result = self.stream_tags(&session, &mut reader).await;
        // The source is released before the connection.
        drop(reader);

        match result {
            Ok(()) => {
                self.connection.close().await;
                self.state = PushState::Finished;
                self.report.final_state = PushState::Finished;
                self.report.elapsed = started.elapsed();
                info!(
                    packets = self.report.packets_sent,
                    audio = self.report.audio_tags,
                    video = self.report.video_tags,
                    bytes = self.report.bytes_sent,
                    elapsed = ?self.report.elapsed,
                    "push finished"
                );
                Ok(self.report.clone())
            }
            Err(e) => Err(self.fail(e, started).await),
        }
    }

    async fn stream_tags<R>(
        &mut self,
        session: &SessionInfo,
        reader: &mut FlvTagReader<R>,
    ) -> Result<(), PushError>
    where
        R: AsyncRead + Unpin,
    {
        let mapper = PacketMapper::new(
            self.config.channel,
            session.stream_id,
            self.config.metadata_framing,
        );

        let preamble =
            cancellable(&self.cancel, reader.read_file_header_and_first_tag(&mut self.buf))
                .await??;
        let packet = mapper.map_header(&preamble.bytes, preamble.total_size())?;
        drop(preamble);
        self.send(&packet).await?;
        self.state = PushState::HeaderSent;
        info!(size = packet.body_size, "metadata sent");

        let mut clock: Option<(Instant, u32)> = None;
        loop {
            let Some(tag) =
                cancellable(&self.cancel, reader.read_next_tag(&mut self.buf)).await??
            else {
                debug!(tags = reader.tags_read(), "end of source");
                return Ok(());
            };
            self.state = PushState::Streaming;

            let packet = mapper.map_frame(&tag)?;
            if tag.is_audio_tag() {
                self.report.audio_tags += 1;
            } else if tag.is_video_tag() {
                self.report.video_tags += 1;
            }
            drop(tag);

            let (stream_start, base) = *clock.get_or_insert((Instant::now(), packet.timestamp));
            let offset = packet.timestamp.saturating_sub(base);
            self.pause(delay_before_send(
                self.config.pacing,
                stream_start,
                Instant::now(),
                offset,
            ))
            .await?;

            self.send(&packet).await?;
            self.pause(delay_after_send(self.config.pacing)).await?;
        }
    }

    async fn pause(&self, delay: Duration) -> Result<(), PushError> {
        if delay.is_zero() {
            return Ok(());
        }
        trace!(?delay, "pacing");
        cancellable(&self.cancel, tokio::time::sleep(delay)).await
    }

    async fn send(&mut self, packet: &OutboundPacket) -> Result<(), PushError> {
        if self.cancel.is_cancelled() {
            return Err(PushError::Cancelled);
        }
        cancellable(&self.cancel, self.connection.send_packet(packet))
            .await?
            .map_err(PushError::Send)?;

        self.report.packets_sent += 1;
        self.report.bytes_sent += packet.body_size as u64;
        self.report.last_timestamp = packet.timestamp;
        trace!(
            kind = %packet.packet_type,
            size = packet.body_size,
            timestamp = packet.timestamp,
            "packet sent"
        );
        Ok(())
    }

    /// Moves to `Failed`, releases the connection and hands `err` back.
    async fn fail(&mut self, err: PushError, started: Instant) -> PushError {
        self.connection.close().await;
        self.state = PushState::Failed;
        self.report.final_state = PushState::Failed;
        self.report.elapsed = started.elapsed();
        if err.is_cancelled() {
            info!(packets = self.report.packets_sent, "push cancelled");
        } else {
            error!(error = %err, packets = self.report.packets_sent, "push failed");
        }
        err
    }
}

/// Awaits `fut` unless `token` fires first.
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output, PushError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PushError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Wait before transmitting a frame whose timestamp is `offset_ms` past the
/// first frame. Only timestamp pacing holds frames back; a frame already due
/// goes out at once.
pub fn delay_before_send(
    pacing: Pacing,
    stream_start: Instant,
    now: Instant,
    offset_ms: u32,
) -> Duration {
    match pacing {
        Pacing::Timestamp => {
            let due = stream_start + Duration::from_millis(offset_ms as u64);
            due.saturating_duration_since(now)
        }
        Pacing::Fixed(_) | Pacing::None => Duration::ZERO,
    }
}

/// Wait after a frame has been transmitted.
pub fn delay_after_send(pacing: Pacing) -> Duration {
    match pacing {
        Pacing::Fixed(interval) => interval,
        Pacing::Timestamp | Pacing::None => Duration::ZERO,
    }
}
