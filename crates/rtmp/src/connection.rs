use std::net::SocketAddr;

use async_trait::async_trait;
use rml_rtmp::chunk_io::{ChunkDeserializer, ChunkSerializer};
use rml_rtmp::messages::{MessagePayload, RtmpMessage, UserControlEventType};
use rml_rtmp::time::RtmpTimestamp;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, trace, warn};

use crate::command::RtmpCommand;
use crate::config::RtmpConfig;
use crate::error::RtmpError;
use crate::handshake::client_handshake;
use crate::packet::OutboundPacket;
use crate::url::RtmpUrl;

const TX_CONNECT: f64 = 1.0;
const TX_RELEASE_STREAM: f64 = 2.0;
const TX_FC_PUBLISH: f64 = 3.0;
const TX_CREATE_STREAM: f64 = 4.0;
const TX_PUBLISH: f64 = 5.0;
const TX_FC_UNPUBLISH: f64 = 6.0;
const TX_DELETE_STREAM: f64 = 7.0;

const PUBLISH_START: &str = "NetStream.Publish.Start";

const READ_SIZE: usize = 4096;

/// What a successful publish handshake leaves the caller with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// Message stream id assigned by `createStream`.
    pub stream_id: u32,
    pub local_addr: Option<SocketAddr>,
    pub peer_addr: Option<SocketAddr>,
}

/// A live-publish transport for outbound packets.
#[async_trait]
pub trait Connection: Send {
    /// Opens the transport and negotiates a publishing stream.
    async fn connect(&mut self, url: &str) -> Result<SessionInfo, RtmpError>;

    /// Transmits one packet; fails if the transport reports an error.
    async fn send_packet(&mut self, packet: &OutboundPacket) -> Result<(), RtmpError>;

    /// Releases the stream and the transport. Safe to call more than once.
    async fn close(&mut self);
}

/// A publishing session over any byte stream.
///
/// Chunking is done by `rml_rtmp`; one serializer and one deserializer live
/// for the whole session since both carry per-chunk-stream state.
pub struct RtmpSession<S> {
    stream: S,
    serializer: ChunkSerializer,
    deserializer: ChunkDeserializer,
    /// Bytes read from the socket, not yet fed to the deserializer.
    inbound: Vec<u8>,
    url: RtmpUrl,
    config: RtmpConfig,
    stream_id: u32,
}

impl<S> RtmpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Runs the handshake and the `connect` .. `publish` command sequence.
    pub async fn publish(mut stream: S, url: RtmpUrl, config: RtmpConfig) -> Result<Self, RtmpError> {
        let leftover = timeout(config.connect_timeout, client_handshake(&mut stream))
            .await
            .map_err(|_| RtmpError::Timeout {
                operation: "handshake",
                after: config.connect_timeout,
            })??;

        let mut session = Self {
            stream,
            serializer: ChunkSerializer::new(),
            deserializer: ChunkDeserializer::new(),
            inbound: leftover,
            url,
            config,
            stream_id: 0,
        };

        session.set_chunk_size(session.config.chunk_size).await?;

        let connect = RtmpCommand::connect(
            TX_CONNECT,
            &session.url.app,
            &session.url.tc_url(),
            &session.config.flash_ver,
        );
        session.send_command(&connect, 0).await?;
        let reply = session.expect_result(TX_CONNECT, "connect").await?;
        debug!(code = reply.status_code(), "connect accepted");

        let stream_name = session.url.stream.clone();
        session
            .send_command(&RtmpCommand::release_stream(TX_RELEASE_STREAM, &stream_name), 0)
            .await?;
        session
            .send_command(&RtmpCommand::fc_publish(TX_FC_PUBLISH, &stream_name), 0)
            .await?;
        session
            .send_command(&RtmpCommand::create_stream(TX_CREATE_STREAM), 0)
            .await?;
        let reply = session
            .expect_result(TX_CREATE_STREAM, "createStream")
            .await?;
        session.stream_id = reply
            .first_number()
            .map(|id| id as u32)
            .ok_or_else(|| RtmpError::Protocol("createStream reply carries no stream id".into()))?;
        debug!(stream_id = session.stream_id, "stream created");

        session
            .send_command(
                &RtmpCommand::publish(TX_PUBLISH, &stream_name),
                session.stream_id,
            )
            .await?;
        session.wait_for_publish_start().await?;

        info!(url = %session.url, stream_id = session.stream_id, "publishing");
        Ok(session)
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn url(&self) -> &RtmpUrl {
        &self.url
    }

    pub async fn send_packet(&mut self, packet: &OutboundPacket) -> Result<(), RtmpError> {
        let message = MessagePayload {
            timestamp: RtmpTimestamp::new(packet.timestamp),
            type_id: packet.packet_type.into(),
            message_stream_id: packet.stream_id,
            data: packet.payload(),
        };
        let chunks = self.serializer.serialize(
            &message,
            packet.header_class.is_uncompressed(),
            false,
        )?;
        self.write_bytes(&chunks.bytes).await
    }

    /// Best-effort `FCUnpublish` + `deleteStream`, then shuts the stream down.
    /// A peer that stops reading gets `response_timeout` to drain.
    pub async fn close(&mut self) {
        let budget = self.config.response_timeout;
        if timeout(budget, self.unpublish()).await.is_err() {
            warn!(after = ?budget, "peer stalled while closing");
        }
        match timeout(budget, self.stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "shutdown failed"),
            Err(_) => debug!("shutdown timed out"),
        }
        info!(url = %self.url, "session closed");
    }

    async fn unpublish(&mut self) {
        let stream_name = self.url.stream.clone();
        let stream_id = self.stream_id;
        for command in [
            RtmpCommand::fc_unpublish(TX_FC_UNPUBLISH, &stream_name),
            RtmpCommand::delete_stream(TX_DELETE_STREAM, stream_id),
        ] {
            if let Err(e) = self.send_command(&command, stream_id).await {
                debug!(command = %command.name, error = %e, "failed to send close command");
                break;
            }
        }
    }

    async fn set_chunk_size(&mut self, chunk_size: usize) -> Result<(), RtmpError> {
        let size = (chunk_size as u32) & 0x7FFF_FFFF;
        let packet = self
            .serializer
            .set_max_chunk_size(size, RtmpTimestamp::new(0))?;
        self.write_bytes(&packet.bytes).await?;
        debug!(chunk_size = size, "set outgoing chunk size");
        Ok(())
    }

    async fn send_command(&mut self, command: &RtmpCommand, stream_id: u32) -> Result<(), RtmpError> {
        let payload = command.to_payload(stream_id)?;
        debug!(command = %command.name, tx = command.transaction_id, "sending command");
        self.send_message(&payload).await
    }

    async fn send_message(&mut self, payload: &MessagePayload) -> Result<(), RtmpError> {
        let packet = self.serializer.serialize(payload, true, false)?;
        self.write_bytes(&packet.bytes).await
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), RtmpError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Waits for `_result`/`_error` carrying `tx_id`.
    async fn expect_result(
        &mut self,
        tx_id: f64,
        operation: &'static str,
    ) -> Result<RtmpCommand, RtmpError> {
        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let command = self.next_command(operation, deadline).await?;
            if command.transaction_id != tx_id {
                debug!(command = %command.name, tx = command.transaction_id, "ignoring reply");
                continue;
            }
            if command.is_result() {
                return Ok(command);
            }
            if command.is_error() {
                return Err(RtmpError::Rejected {
                    command: operation,
                    code: command.status_code().unwrap_or("_error").to_string(),
                });
            }
            debug!(command = %command.name, tx = tx_id, "unexpected reply");
        }
    }

    async fn wait_for_publish_start(&mut self) -> Result<(), RtmpError> {
        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let command = self.next_command("publish", deadline).await?;
            if command.is_error() && command.transaction_id == TX_PUBLISH {
                return Err(RtmpError::Rejected {
                    command: "publish",
                    code: command.status_code().unwrap_or("_error").to_string(),
                });
            }
            if command.name != "onStatus" {
                debug!(command = %command.name, "ignoring reply");
                continue;
            }

            let code = command.status_code().unwrap_or_default();
            if code == PUBLISH_START {
                return Ok(());
            }
            if command.status_level() == Some("error") {
                return Err(RtmpError::Rejected {
                    command: "publish",
                    code: code.to_string(),
                });
            }
            debug!(code, "onStatus");
        }
    }

    /// Reads messages until the next command, servicing protocol control
    /// messages on the way.
    async fn next_command(
        &mut self,
        operation: &'static str,
        deadline: Instant,
    ) -> Result<RtmpCommand, RtmpError> {
        loop {
            let payload = self.next_message(operation, deadline).await?;
            let message = payload.to_rtmp_message()?;
            if let RtmpMessage::Amf0Command { .. } = message {
                if let Some(command) = RtmpCommand::from_message(message) {
                    return Ok(command);
                }
                continue;
            }
            self.handle_control(message).await?;
        }
    }

    async fn next_message(
        &mut self,
        operation: &'static str,
        deadline: Instant,
    ) -> Result<MessagePayload, RtmpError> {
        loop {
            // The deserializer keeps whatever it is given; later calls with
            // no input drain messages it already holds.
            let message = self.deserializer.get_next_message(&self.inbound)?;
            self.inbound.clear();
            if let Some(payload) = message {
                return Ok(payload);
            }

            self.inbound.reserve(READ_SIZE);
            let read = timeout_at(deadline, self.stream.read_buf(&mut self.inbound))
                .await
                .map_err(|_| RtmpError::Timeout {
                    operation,
                    after: self.config.response_timeout,
                })??;
            if read == 0 {
                return Err(RtmpError::Closed);
            }
        }
    }

    async fn handle_control(&mut self, message: RtmpMessage) -> Result<(), RtmpError> {
        match message {
            RtmpMessage::SetChunkSize { size } => {
                self.deserializer.set_max_chunk_size(size as usize)?;
                debug!(chunk_size = size, "peer set chunk size");
            }
            RtmpMessage::WindowAcknowledgement { size } => {
                debug!(size, "peer window acknowledgement size");
            }
            RtmpMessage::SetPeerBandwidth { size, .. } => {
                debug!(size, "peer bandwidth");
            }
            RtmpMessage::UserControl {
                event_type: UserControlEventType::PingRequest,
                timestamp,
                ..
            } => {
                let pong = RtmpMessage::UserControl {
                    event_type: UserControlEventType::PingResponse,
                    stream_id: None,
                    buffer_length: None,
                    timestamp,
                }
                .into_message_payload(RtmpTimestamp::new(0), 0)?;
                self.send_message(&pong).await?;
                trace!("answered ping");
            }
            RtmpMessage::UserControl { event_type, .. } => {
                trace!(?event_type, "user control event");
            }
            other => trace!(message = ?other, "ignoring message"),
        }
        Ok(())
    }
}

/// [`Connection`] over TCP.
pub struct RtmpConnection {
    config: RtmpConfig,
    session: Option<RtmpSession<TcpStream>>,
}

impl RtmpConnection {
    pub fn new(config: RtmpConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl Default for RtmpConnection {
    fn default() -> Self {
        Self::new(RtmpConfig::default())
    }
}

#[async_trait]
impl Connection for RtmpConnection {
    async fn connect(&mut self, url: &str) -> Result<SessionInfo, RtmpError> {
        if self.session.is_some() {
            warn!("connect called on an open connection, closing it first");
            self.close().await;
        }

        let url = RtmpUrl::parse(url)?;
        let addr = url.addr();
        info!(%url, "connecting");

        let socket = timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RtmpError::Timeout {
                operation: "TCP connect",
                after: self.config.connect_timeout,
            })?
            .map_err(|source| RtmpError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if let Err(e) = socket.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
        let local_addr = socket.local_addr().ok();
        let peer_addr = socket.peer_addr().ok();

        let session = RtmpSession::publish(socket, url, self.config.clone()).await?;
        let info = SessionInfo {
            stream_id: session.stream_id(),
            local_addr,
            peer_addr,
        };
        debug!(?info, "session established");
        self.session = Some(session);
        Ok(info)
    }

    async fn send_packet(&mut self, packet: &OutboundPacket) -> Result<(), RtmpError> {
        let session = self.session.as_mut().ok_or(RtmpError::Closed)?;
        session.send_packet(packet).await
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use bytes::Bytes;
    use rml_rtmp::rml_amf0::Amf0Value;
    use tokio::io::{DuplexStream, duplex};

    use super::*;
    use crate::command::string;
    use crate::handshake::tests::server_handshake;
    use crate::message::MessageType;

    fn info(level: &str, code: &str) -> Amf0Value {
        Amf0Value::Object(HashMap::from([
            ("level".to_string(), string(level)),
            ("code".to_string(), string(code)),
        ]))
    }

    async fn write_message(
        stream: &mut DuplexStream,
        serializer: &mut ChunkSerializer,
        message: RtmpMessage,
        stream_id: u32,
    ) {
        let payload = message
            .into_message_payload(RtmpTimestamp::new(0), stream_id)
            .unwrap();
        let packet = serializer.serialize(&payload, true, false).unwrap();
        stream.write_all(&packet.bytes).await.unwrap();
    }

    async fn reply(
        stream: &mut DuplexStream,
        serializer: &mut ChunkSerializer,
        command: RtmpCommand,
        stream_id: u32,
    ) {
        write_message(stream, serializer, command.into(), stream_id).await;
    }

    /// In-memory publish endpoint. Answers the command sequence, sends a
    /// ping and a larger chunk size up front, and returns every message the
    /// client sent once the client hangs up.
    async fn serve(
        mut stream: DuplexStream,
        publish_status: Option<(&'static str, &'static str)>,
        stall_after_publish: bool,
    ) -> Vec<MessagePayload> {
        let mut inbound = server_handshake(&mut stream).await;
        let mut serializer = ChunkSerializer::new();
        let mut deserializer = ChunkDeserializer::new();

        write_message(
            &mut stream,
            &mut serializer,
            RtmpMessage::WindowAcknowledgement { size: 2_500_000 },
            0,
        )
        .await;
        let resize = serializer
            .set_max_chunk_size(4096, RtmpTimestamp::new(0))
            .unwrap();
        stream.write_all(&resize.bytes).await.unwrap();
        write_message(
            &mut stream,
            &mut serializer,
            RtmpMessage::UserControl {
                event_type: UserControlEventType::PingRequest,
                stream_id: None,
                buffer_length: None,
                timestamp: Some(RtmpTimestamp::new(42)),
            },
            0,
        )
        .await;

        let mut received = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let next = deserializer.get_next_message(&inbound).unwrap();
            inbound.clear();
            let Some(payload) = next else {
                let read = stream.read(&mut buf).await.unwrap_or(0);
                if read == 0 {
                    return received;
                }
                inbound.extend_from_slice(&buf[..read]);
                continue;
            };

            let message = payload.to_rtmp_message().unwrap();
            received.push(payload);
            match message {
                RtmpMessage::SetChunkSize { size } => {
                    deserializer.set_max_chunk_size(size as usize).unwrap();
                }
                RtmpMessage::Amf0Command {
                    command_name,
                    transaction_id,
                    ..
                } => match command_name.as_str() {
                    "connect" => {
                        let result = RtmpCommand::new("_result", transaction_id)
                            .object("fmsVer", string("FMS/3,0,1,123"))
                            .arg(info("status", "NetConnection.Connect.Success"));
                        reply(&mut stream, &mut serializer, result, 0).await;
                    }
                    "createStream" => {
                        // Replies to earlier commands and unsolicited calls
                        // arrive first, as real servers do.
                        reply(&mut stream, &mut serializer, RtmpCommand::new("onBWDone", 0.0), 0)
                            .await;
                        reply(&mut stream, &mut serializer, RtmpCommand::new("_result", 2.0), 0)
                            .await;
                        let created = RtmpCommand::new("_result", transaction_id)
                            .arg(Amf0Value::Number(1.0));
                        reply(&mut stream, &mut serializer, created, 0).await;
                    }
                    "publish" => {
                        if let Some((level, code)) = publish_status {
                            let status = RtmpCommand::new("onStatus", 0.0).arg(info(level, code));
                            reply(&mut stream, &mut serializer, status, 1).await;
                        }
                        if stall_after_publish {
                            std::future::pending::<()>().await;
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn command_names(received: &[MessagePayload]) -> Vec<String> {
        received
            .iter()
            .filter_map(|payload| {
                RtmpCommand::from_message(payload.to_rtmp_message().unwrap()).map(|c| c.name)
            })
            .collect()
    }

    fn test_url() -> RtmpUrl {
        RtmpUrl::parse("rtmp://localhost/live/test").unwrap()
    }

    #[tokio::test]
    async fn publishes_sends_and_closes() {
        let (client, server) = duplex(64 * 1024);
        let server_task = tokio::spawn(serve(server, Some(("status", PUBLISH_START)), false));

        let config = RtmpConfig::default().with_chunk_size(128);
        let mut session = RtmpSession::publish(client, test_url(), config)
            .await
            .unwrap();
        assert_eq!(session.stream_id(), 1);

        let body = Bytes::from(vec![0x17; 300]);
        let packet = OutboundPacket::new(MessageType::Video, 16, 4, body.clone()).with_stream_id(1);
        session.send_packet(&packet).await.unwrap();
        session.close().await;
        drop(session);

        let received = server_task.await.unwrap();
        assert!(matches!(
            received[0].to_rtmp_message().unwrap(),
            RtmpMessage::SetChunkSize { size: 128 }
        ));
        assert_eq!(
            command_names(&received),
            [
                "connect",
                "releaseStream",
                "FCPublish",
                "createStream",
                "publish",
                "FCUnpublish",
                "deleteStream",
            ]
        );

        let pong = received.iter().find_map(|payload| match payload.to_rtmp_message() {
            Ok(RtmpMessage::UserControl {
                event_type: UserControlEventType::PingResponse,
                timestamp,
                ..
            }) => Some(timestamp.map(|t| t.value)),
            _ => None,
        });
        assert_eq!(pong, Some(Some(42)));

        let publish = received
            .iter()
            .filter_map(|p| RtmpCommand::from_message(p.to_rtmp_message().unwrap()))
            .find(|c| c.name == "publish")
            .unwrap();
        assert_eq!(publish.args, vec![string("test"), string("live")]);

        let video = received.iter().find(|p| p.type_id == 9).unwrap();
        assert_eq!(video.timestamp.value, 16);
        assert_eq!(video.message_stream_id, 1);
        assert_eq!(video.data, body);
    }

    #[tokio::test]
    async fn publish_rejection_is_reported() {
        let (client, server) = duplex(64 * 1024);
        let server_task = tokio::spawn(serve(
            server,
            Some(("error", "NetStream.Publish.BadName")),
            false,
        ));

        let err = RtmpSession::publish(client, test_url(), RtmpConfig::default())
            .await
            .err()
            .unwrap();
        match err {
            RtmpError::Rejected { command, code } => {
                assert_eq!(command, "publish");
                assert_eq!(code, "NetStream.Publish.BadName");
            }
            other => panic!("unexpected error: {other}"),
        }
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (client, mut server) = duplex(64 * 1024);
        let server_task = tokio::spawn(async move {
            server_handshake(&mut server).await;
            let mut sink = vec![0u8; 4096];
            while server.read(&mut sink).await.unwrap_or(0) > 0 {}
        });

        let config = RtmpConfig::default().with_response_timeout(Duration::from_millis(100));
        let err = RtmpSession::publish(client, test_url(), config)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RtmpError::Timeout {
                operation: "connect",
                ..
            }
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn close_gives_up_on_a_stalled_peer() {
        let (client, server) = duplex(1024);
        let server_task = tokio::spawn(serve(server, Some(("status", PUBLISH_START)), true));

        let config = RtmpConfig::default().with_response_timeout(Duration::from_millis(200));
        let mut session = RtmpSession::publish(client, test_url(), config)
            .await
            .unwrap();

        // The peer stops reading, so a large frame fills the pipe.
        let packet = OutboundPacket::new(MessageType::Video, 0, 4, Bytes::from(vec![0; 64 * 1024]))
            .with_stream_id(1);
        let sent = tokio::time::timeout(Duration::from_millis(100), session.send_packet(&packet)).await;
        assert!(sent.is_err());

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close must not wait on a peer that stopped reading");
        server_task.abort();
    }

    #[tokio::test]
    async fn unconnected_connection_refuses_packets() {
        let mut connection = RtmpConnection::default();
        assert!(!connection.is_connected());
        let packet = OutboundPacket::new(MessageType::Audio, 0, 4, Bytes::from_static(&[0xAF]));
        let err = connection.send_packet(&packet).await.unwrap_err();
        assert!(matches!(err, RtmpError::Closed));
        // Closing twice is harmless.
        connection.close().await;
        connection.close().await;
    }

    #[tokio::test]
    async fn invalid_url_fails_before_dialing() {
        let mut connection = RtmpConnection::default();
        let err = connection.connect("http://example.com/live/key").await.unwrap_err();
        assert!(matches!(err, RtmpError::InvalidUrl { .. }));
        assert!(!connection.is_connected());
    }
}
