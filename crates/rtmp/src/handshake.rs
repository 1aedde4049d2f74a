//! Client side of the RTMP handshake, driven over an async byte stream.

use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::RtmpError;

const READ_SIZE: usize = 4096;

/// Runs the handshake as the client.
///
/// Returns any bytes the server sent after its last handshake packet; they
/// belong to the chunk stream.
pub async fn client_handshake<S>(stream: &mut S) -> Result<Vec<u8>, RtmpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = Handshake::new(PeerType::Client);
    let c0c1 = handshake.generate_outbound_p0_and_p1()?;
    stream.write_all(&c0c1).await?;
    stream.flush().await?;

    let mut buf = vec![0u8; READ_SIZE];
    loop {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            return Err(RtmpError::Closed);
        }

        match handshake.process_bytes(&buf[..read])? {
            HandshakeProcessResult::InProgress { response_bytes } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                    stream.flush().await?;
                }
            }
            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                    stream.flush().await?;
                }
                debug!(leftover = remaining_bytes.len(), "handshake complete");
                return Ok(remaining_bytes);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tokio::io::{DuplexStream, duplex};

    use super::*;

    /// Server half of the handshake; returns bytes read past it.
    pub(crate) async fn server_handshake(stream: &mut DuplexStream) -> Vec<u8> {
        let mut handshake = Handshake::new(PeerType::Server);
        let mut buf = vec![0u8; READ_SIZE];
        loop {
            let read = stream.read(&mut buf).await.unwrap();
            assert!(read > 0, "client hung up during the handshake");
            match handshake.process_bytes(&buf[..read]).unwrap() {
                HandshakeProcessResult::InProgress { response_bytes } => {
                    stream.write_all(&response_bytes).await.unwrap();
                }
                HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                } => {
                    stream.write_all(&response_bytes).await.unwrap();
                    return remaining_bytes;
                }
            }
        }
    }

    #[tokio::test]
    async fn completes_against_a_server_peer() {
        let (mut client, mut server) = duplex(16 * 1024);
        let server_task = tokio::spawn(async move {
            let leftover = server_handshake(&mut server).await;
            server.write_all(&[0xAB, 0xCD]).await.unwrap();
            (leftover, server)
        });

        let leftover = client_handshake(&mut client).await.unwrap();
        let (server_leftover, _server) = server_task.await.unwrap();
        assert!(server_leftover.is_empty());

        // Anything after the handshake is either handed back or still queued.
        let mut rest = leftover;
        while rest.len() < 2 {
            let mut byte = [0u8; 1];
            client.read_exact(&mut byte).await.unwrap();
            rest.push(byte[0]);
        }
        assert_eq!(rest, vec![0xAB, 0xCD]);
    }

    #[tokio::test]
    async fn peer_closing_early_is_reported() {
        let (mut client, server) = duplex(16 * 1024);
        let server_task = tokio::spawn(async move {
            let mut server = server;
            let mut c0c1 = [0u8; 1537];
            server.read_exact(&mut c0c1).await.unwrap();
            assert_eq!(c0c1[0], 3);
        });

        let err = client_handshake(&mut client).await.unwrap_err();
        server_task.await.unwrap();
        assert!(matches!(err, RtmpError::Closed));
    }
}
