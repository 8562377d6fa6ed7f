//! Connection handshake.
//!
//! Every connection starts with both sides exchanging a fixed token before any
//! other traffic is trusted. The server receives first and only answers once the
//! client's token checked out; the client sends first and then waits for the
//! answer.
//!
//! ```text
//! Client                      Server
//!   |  -- HANDSHAKE_TOKEN -->   |   receive_handshake
//!   |  <-- HANDSHAKE_TOKEN --   |   send_handshake
//!   |        ESTABLISHED        |
//! ```
//!
//! Each step is bounded by a timeout so a silent peer cannot hold a
//! connection half-open.

use crate::HandshakeError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Token exchanged by both ends of a matched build.
pub const HANDSHAKE_TOKEN: [u8; 8] = *b"CDMN\x01\x02\x03\x04";

/// Write the handshake token and flush it.
pub async fn send_handshake<W: AsyncWrite + Unpin>(
    writer: &mut W,
    timeout: Duration,
) -> Result<(), HandshakeError> {
    let write = async {
        writer.write_all(&HANDSHAKE_TOKEN).await?;
        writer.flush().await
    };

    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandshakeError::SendFailed {
            reason: e.to_string(),
        }),
        Err(_) => Err(HandshakeError::Timeout(timeout)),
    }
}

/// Read one handshake token and check it. Single attempt, no retry.
pub async fn receive_handshake<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<(), HandshakeError> {
    let mut buf = [0u8; HANDSHAKE_TOKEN.len()];
    let read = tokio::time::timeout(timeout, reader.read_exact(&mut buf)).await;

    match read {
        Ok(Ok(_)) if buf == HANDSHAKE_TOKEN => Ok(()),
        Ok(Ok(_)) => {
            debug!("Rejecting handshake token {:02x?}", buf);
            Err(HandshakeError::ReceiveFailed {
                reason: "unexpected handshake token".to_string(),
            })
        }
        Err(_) => Err(HandshakeError::Timeout(timeout)),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(HandshakeError::ReceiveFailed {
                reason: "peer closed before sending a full handshake".to_string(),
            })
        }
        Ok(Err(e)) => Err(HandshakeError::ReceiveFailed {
            reason: e.to_string(),
        }),
    }
}

/// Server side: validate the peer's token, then answer with our own.
///
/// Nothing is sent when the receive step fails.
pub async fn server_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    timeout: Duration,
) -> Result<(), HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    receive_handshake(reader, timeout).await?;
    send_handshake(writer, timeout).await
}

/// Client side: send our token, then wait for the server's.
pub async fn client_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    timeout: Duration,
) -> Result<(), HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    send_handshake(writer, timeout).await?;
    receive_handshake(reader, timeout).await
}
