//! An established connection.
//!
//! A `Session` only exists after the handshake succeeded on its side. It owns
//! both halves of the TCP stream and is torn down when dropped. What travels
//! over it afterwards belongs to the layer above.

use crate::Result;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Which end of the connection this session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted by a `Listener`.
    Server,
    /// Opened by a `ClientProxy`.
    Client,
}

/// Live transport bound to one connected socket.
#[derive(Debug)]
pub struct Session {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    peer_addr: SocketAddr,
    role: Role,
}

impl Session {
    pub(crate) fn from_halves(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        peer_addr: SocketAddr,
        role: Role,
    ) -> Self {
        Self {
            reader,
            writer,
            peer_addr,
            role,
        }
    }

    /// Split a stream into the read/write halves a session is built from.
    pub(crate) fn open_io(stream: TcpStream) -> (OwnedReadHalf, OwnedWriteHalf) {
        stream.into_split()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.reader.local_addr()?)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Borrow both halves of the established stream.
    pub fn io_mut(&mut self) -> (&mut OwnedReadHalf, &mut OwnedWriteHalf) {
        (&mut self.reader, &mut self.writer)
    }

    /// Give up the session and keep the raw halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        (self.reader, self.writer)
    }

    /// Close the write side and drop the connection.
    pub async fn shutdown(mut self) -> Result<()> {
        debug!("Closing {:?} session with {}", self.role, self.peer_addr);
        self.writer.shutdown().await?;
        Ok(())
    }
}
