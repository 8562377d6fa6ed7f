//! Listening side of a daemon connection.
//!
//! A `Listener` binds one port and hands out one established `Session` per
//! accept. Accepts on the same listener never overlap: each one holds the
//! accept gate from `accept()` until its handshake has finished.
//!
//! # Timeouts
//!
//! Every handshake step is bounded by the listener's handshake timeout. The
//! overall wait for a client is bounded by the caller through
//! [`PendingClient::wait`], which aborts the background task on expiry.

use super::handshake::server_handshake;
use super::session::{Role, Session};
use crate::config::IpcConfig;
use crate::{DaemonError, HandshakeError, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Server endpoint that accepts clients one at a time.
#[derive(Debug)]
pub struct Listener {
    listener: Arc<TcpListener>,
    addr: SocketAddr,
    handshake_timeout: Duration,
    accept_gate: Arc<Mutex<()>>,
}

impl Listener {
    /// Bind to `127.0.0.1:port`. Port 0 lets the OS pick a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await
    }

    /// Bind to an explicit address.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| DaemonError::Bind { addr, source })?;
        let addr = listener.local_addr()?;

        info!("Daemon listener bound on {}", addr);

        Ok(Self {
            listener: Arc::new(listener),
            addr,
            handshake_timeout: IpcConfig::HANDSHAKE_TIMEOUT,
            accept_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Override the bound applied to each handshake step.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Accept one client and run the server side of the handshake.
    pub async fn accept_session(&self) -> std::result::Result<Session, HandshakeError> {
        let _gate = self.accept_gate.lock().await;
        accept_and_handshake(&self.listener, self.handshake_timeout).await
    }

    /// Start accepting one client in the background.
    ///
    /// Returns immediately; the caller keeps running while the listener waits
    /// for a peer and is expected to bound its wait on the returned handle.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the accept runs on a
    /// spawned task.
    pub fn await_client(&self) -> PendingClient {
        let listener = self.listener.clone();
        let gate = self.accept_gate.clone();
        let timeout = self.handshake_timeout;

        let handle = tokio::spawn(async move {
            let _gate = gate.lock_owned().await;
            accept_and_handshake(&listener, timeout).await
        });

        PendingClient { handle }
    }
}

async fn accept_and_handshake(
    listener: &TcpListener,
    timeout: Duration,
) -> std::result::Result<Session, HandshakeError> {
    debug!("Waiting for client on {:?}", listener.local_addr().ok());

    let (stream, peer_addr) = listener
        .accept()
        .await
        .map_err(|e| HandshakeError::AcceptFailed {
            reason: e.to_string(),
        })?;

    debug!("Client accepted from {}", peer_addr);

    let (mut reader, mut writer) = Session::open_io(stream);
    if let Err(e) = server_handshake(&mut reader, &mut writer, timeout).await {
        warn!("Handshake with {} failed: {}", peer_addr, e);
        return Err(e);
    }

    info!("Connection with {} established", peer_addr);
    Ok(Session::from_halves(reader, writer, peer_addr, Role::Server))
}

/// An accept running in the background. Dropping it abandons the accept.
#[derive(Debug)]
pub struct PendingClient {
    handle: JoinHandle<std::result::Result<Session, HandshakeError>>,
}

impl PendingClient {
    /// Wait at most `timeout` for the client to connect and finish the
    /// handshake.
    ///
    /// On expiry the background task is aborted, which releases any socket it
    /// had accepted, and `HandshakeError::Timeout` is returned.
    pub async fn wait(mut self, timeout: Duration) -> std::result::Result<Session, HandshakeError> {
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(HandshakeError::AcceptFailed {
                reason: join_err.to_string(),
            }),
            Err(_) => {
                warn!("No client completed the handshake within {:?}", timeout);
                self.handle.abort();
                Err(HandshakeError::Timeout(timeout))
            }
        }
    }

    /// Boolean view of [`wait`](Self::wait): `true` only if the handshake was
    /// both received and answered.
    pub async fn established(self, timeout: Duration) -> bool {
        self.wait(timeout).await.is_ok()
    }
}

impl Drop for PendingClient {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
