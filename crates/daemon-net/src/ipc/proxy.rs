//! Client-side proxy for a daemon endpoint.
//!
//! A `ClientProxy` is plain data: which host and port to reach and which
//! service facade it talks to. Building one never touches the network, so a
//! proxy can be stored or shipped to another process before the server is even
//! up. [`ClientProxy::connect`] opens a fresh `Session` each time it is called.
//!
//! Each proxy also carries a `tracing::Span` used as its logging facility.
//! The span is local to the process holding the proxy: it is not serialized
//! and a decoded proxy gets a new one.

use super::handshake::client_handshake;
use super::session::{Role, Session};
use crate::config::IpcConfig;
use crate::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, Instrument, Span};

/// Which service facade a proxy speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Generic daemon client.
    #[default]
    Default,
    /// Callback facade the compiler uses to report back to its caller.
    CompilerServices,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Default => "default",
            ServiceKind::CompilerServices => "compiler-services",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" => Some(ServiceKind::Default),
            "compiler-services" => Some(ServiceKind::CompilerServices),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timeouts applied when a proxy opens a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: IpcConfig::CONNECT_TIMEOUT,
            handshake_timeout: IpcConfig::HANDSHAKE_TIMEOUT,
        }
    }
}

/// Serializable handle on a remote daemon endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ProxyRecord", into = "ProxyRecord")]
pub struct ClientProxy {
    server_host: String,
    server_port: u16,
    service: ServiceKind,
    log: Span,
}

/// Identity fields as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProxyRecord {
    server_host: String,
    server_port: u16,
    #[serde(default)]
    service: ServiceKind,
}

impl From<ProxyRecord> for ClientProxy {
    fn from(record: ProxyRecord) -> Self {
        ClientProxy::build(record.server_host, record.server_port, record.service)
    }
}

impl From<ClientProxy> for ProxyRecord {
    fn from(proxy: ClientProxy) -> Self {
        Self {
            server_host: proxy.server_host,
            server_port: proxy.server_port,
            service: proxy.service,
        }
    }
}

impl ClientProxy {
    /// Proxy for a daemon listening on the local loopback interface.
    pub fn new(server_port: u16) -> Self {
        Self::build(IpcConfig::DEFAULT_HOST.to_string(), server_port, ServiceKind::Default)
    }

    pub fn with_host(server_host: impl Into<String>, server_port: u16) -> Self {
        Self::build(server_host.into(), server_port, ServiceKind::Default)
    }

    /// Proxy for the compiler-services facade on the local daemon.
    pub fn compiler_services(server_port: u16) -> Self {
        Self::new(server_port).service(ServiceKind::CompilerServices)
    }

    /// Set the service facade this proxy speaks for.
    pub fn service(self, service: ServiceKind) -> Self {
        Self::build(self.server_host, self.server_port, service)
    }

    fn build(server_host: String, server_port: u16, service: ServiceKind) -> Self {
        let log = tracing::info_span!(
            "client_proxy",
            host = %server_host,
            port = server_port,
            service = %service
        );
        Self {
            server_host,
            server_port,
            service,
            log,
        }
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    pub fn service_kind(&self) -> ServiceKind {
        self.service
    }

    /// Logging span bound to this proxy in the current process.
    pub fn log(&self) -> &Span {
        &self.log
    }

    /// `host:port` string suitable for `TcpStream::connect`.
    pub fn server_addr(&self) -> String {
        if self.server_host.contains(':') && !self.server_host.starts_with('[') {
            format!("[{}]:{}", self.server_host, self.server_port)
        } else {
            format!("{}:{}", self.server_host, self.server_port)
        }
    }

    /// Open a session with default timeouts.
    pub async fn connect(&self) -> Result<Session> {
        self.connect_with(ConnectOptions::default()).await
    }

    /// Connect to the server and run the client side of the handshake.
    ///
    /// Fails with `Connect` when nothing accepts on the address, `Timeout`
    /// when the connect itself stalls, and `Handshake` when the server does
    /// not answer with a valid token.
    pub async fn connect_with(&self, options: ConnectOptions) -> Result<Session> {
        open_session(self.server_addr(), options)
            .instrument(self.log.clone())
            .await
    }
}

async fn open_session(addr: String, options: ConnectOptions) -> Result<Session> {
    let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr.as_str()))
        .await
        .map_err(|_| DaemonError::Timeout(options.connect_timeout))?
        .map_err(|source| DaemonError::Connect {
            addr: addr.clone(),
            source,
        })?;

    let peer_addr = stream.peer_addr()?;
    debug!("Connected to {}", peer_addr);

    let (mut reader, mut writer) = Session::open_io(stream);
    client_handshake(&mut reader, &mut writer, options.handshake_timeout).await?;

    info!("Handshake with {} complete", peer_addr);
    Ok(Session::from_halves(reader, writer, peer_addr, Role::Client))
}

impl PartialEq for ClientProxy {
    fn eq(&self, other: &Self) -> bool {
        self.server_host == other.server_host
            && self.server_port == other.server_port
            && self.service == other.service
    }
}

impl Eq for ClientProxy {}

impl Hash for ClientProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.server_host.hash(state);
        self.server_port.hash(state);
        self.service.hash(state);
    }
}
