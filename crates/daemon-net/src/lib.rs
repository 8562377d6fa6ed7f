//! daemon-net - connection handshake and serializable client proxies for the
//! compiler daemon.
//!
//! A daemon exposes a [`Listener`]; clients hold a [`ClientProxy`], a plain
//! value naming the server that can be encoded to bytes, moved to another
//! process and decoded there. Either copy can later open a [`Session`], and
//! both sides exchange a handshake token before the session is handed out.
//!
//! # Example
//!
//! ```rust,no_run
//! use daemon_net::{ClientProxy, IpcConfig, Listener};
//!
//! #[tokio::main]
//! async fn main() -> daemon_net::Result<()> {
//!     let listener = Listener::bind(0).await?;
//!     let pending = listener.await_client();
//!
//!     // Ship the proxy as bytes, then rebuild it.
//!     let bytes = ClientProxy::new(listener.port()).to_bytes()?;
//!     let proxy = ClientProxy::from_bytes(&bytes)?;
//!
//!     let _client = proxy.connect().await?;
//!     let _server = pending.wait(IpcConfig::AWAIT_CLIENT_TIMEOUT).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ipc;

pub use config::IpcConfig;
pub use error::{DaemonError, HandshakeError, Result};
pub use ipc::{
    decode_proxy, encode_proxy, read_proxy, write_proxy, ClientProxy, ConnectOptions, Listener,
    PendingClient, Role, ServiceKind, Session,
};
