//! Connection establishment between the daemon and its clients.
//!
//! Plain TCP on loopback. Every connection opens with a fixed-token handshake
//! before the connection is handed out.
//!
//! # Architecture
//!
//! - **Handshake**: token exchange run once per connection by both sides
//! - **Listener**: binds a port and accepts one client per `await_client()`
//! - **Proxy**: serializable description of a server that can open sessions
//! - **Envelope**: versioned byte encoding of proxies
//! - **Session**: an established connection handed to the layer above

pub mod envelope;
pub mod handshake;
pub mod listener;
pub mod proxy;
pub mod session;

pub use envelope::{decode_proxy, encode_proxy, read_proxy, write_proxy};
pub use handshake::{
    client_handshake, receive_handshake, send_handshake, server_handshake, HANDSHAKE_TOKEN,
};
pub use listener::{Listener, PendingClient};
pub use proxy::{ClientProxy, ConnectOptions, ServiceKind};
pub use session::{Role, Session};
