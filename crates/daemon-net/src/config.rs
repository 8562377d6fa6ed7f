//! Centralized configuration for the daemon networking layer.
//!
//! Timeouts and protocol constants shared by the listener, the
//! connector and the proxy encoding.

use std::time::Duration;

/// IPC transport and handshake configuration.
pub struct IpcConfig;

impl IpcConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 6999;

    // Connection establishment
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
    pub const AWAIT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

    // Proxy envelope
    pub const PROXY_FORMAT_VERSION: u32 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(IpcConfig::HANDSHAKE_TIMEOUT > Duration::ZERO);
        assert!(IpcConfig::CONNECT_TIMEOUT >= IpcConfig::HANDSHAKE_TIMEOUT);
        assert!(IpcConfig::AWAIT_CLIENT_TIMEOUT > IpcConfig::HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_default_host_parses() {
        let ip: std::net::IpAddr = IpcConfig::DEFAULT_HOST.parse().expect("Should parse");
        assert!(ip.is_loopback());
    }
}
