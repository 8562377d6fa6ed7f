//! Byte encoding for client proxies.
//!
//! Proxies travel as a small versioned JSON envelope holding only their
//! identity fields:
//!
//! ```text
//! {"format_version":1,"proxy":{"server_host":"127.0.0.1","server_port":6999,"service":"default"}}
//! ```
//!
//! The layout itself is not a public contract. What is guaranteed is that a
//! decoded proxy equals the encoded one and can open its own sessions.

use super::proxy::ClientProxy;
use crate::config::IpcConfig;
use crate::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::debug;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    proxy: &'a ClientProxy,
}

#[derive(Deserialize)]
struct Envelope {
    proxy: ClientProxy,
}

/// Only the version, so a future layout can be rejected before parsing it.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// Encode a proxy's identity into bytes.
pub fn encode_proxy(proxy: &ClientProxy) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(&EnvelopeRef {
        format_version: IpcConfig::PROXY_FORMAT_VERSION,
        proxy,
    })?;
    Ok(bytes)
}

/// Rebuild a proxy from bytes produced by [`encode_proxy`].
pub fn decode_proxy(bytes: &[u8]) -> Result<ClientProxy> {
    let probe: VersionProbe = serde_json::from_slice(bytes)?;
    if probe.format_version != IpcConfig::PROXY_FORMAT_VERSION {
        return Err(DaemonError::UnsupportedFormat {
            found: probe.format_version,
            expected: IpcConfig::PROXY_FORMAT_VERSION,
        });
    }

    let envelope: Envelope = serde_json::from_slice(bytes)?;
    Ok(envelope.proxy)
}

/// Encode a proxy and write it to `writer`.
pub fn write_proxy<W: Write>(mut writer: W, proxy: &ClientProxy) -> Result<()> {
    let bytes = encode_proxy(proxy)?;
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .map_err(DaemonError::serialization_io)?;
    debug!("Wrote {} byte proxy for port {}", bytes.len(), proxy.server_port());
    Ok(())
}

/// Read everything from `reader` and decode it as a proxy.
pub fn read_proxy<R: Read>(mut reader: R) -> Result<ClientProxy> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(DaemonError::serialization_io)?;
    decode_proxy(&bytes)
}

impl ClientProxy {
    /// Shorthand for [`encode_proxy`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_proxy(self)
    }

    /// Shorthand for [`decode_proxy`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_proxy(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::proxy::ServiceKind;

    #[test]
    fn test_roundtrip_preserves_identity() {
        let proxy = ClientProxy::with_host("localhost", 6999).service(ServiceKind::CompilerServices);
        let decoded = decode_proxy(&encode_proxy(&proxy).unwrap()).unwrap();

        assert_eq!(decoded, proxy);
        assert_eq!(decoded.server_port(), 6999);
        assert_eq!(decoded.server_host(), "localhost");
        assert_eq!(decoded.service_kind(), ServiceKind::CompilerServices);
    }

    #[test]
    fn test_envelope_carries_format_version() {
        let bytes = ClientProxy::new(7010).to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["format_version"], IpcConfig::PROXY_FORMAT_VERSION);
        assert_eq!(value["proxy"]["server_port"], 7010);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let bytes = br#"{"format_version":99,"proxy":{"endpoint":"somewhere"}}"#;
        match decode_proxy(bytes) {
            Err(DaemonError::UnsupportedFormat { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, IpcConfig::PROXY_FORMAT_VERSION);
            }
            other => panic!("Expected UnsupportedFormat, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_service_defaults() {
        let bytes = br#"{"format_version":1,"proxy":{"server_host":"127.0.0.1","server_port":7011}}"#;
        let proxy = decode_proxy(bytes).unwrap();
        assert_eq!(proxy.service_kind(), ServiceKind::Default);
        assert_eq!(proxy.server_port(), 7011);
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        let result = ClientProxy::from_bytes(b"\xac\xed\x00\x05sr");
        assert!(matches!(result, Err(DaemonError::Serialization { .. })));
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        let bytes = br#"{"format_version":1,"proxy":{"server_host":"127.0.0.1","server_port":70000}}"#;
        assert!(matches!(
            decode_proxy(bytes),
            Err(DaemonError::Serialization { .. })
        ));
    }

    #[test]
    fn test_stream_roundtrip() {
        let proxy = ClientProxy::compiler_services(7012);
        let mut buf = Vec::new();
        write_proxy(&mut buf, &proxy).unwrap();

        let decoded = read_proxy(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(decoded, proxy);
    }

    #[test]
    fn test_read_failure_is_serialization_error() {
        struct FailingReader;

        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            }
        }

        match read_proxy(FailingReader) {
            Err(DaemonError::Serialization { message, .. }) => assert!(message.contains("disk gone")),
            other => panic!("Expected Serialization error, got: {:?}", other),
        }
    }
}
