//! daemon-net - drive daemon handshakes from the command line.
//!
//! `listen` runs a one-shot daemon listener, `export` writes a client proxy
//! file and `connect` reconnects from such a file. Together they exercise the
//! proxy round trip across separate processes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use daemon_net::{
    read_proxy, write_proxy, ClientProxy, ConnectOptions, IpcConfig, Listener, ServiceKind,
};
use std::fs::File;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "daemon-net")]
#[command(about = "Handshake and proxy tooling for the compiler daemon")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bind a port and accept clients one at a time
    Listen {
        /// Host to bind to
        #[arg(long, default_value = IpcConfig::DEFAULT_HOST)]
        host: String,

        /// Port to listen on (0 = auto-assign)
        #[arg(short, long, default_value_t = IpcConfig::DEFAULT_PORT)]
        port: u16,

        /// Number of clients to accept before exiting
        #[arg(long, default_value_t = 1)]
        sessions: u32,

        /// Seconds to wait for each client
        #[arg(long, default_value_t = IpcConfig::AWAIT_CLIENT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },

    /// Write a client proxy file
    Export {
        /// Server host the proxy points at
        #[arg(long, default_value = IpcConfig::DEFAULT_HOST)]
        host: String,

        /// Server port the proxy points at
        #[arg(short, long, default_value_t = IpcConfig::DEFAULT_PORT)]
        port: u16,

        /// Service facade (default, compiler-services)
        #[arg(long, default_value = "default")]
        service: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Connect using a proxy file and complete the handshake
    Connect {
        /// Proxy file written by `export`
        #[arg(long)]
        proxy: PathBuf,

        /// Seconds allowed for connecting and for the handshake
        #[arg(long, default_value_t = IpcConfig::CONNECT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.debug, std::env::var("RUST_LOG").ok()))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.command {
        Command::Listen {
            host,
            port,
            sessions,
            timeout_secs,
        } => listen(&host, port, sessions, Duration::from_secs(timeout_secs)).await,
        Command::Export {
            host,
            port,
            service,
            out,
        } => export(host, port, &service, &out),
        Command::Connect {
            proxy,
            timeout_secs,
        } => connect(&proxy, Duration::from_secs(timeout_secs)).await,
    }
}

/// `RUST_LOG` wins when it parses; otherwise `--debug` picks the level.
fn log_filter(debug: bool, rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if debug { "debug" } else { "info" }))
}

fn listen_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid listen host {}", host))?;
    Ok(SocketAddr::new(ip, port))
}

async fn listen(host: &str, port: u16, sessions: u32, timeout: Duration) -> Result<()> {
    let listener = Listener::bind_addr(listen_addr(host, port)?).await?;

    // Print port for scripts to read (intentional stdout)
    println!("DAEMON_PORT={}", listener.port());

    let mut failures = 0u32;
    for n in 1..=sessions {
        match listener.await_client().wait(timeout).await {
            Ok(session) => {
                info!("Session {}/{} established with {}", n, sessions, session.peer_addr());
            }
            Err(e) => {
                error!("Session {}/{} failed ({}): {}", n, sessions, e.kind(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} handshakes failed", failures, sessions);
    }
    Ok(())
}

fn export(host: String, port: u16, service: &str, out: &Path) -> Result<()> {
    let service = parse_service(service)?;
    let proxy = ClientProxy::with_host(host, port).service(service);

    let file = File::create(out).with_context(|| format!("cannot create {}", out.display()))?;
    write_proxy(file, &proxy)?;

    info!("Wrote {} proxy for {} to {}", service, proxy.server_addr(), out.display());
    Ok(())
}

async fn connect(path: &Path, timeout: Duration) -> Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let proxy = read_proxy(file)?;

    let options = ConnectOptions {
        connect_timeout: timeout,
        handshake_timeout: timeout,
    };
    let session = proxy.connect_with(options).await?;

    println!("ESTABLISHED {}", session.peer_addr());
    session.shutdown().await?;
    Ok(())
}

fn parse_service(s: &str) -> Result<ServiceKind> {
    match ServiceKind::from_str(s) {
        Some(kind) => Ok(kind),
        None => bail!("unknown service '{}' (expected default or compiler-services)", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_defaults() {
        let args = Args::try_parse_from(["daemon-net", "listen"]).unwrap();
        match args.command {
            Command::Listen {
                host,
                port,
                sessions,
                timeout_secs,
            } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 6999);
                assert_eq!(sessions, 1);
                assert_eq!(timeout_secs, IpcConfig::AWAIT_CLIENT_TIMEOUT.as_secs());
            }
            other => panic!("Expected Listen, got: {:?}", other),
        }
    }

    #[test]
    fn test_export_requires_out() {
        assert!(Args::try_parse_from(["daemon-net", "export", "--port", "7000"]).is_err());
    }

    #[test]
    fn test_debug_flag_is_global() {
        let args = Args::try_parse_from(["daemon-net", "connect", "--proxy", "p.json", "--debug"])
            .unwrap();
        assert!(args.debug);
    }

    #[test]
    fn test_log_filter_prefers_rust_log() {
        use tracing::level_filters::LevelFilter;

        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::DEBUG));

        let from_env = log_filter(false, Some("daemon_net=trace".to_string()));
        assert_eq!(from_env.max_level_hint(), Some(LevelFilter::TRACE));

        // Unparseable directives fall back to the flag.
        let fallback = log_filter(true, Some("daemon_net=loud".to_string()));
        assert_eq!(fallback.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_listen_addr_accepts_ipv4_and_ipv6() {
        assert_eq!(
            listen_addr("127.0.0.1", 6999).unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 6999))
        );

        let v6 = listen_addr("::1", 7000).unwrap();
        assert!(v6.is_ipv6());
        assert!(v6.ip().is_loopback());
        assert_eq!(v6.port(), 7000);
    }

    #[test]
    fn test_listen_addr_rejects_hostnames() {
        assert!(listen_addr("localhost", 6999).is_err());
        assert!(listen_addr("[::1]", 6999).is_err());
    }

    #[tokio::test]
    async fn test_listen_on_ipv6_loopback() {
        // Hosts without IPv6 cannot bind ::1; only the address parsing is checked there.
        if std::net::TcpListener::bind("[::1]:0").is_err() {
            return;
        }
        listen("::1", 0, 0, Duration::from_millis(10)).await.unwrap();
    }

    #[test]
    fn test_parse_service() {
        assert_eq!(parse_service("compiler-services").unwrap(), ServiceKind::CompilerServices);
        assert!(parse_service("rmi").is_err());
    }

    #[test]
    fn test_export_then_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("proxy.json");

        export("127.0.0.1".to_string(), 7200, "compiler-services", &out).unwrap();

        let proxy = read_proxy(File::open(&out).unwrap()).unwrap();
        assert_eq!(proxy, ClientProxy::compiler_services(7200));
    }

    #[tokio::test]
    async fn test_connect_from_exported_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("proxy.json");

        let listener = Listener::bind(0).await.unwrap();
        export("127.0.0.1".to_string(), listener.port(), "default", &out).unwrap();

        let pending = listener.await_client();
        connect(&out, Duration::from_secs(5)).await.unwrap();
        assert!(pending.established(Duration::from_secs(5)).await);
    }
}
