//! Tunnel relay.
//!
//! Both ends of the tunnel run the same node with different roles:
//!
//! - **Client mode** listens for local application connections and
//!   dials the tunnel server; outbound chunks are wrapped in cover
//!   frames, inbound frames are unwrapped.
//! - **Server mode** listens for tunnel connections and dials the
//!   upstream VPN endpoint; inbound frames are unwrapped, upstream
//!   chunks are wrapped on the way back.
//!
//! Every accepted connection spawns two independent copy tasks, one per
//! direction. There is no admission control: the relay trades fairness
//! for simplicity and lets the OS socket buffers do the pushback.

mod relay;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalogue::Catalogue;
use crate::engine::Fabricator;
use crate::error::{Error, Result};
use crate::obfuscate::Obfuscate;
use crate::rotation::ProtocolSelector;

/// Which side of the tunnel this node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Accept application traffic, wrap toward the tunnel server
    Client,
    /// Accept tunnel traffic, unwrap toward the VPN endpoint
    Server,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client" => Ok(Mode::Client),
            "server" => Ok(Mode::Server),
            other => Err(Error::config(format!(
                "unknown mode '{}', expected client or server",
                other
            ))),
        }
    }
}

/// Runtime tunnel configuration from the CLI.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Node role
    pub mode: Mode,
    /// Listen port for both modes
    pub listen_port: u16,
    /// Tunnel server address, required in client mode
    pub server_addr: Option<String>,
    /// Upstream VPN endpoint, used in server mode
    pub vpn_server_addr: String,
}

impl TunnelConfig {
    fn validate(&self) -> Result<()> {
        if self.mode == Mode::Client && self.server_addr.is_none() {
            return Err(Error::config("client mode requires a server address"));
        }
        Ok(())
    }

    fn upstream_addr(&self) -> &str {
        match self.mode {
            Mode::Client => self.server_addr.as_deref().unwrap_or_default(),
            Mode::Server => &self.vpn_server_addr,
        }
    }
}

/// One tunnel endpoint: accept loop plus per-connection relay tasks.
pub struct TunnelNode {
    pub(crate) catalogue: Arc<Catalogue>,
    pub(crate) fabricator: Fabricator,
    pub(crate) selector: ProtocolSelector,
    pub(crate) obfuscator: Arc<dyn Obfuscate>,
    config: TunnelConfig,
}

impl TunnelNode {
    /// Create a node over a loaded catalogue. Fails on an invalid
    /// configuration (missing server address in client mode).
    pub fn new(
        catalogue: Catalogue,
        config: TunnelConfig,
        obfuscator: Arc<dyn Obfuscate>,
    ) -> Result<Self> {
        config.validate()?;
        let selector = ProtocolSelector::new(&catalogue.options);
        Ok(Self {
            catalogue: Arc::new(catalogue),
            fabricator: Fabricator::new(Arc::clone(&obfuscator)),
            selector,
            obfuscator,
            config,
        })
    }

    /// Bind the listen socket. A bind failure is startup-fatal.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("0.0.0.0:{}", self.config.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(mode = ?self.config.mode, %addr, "listening");
        Ok(listener)
    }

    /// Accept loop. Exits when the shutdown signal fires; individual
    /// connection failures never take the loop down.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("shutdown signal received, closing listener");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let node = Arc::clone(&self);
                            tokio::spawn(async move {
                                node.handle_connection(stream, peer).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept error");
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, inbound: TcpStream, peer: SocketAddr) {
        tracing::debug!(%peer, "connection accepted");

        let upstream_addr = self.config.upstream_addr().to_string();
        let upstream = match TcpStream::connect(&upstream_addr).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(%peer, addr = %upstream_addr, error = %e, "dial failed");
                return;
            }
        };

        let (in_read, in_write) = inbound.into_split();
        let (up_read, up_write) = upstream.into_split();

        // The wrap side owns the connection id (and with it all
        // sequence state); the unwrap side is stateless.
        let (mut wrap_task, mut unwrap_task): (
            JoinHandle<std::io::Result<(u64, u64)>>,
            JoinHandle<std::io::Result<(u64, u64)>>,
        ) = match self.config.mode {
            Mode::Client => (
                tokio::spawn(relay::copy_wrap(
                    Arc::clone(&self),
                    in_read,
                    up_write,
                    format!("client_{}", peer),
                )),
                tokio::spawn(relay::copy_unwrap(
                    Arc::clone(&self),
                    up_read,
                    in_write,
                    format!("client_{}", peer),
                )),
            ),
            Mode::Server => (
                tokio::spawn(relay::copy_wrap(
                    Arc::clone(&self),
                    up_read,
                    in_write,
                    format!("server_{}", peer),
                )),
                tokio::spawn(relay::copy_unwrap(
                    Arc::clone(&self),
                    in_read,
                    up_write,
                    format!("server_{}", peer),
                )),
            ),
        };

        // When one direction ends (EOF or error) the sibling is
        // aborted; dropping the halves closes both sockets.
        tokio::select! {
            res = &mut wrap_task => {
                log_direction("wrap", peer, res);
                unwrap_task.abort();
            }
            res = &mut unwrap_task => {
                log_direction("unwrap", peer, res);
                wrap_task.abort();
            }
        }
        tracing::debug!(%peer, "connection closed");
    }
}

fn log_direction(
    direction: &str,
    peer: SocketAddr,
    result: std::result::Result<std::io::Result<(u64, u64)>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok((bytes_in, bytes_out))) => {
            tracing::debug!(%peer, direction, bytes_in, bytes_out, "direction finished");
        }
        Ok(Err(e)) => {
            tracing::debug!(%peer, direction, error = %e, "direction failed");
        }
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscate::Identity;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const CATALOGUE: &str = r#"{
        "protocol_engine": {"name": "test", "version": "1"},
        "protocols": [{
            "identifier": "http_post",
            "transport": "tcp",
            "frame_structure": {
                "line_ending": "",
                "request_format": [
                    "POST /sync HTTP/1.1\r\n",
                    {"Host": "updates.example.com"},
                    {"Content-Length": "${DATA_SIZE}"},
                    "\r\n",
                    "<<VPN_DATA>>"
                ]
            }
        }]
    }"#;

    fn catalogue() -> Catalogue {
        Catalogue::from_json_slice(CATALOGUE.as_bytes()).unwrap()
    }

    fn node(mode: Mode, server_addr: Option<String>, vpn_addr: String) -> Arc<TunnelNode> {
        Arc::new(
            TunnelNode::new(
                catalogue(),
                TunnelConfig {
                    mode,
                    listen_port: 0,
                    server_addr,
                    vpn_server_addr: vpn_addr,
                },
                Arc::new(Identity),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("client".parse::<Mode>().unwrap(), Mode::Client);
        assert_eq!("server".parse::<Mode>().unwrap(), Mode::Server);
        assert!("proxy".parse::<Mode>().is_err());
    }

    #[test]
    fn test_client_mode_requires_server_addr() {
        let err = TunnelNode::new(
            catalogue(),
            TunnelConfig {
                mode: Mode::Client,
                listen_port: 0,
                server_addr: None,
                vpn_server_addr: "127.0.0.1:4040".to_string(),
            },
            Arc::new(Identity),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_echo() {
        // Plain echo service standing in for the VPN endpoint.
        let echo = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = echo.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    while let Ok(n) = stream.read(&mut buf).await {
                        if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // Server node: unwraps tunnel frames toward the echo service.
        let server = node(Mode::Server, None, echo_addr.to_string());
        let server_listener = server.bind().await.unwrap();
        let server_addr = server_listener.local_addr().unwrap();
        {
            let rx = shutdown_rx.clone();
            tokio::spawn(async move { server.run(server_listener, rx).await });
        }

        // Client node: wraps application bytes toward the server node.
        let client = node(
            Mode::Client,
            Some(format!("127.0.0.1:{}", server_addr.port())),
            String::new(),
        );
        let client_listener = client.bind().await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        {
            let rx = shutdown_rx.clone();
            tokio::spawn(async move { client.run(client_listener, rx).await });
        }

        // The application speaks through the client end and must see
        // its own bytes come back through both tunnel hops.
        let mut app = TcpStream::connect(format!("127.0.0.1:{}", client_addr.port()))
            .await
            .unwrap();
        app.write_all(b"ping through the tunnel").await.unwrap();

        let mut buf = [0u8; 4096];
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), app.read(&mut buf))
            .await
            .expect("echo timed out")
            .unwrap();
        assert_eq!(&buf[..n], b"ping through the tunnel");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let n = node(Mode::Server, None, "127.0.0.1:1".to_string());
        let listener = n.bind().await.unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = {
            let n = Arc::clone(&n);
            tokio::spawn(async move { n.run(listener, rx).await })
        };
        tx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("run did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
