//! Server side of the file access service.
//!
//! `UdpServer` runs a single receive loop over a loss-gated socket: each
//! inbound datagram passes the simulated-loss gate, goes through the
//! invocation-mode dispatcher, and the reply (if any) is sent back through
//! the same gate. Monitor callbacks ride the same socket via `ServerSocket`,
//! which every outbound datagram passes through.

pub mod dispatch;
pub mod monitor;
pub mod service;

pub use dispatch::{Dispatch, Dispatcher, InvocationMode};
pub use monitor::MonitorRegistry;
pub use service::FileService;

use crate::config::{ServerConfig, MAX_DATAGRAM_SIZE};
use crate::error::ServiceError;
use crate::faults::LossGate;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// The server's UDP socket plus the outbound half of the loss gate.
///
/// Replies and monitor callbacks both go through [`ServerSocket::send_to`],
/// so simulated outbound loss applies to every datagram the server emits.
#[derive(Debug)]
pub struct ServerSocket {
    socket: UdpSocket,
    gate: LossGate,
}

impl ServerSocket {
    pub async fn bind(addr: SocketAddr, gate: LossGate) -> Result<Self, ServiceError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket, gate })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Rolls the inbound gate for a freshly received datagram.
    fn admit_inbound(&self) -> bool {
        self.gate.pass_recv()
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Sends a datagram unless the outbound gate drops it. Returns whether
    /// the datagram actually went out.
    pub async fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<bool, ServiceError> {
        if !self.gate.pass_send() {
            debug!(%peer, "simulated outbound loss, dropping datagram");
            return Ok(false);
        }
        self.socket.send_to(data, peer).await?;
        Ok(true)
    }
}

/// The file server: socket, dispatcher, and the receive loop.
#[derive(Debug)]
pub struct UdpServer {
    socket: Arc<ServerSocket>,
    dispatcher: Dispatcher,
}

impl UdpServer {
    /// Binds the socket and assembles the dispatch stack from configuration.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServiceError> {
        let addr: SocketAddr = format!("{}:{}", config.address, config.port).parse()?;
        let mode: InvocationMode = config.mode.parse().map_err(ServiceError::Config)?;
        let gate = LossGate::new(config.send_probability, config.recv_probability);

        let socket = Arc::new(ServerSocket::bind(addr, gate).await?);
        let registry = Arc::new(MonitorRegistry::new(Arc::clone(&socket)));
        let service = FileService::new(PathBuf::from(&config.root_directory), registry);
        let dispatcher = Dispatcher::new(mode, service);

        if mode == InvocationMode::AtLeastOnce {
            warn!(
                "at_least_once dispatch re-executes duplicated write operations; \
                 use at_most_once for correctness under retries"
            );
        }

        Ok(Self { socket, dispatcher })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the receive loop until a shutdown request arrives.
    pub async fn run(self) -> Result<(), ServiceError> {
        info!(
            addr = %self.socket.local_addr()?,
            mode = %self.dispatcher.mode(),
            "server listening"
        );

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            if !self.socket.admit_inbound() {
                debug!(%peer, "simulated inbound loss, dropping datagram");
                continue;
            }

            match self.dispatcher.process(&buf[..len], peer).await {
                Dispatch::Reply(reply) => {
                    self.socket.send_to(&reply, peer).await?;
                }
                Dispatch::Drop => {}
                Dispatch::Shutdown(reply) => {
                    self.socket.send_to(&reply, peer).await?;
                    info!("server loop stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::protocol::{Request, Status};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn test_config(root: &TempDir) -> ServerConfig {
        ServerConfig {
            address: "127.0.0.1".to_string(),
            port: 0,
            root_directory: root.path().display().to_string(),
            mode: "at_most_once".to_string(),
            recv_probability: 1.0,
            send_probability: 1.0,
        }
    }

    #[tokio::test]
    async fn test_request_reply_over_loopback() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("f.txt"), b"payload").unwrap();

        let server = UdpServer::bind(&test_config(&root)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&codec::marshal_request(&Request::read("/f.txt", 0, 7)), addr)
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = codec::unmarshal_response(&buf[..n]).unwrap();
        assert_eq!(reply.status, Status::ReadSuccess);
        assert_eq!(reply.payload, b"payload");

        socket
            .send_to(&codec::marshal_request(&Request::shutdown()), addr)
            .await
            .unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_reply_reaches_client() {
        let root = TempDir::new().unwrap();
        let server = UdpServer::bind(&test_config(&root)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&codec::marshal_request(&Request::shutdown()), addr)
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = codec::unmarshal_response(&buf[..n]).unwrap();
        assert_eq!(reply.status, Status::Shutdown);

        timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_malformed_datagram_keeps_server_running() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("f.txt"), b"ok").unwrap();

        let server = UdpServer::bind(&test_config(&root)).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(b"garbage", addr).await.unwrap();

        // A well-formed request after the garbage still gets served.
        socket
            .send_to(&codec::marshal_request(&Request::read("/f.txt", 0, 2)), addr)
            .await
            .unwrap();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = codec::unmarshal_response(&buf[..n]).unwrap();
        assert_eq!(reply.status, Status::ReadSuccess);
    }

    #[tokio::test]
    async fn test_inbound_gate_drops_everything() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("f.txt"), b"ok").unwrap();

        let mut config = test_config(&root);
        config.recv_probability = 0.0;
        let server = UdpServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&codec::marshal_request(&Request::read("/f.txt", 0, 2)), addr)
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let outcome = timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await;
        assert!(outcome.is_err(), "expected no reply through a closed gate");
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_mode() {
        let root = TempDir::new().unwrap();
        let mut config = test_config(&root);
        config.mode = "maybe_once".to_string();
        assert!(UdpServer::bind(&config).await.is_err());
    }
}
