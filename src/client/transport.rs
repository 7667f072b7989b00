//! Client datagram transport with timeout and loss simulation.
//!
//! One connected UDP socket serves both the request-reply exchange and the
//! monitor callback listen. Simulated send loss, simulated receive loss, and
//! a receive timeout all surface as `Ok(None)`; the retry policy treats them
//! uniformly as a failed round. Only real socket faults become errors.

use crate::config::MAX_DATAGRAM_SIZE;
use crate::error::ServiceError;
use crate::faults::LossGate;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug)]
pub struct ClientTransport {
    socket: UdpSocket,
    recv_timeout: Duration,
    gate: LossGate,
}

impl ClientTransport {
    /// Binds an ephemeral local port and connects it to the server.
    pub async fn connect(
        server: SocketAddr,
        recv_timeout: Duration,
        gate: LossGate,
    ) -> Result<Self, ServiceError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server).await?;
        Ok(Self {
            socket,
            recv_timeout,
            gate,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sends one request datagram and waits for one reply.
    ///
    /// Returns `Ok(None)` when the simulated network ate the request or the
    /// reply, or when no reply arrived within the receive timeout.
    pub async fn send_and_receive(&self, datagram: &[u8]) -> Result<Option<Vec<u8>>, ServiceError> {
        if datagram.len() > MAX_DATAGRAM_SIZE {
            return Err(ServiceError::OversizedDatagram(datagram.len()));
        }

        if !self.gate.pass_send() {
            debug!("simulated loss of request datagram");
            return Ok(None);
        }
        self.socket.send(datagram).await?;

        if !self.gate.pass_recv() {
            debug!("simulated loss of reply datagram");
            return Ok(None);
        }
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match timeout(self.recv_timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(len)) => Ok(Some(buf[..len].to_vec())),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!(
                    timeout_ms = self.recv_timeout.as_millis() as u64,
                    "timed out waiting for reply"
                );
                Ok(None)
            }
        }
    }

    /// Waits up to `wait` for a server-initiated callback datagram.
    ///
    /// Unlike the request path this listen is not loss-gated; callback loss
    /// is already best-effort on the server side.
    pub async fn recv_callback(&self, wait: Duration) -> Result<Option<Vec<u8>>, ServiceError> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match timeout(wait, self.socket.recv(&mut buf)).await {
            Ok(Ok(len)) => Ok(Some(buf[..len].to_vec())),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}
