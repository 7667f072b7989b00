//! Retry-until-response invocation policy.
//!
//! The request is marshalled once and the identical bytes (same request
//! identifier) are re-sent each round, which is what lets the server's
//! at-most-once dispatch recognize retries as duplicates. A round fails on
//! simulated loss, timeout, or an empty reply; transport faults are logged
//! and count as failed rounds too. Exhaustion produces a synthetic
//! NETWORK_ERROR response rather than an error, since the caller treats it
//! like any other status.

use crate::client::transport::ClientTransport;
use crate::codec;
use crate::error::ServiceError;
use crate::protocol::{Request, Response, Status};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    /// Invokes one logical request, retrying until a reply arrives or the
    /// rounds are exhausted.
    pub async fn invoke(
        &self,
        transport: &ClientTransport,
        request: &Request,
    ) -> Result<Response, ServiceError> {
        let wire = codec::marshal_request(request);

        for attempt in 1..=self.max_retries {
            match transport.send_and_receive(&wire).await {
                Ok(Some(reply)) if !reply.is_empty() => {
                    return Ok(match codec::unmarshal_response(&reply) {
                        Ok(response) => response,
                        Err(e) => {
                            warn!(id = request.request_id, error = %e, "structurally invalid reply");
                            Response::status_only(
                                Status::GeneralError,
                                format!("invalid reply from server: {e}"),
                            )
                        }
                    });
                }
                Ok(_) => {
                    warn!(
                        id = request.request_id,
                        attempt,
                        max = self.max_retries,
                        "no reply, retrying"
                    );
                }
                // A datagram that cannot fit will never fit; don't burn rounds.
                Err(e @ ServiceError::OversizedDatagram(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        id = request.request_id,
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "transport fault, retrying"
                    );
                }
            }
        }

        Ok(Response::network_error(format!(
            "no reply after {} attempts",
            self.max_retries
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::LossGate;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::sync::Mutex;

    /// A server that swallows every datagram, recording what it saw.
    async fn black_hole() -> (std::net::SocketAddr, Arc<Mutex<Vec<Vec<u8>>>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            while let Ok((n, _)) = socket.recv_from(&mut buf).await {
                sink.lock().await.push(buf[..n].to_vec());
            }
        });
        (addr, seen)
    }

    #[tokio::test]
    async fn test_exhaustion_yields_network_error() {
        let (addr, seen) = black_hole().await;
        let transport =
            ClientTransport::connect(addr, Duration::from_millis(50), LossGate::lossless())
                .await
                .unwrap();
        let policy = RetryPolicy::new(3);

        let request = Request::read("/f", 0, 4);
        let response = policy.invoke(&transport, &request).await.unwrap();

        assert_eq!(response.status, Status::NetworkError);
        assert!(response.message.contains('3'));

        // Every round re-sent the identical datagram: same request id bytes.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let seen = seen.lock().await;
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|d| d == &seen[0]));
        let decoded = codec::unmarshal_request(&seen[0]).unwrap();
        assert_eq!(decoded.request_id, request.request_id);
    }

    #[tokio::test]
    async fn test_first_reply_wins() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let reply = Response::status_only(Status::Success, "hello");
                let _ = socket.send_to(&codec::marshal_response(&reply), peer).await;
            }
        });

        let transport =
            ClientTransport::connect(addr, Duration::from_secs(1), LossGate::lossless())
                .await
                .unwrap();
        let policy = RetryPolicy::new(3);

        let response = policy
            .invoke(&transport, &Request::file_info("/f"))
            .await
            .unwrap();
        assert_eq!(response.status, Status::Success);
        assert_eq!(response.message, "hello");
    }

    #[tokio::test]
    async fn test_garbage_reply_becomes_general_error() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(b"not a response", peer).await;
            }
        });

        let transport =
            ClientTransport::connect(addr, Duration::from_secs(1), LossGate::lossless())
                .await
                .unwrap();
        let policy = RetryPolicy::new(3);

        let response = policy
            .invoke(&transport, &Request::file_info("/f"))
            .await
            .unwrap();
        assert_eq!(response.status, Status::GeneralError);
    }

    #[tokio::test]
    async fn test_zero_retries_clamped_to_one() {
        let (addr, seen) = black_hole().await;
        let transport =
            ClientTransport::connect(addr, Duration::from_millis(50), LossGate::lossless())
                .await
                .unwrap();

        let response = RetryPolicy::new(0)
            .invoke(&transport, &Request::file_info("/f"))
            .await
            .unwrap();
        assert_eq!(response.status, Status::NetworkError);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().await.len(), 1);
    }
}
