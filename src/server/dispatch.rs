//! Invocation-semantics dispatch for the server.
//!
//! Two modes share one narrow entry point, `process(bytes, peer) -> Dispatch`:
//! at-least-once executes every inbound request, while at-most-once filters
//! duplicates through a reply cache keyed by request identifier, replaying the
//! original reply without re-invoking the file service. The write operations
//! are not idempotent, so at-least-once is only safe on a lossless network.
//!
//! SHUTDOWN bypasses both modes and yields the distinguished outcome that
//! terminates the transport loop. Malformed datagrams are logged and dropped.

use crate::codec;
use crate::protocol::{Op, Response, Status};
use crate::server::FileService;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Invocation semantics, chosen once at server start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Re-executes duplicates; unsafe for the non-idempotent write ops.
    AtLeastOnce,
    /// Filters duplicates through the reply cache.
    AtMostOnce,
}

impl FromStr for InvocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at_least_once" | "at-least-once" => Ok(InvocationMode::AtLeastOnce),
            "at_most_once" | "at-most-once" => Ok(InvocationMode::AtMostOnce),
            other => Err(format!(
                "unknown invocation mode {other:?} (expected at_least_once or at_most_once)"
            )),
        }
    }
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::AtLeastOnce => f.write_str("at_least_once"),
            InvocationMode::AtMostOnce => f.write_str("at_most_once"),
        }
    }
}

/// Outcome of processing one inbound datagram.
#[derive(Debug)]
pub enum Dispatch {
    /// Marshalled reply to send back to the requesting peer.
    Reply(Vec<u8>),
    /// Nothing to send (malformed input).
    Drop,
    /// Marshalled shutdown reply; the transport loop stops after sending it.
    Shutdown(Vec<u8>),
}

/// Unmarshals inbound datagrams and routes them per the invocation mode.
#[derive(Debug)]
pub struct Dispatcher {
    mode: InvocationMode,
    service: FileService,
    /// Reply cache for at-most-once; retained for the process lifetime.
    replies: Mutex<HashMap<u64, Response>>,
}

impl Dispatcher {
    pub fn new(mode: InvocationMode, service: FileService) -> Self {
        Self {
            mode,
            service,
            replies: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    /// Processes one datagram from `peer` into a dispatch outcome.
    pub async fn process(&self, datagram: &[u8], peer: SocketAddr) -> Dispatch {
        let request = match codec::unmarshal_request(datagram) {
            Ok(request) => request,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed datagram");
                return Dispatch::Drop;
            }
        };

        if request.op == Op::Shutdown {
            info!(%peer, "shutdown requested");
            let reply = Response::status_only(Status::Shutdown, "server shutting down");
            return Dispatch::Shutdown(codec::marshal_response(&reply));
        }

        let response = match self.mode {
            InvocationMode::AtLeastOnce => self.service.handle(&request, peer).await,
            InvocationMode::AtMostOnce => {
                let cached = self.replies.lock().await.get(&request.request_id).cloned();
                match cached {
                    Some(reply) => {
                        debug!(
                            id = request.request_id,
                            %peer,
                            "duplicate request, replaying cached reply"
                        );
                        reply
                    }
                    None => {
                        let reply = self.service.handle(&request, peer).await;
                        self.replies
                            .lock()
                            .await
                            .insert(request.request_id, reply.clone());
                        reply
                    }
                }
            }
        };

        Dispatch::Reply(codec::marshal_response(&response))
    }
}
