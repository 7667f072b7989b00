//! Subscriber registry for file-update callbacks.
//!
//! Clients register an interest in a path for a bounded duration; every
//! mutating operation on that path then triggers an unsolicited CALLBACK
//! datagram to each live subscriber. Delivery is best-effort: no retry, no
//! acknowledgment, and loss is permitted. Expired subscriptions are pruned
//! lazily on each delivery scan.

use crate::codec;
use crate::protocol::{Op, Response, Status};
use crate::server::ServerSocket;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One client's interest in one path.
#[derive(Debug, Clone)]
struct Subscription {
    peer: SocketAddr,
    registered_at: Instant,
    duration: Duration,
}

impl Subscription {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.registered_at) > self.duration
    }
}

/// Registry of monitor subscriptions, keyed by file path.
#[derive(Debug)]
pub struct MonitorRegistry {
    socket: Arc<ServerSocket>,
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl MonitorRegistry {
    pub fn new(socket: Arc<ServerSocket>) -> Self {
        Self {
            socket,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `peer` for updates to `path` for the given duration.
    pub async fn register(&self, path: &str, peer: SocketAddr, duration: Duration) {
        let subscription = Subscription {
            peer,
            registered_at: Instant::now(),
            duration,
        };
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions
            .entry(path.to_string())
            .or_default()
            .push(subscription);
        debug!(path, %peer, duration_ms = duration.as_millis() as u64, "monitor registered");
    }

    /// Sends a CALLBACK datagram with the post-operation file content to every
    /// live subscriber of `path`, pruning expired entries along the way.
    ///
    /// The subscriber list is snapshotted under the lock and delivery happens
    /// outside it, so a concurrent `register` never sees torn iteration.
    pub async fn notify(&self, path: &str, content: &[u8], op: Op, modified_ms: i64) {
        let peers: Vec<SocketAddr> = {
            let mut subscriptions = self.subscriptions.lock().await;
            let Some(list) = subscriptions.get_mut(path) else {
                return;
            };
            let now = Instant::now();
            list.retain(|s| !s.expired(now));
            let peers = list.iter().map(|s| s.peer).collect();
            if list.is_empty() {
                subscriptions.remove(path);
            }
            peers
        };
        if peers.is_empty() {
            return;
        }

        let callback = Response::new(
            Status::Callback,
            content.to_vec(),
            format!("file update for {path}: {op}"),
            modified_ms,
        );
        let wire = codec::marshal_response(&callback);

        for peer in peers {
            match self.socket.send_to(&wire, peer).await {
                Ok(true) => debug!(path, %peer, "monitor callback delivered"),
                Ok(false) => {}
                Err(e) => warn!(path, %peer, error = %e, "failed to deliver monitor callback"),
            }
        }
    }

    /// Number of live subscriptions for `path`. Expired entries still count
    /// until the next delivery scan prunes them.
    pub async fn subscriber_count(&self, path: &str) -> usize {
        self.subscriptions
            .lock()
            .await
            .get(path)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}
