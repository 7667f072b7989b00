//! Client side of the file access service.
//!
//! `FileClient` ties the transport, the retry policy, and the read cache
//! together. Reads are cache-first with mtime reconciliation on each miss;
//! writes go straight to the server and leave reconciliation to the next
//! read. `monitor` registers an interest and then listens for callback
//! datagrams until its client-enforced duration elapses.

pub mod cache;
pub mod retry;
pub mod transport;

pub use cache::ReadCache;
pub use retry::RetryPolicy;
pub use transport::ClientTransport;

use crate::codec;
use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::faults::LossGate;
use crate::protocol::{Request, Response, Status, NO_MODIFIED_TIME};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct FileClient {
    transport: ClientTransport,
    retry: RetryPolicy,
    cache: ReadCache,
}

impl FileClient {
    /// Connects to the configured server.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ServiceError> {
        let server: SocketAddr =
            format!("{}:{}", config.server_address, config.server_port).parse()?;
        let gate = LossGate::new(config.send_probability, config.recv_probability);
        let transport =
            ClientTransport::connect(server, Duration::from_millis(config.timeout_ms), gate)
                .await?;
        // Monitor callbacks land on this ephemeral port, so it is worth a log line.
        debug!(local = %transport.local_addr()?, %server, "client socket bound");
        Ok(Self {
            transport,
            retry: RetryPolicy::new(config.max_retries),
            cache: ReadCache::new(Duration::from_millis(config.freshness_ms)),
        })
    }

    /// Reads `length` bytes at `offset`, serving from the local cache when
    /// the range is covered and fresh.
    pub async fn read(
        &self,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<Response, ServiceError> {
        if let Some(bytes) = self.cache.lookup(path, offset, length).await {
            debug!(path, offset, length, "cache hit");
            let modified = self
                .cache
                .modified_ms(path, offset, length)
                .await
                .unwrap_or(NO_MODIFIED_TIME);
            return Ok(Response::new(
                Status::ReadSuccess,
                bytes,
                "served from cache",
                modified,
            ));
        }

        let request = Request::read(path, offset, length);
        let response = self.retry.invoke(&self.transport, &request).await?;

        if matches!(response.status, Status::ReadSuccess | Status::ReadIncomplete) {
            match self.cache.modified_ms(path, offset, length).await {
                None => {
                    debug!(path, "caching newly fetched range");
                    self.cache
                        .store(path, response.payload.clone(), offset, response.modified_ms)
                        .await;
                }
                Some(cached) if cached == response.modified_ms => {
                    debug!(path, "file unchanged on server, revalidating entry");
                    self.cache.revalidate(path, response.modified_ms).await;
                }
                Some(_) => {
                    debug!(path, "file changed on server, replacing entry");
                    self.cache.invalidate(path).await;
                    self.cache
                        .store(path, response.payload.clone(), offset, response.modified_ms)
                        .await;
                }
            }
        }

        Ok(response)
    }

    /// Inserts `payload` at `offset`, shifting existing bytes right.
    pub async fn insert(
        &self,
        path: &str,
        offset: u64,
        payload: Vec<u8>,
    ) -> Result<Response, ServiceError> {
        let request = Request::write_insert(path, offset, payload);
        self.retry.invoke(&self.transport, &request).await
    }

    /// Deletes `length` bytes at `offset`, shifting the suffix left.
    pub async fn delete(
        &self,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<Response, ServiceError> {
        let request = Request::write_delete(path, offset, length);
        self.retry.invoke(&self.transport, &request).await
    }

    /// Fetches the server's file-info record.
    pub async fn file_info(&self, path: &str) -> Result<Response, ServiceError> {
        self.retry
            .invoke(&self.transport, &Request::file_info(path))
            .await
    }

    /// Asks the server to stop its receive loop.
    pub async fn shutdown(&self) -> Result<Response, ServiceError> {
        self.retry
            .invoke(&self.transport, &Request::shutdown())
            .await
    }

    /// Drops any cached range for `path`.
    pub async fn invalidate(&self, path: &str) {
        self.cache.invalidate(path).await;
    }

    /// Registers for updates to `path`, then listens for callbacks until
    /// `duration_ms` elapses, handing each one to `on_update`. Returns the
    /// registration response; a failed registration skips the listen loop.
    pub async fn monitor<F>(
        &self,
        path: &str,
        duration_ms: u64,
        mut on_update: F,
    ) -> Result<Response, ServiceError>
    where
        F: FnMut(Response),
    {
        let request = Request::monitor(path, duration_ms);
        let ack = self.retry.invoke(&self.transport, &request).await?;
        if ack.status != Status::MonitorSuccess {
            return Ok(ack);
        }

        info!(path, duration_ms, "monitoring started");
        let deadline = Instant::now() + Duration::from_millis(duration_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.transport.recv_callback(remaining).await? {
                Some(datagram) => match codec::unmarshal_response(&datagram) {
                    Ok(callback) if callback.status == Status::Callback => on_update(callback),
                    Ok(other) => {
                        debug!(status = ?other.status, "ignoring non-callback datagram")
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed callback datagram"),
                },
                None => {}
            }
        }
        info!(path, "monitoring ended");
        Ok(ack)
    }
}
