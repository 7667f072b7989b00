//! Reach - remote byte-range file access over UDP.
//!
//! Reach exposes a flat filesystem namespace over an unreliable datagram
//! transport. Clients issue byte-range reads, insert-writes, delete-writes,
//! file-info queries, and monitor registrations; the protocol itself supplies
//! reliability, duplicate filtering, and at-most-once execution for the
//! non-idempotent write operations.
//!
//! # Features
//!
//! - **Invocation semantics**: client-side retry with a stable request
//!   identifier; server-side at-least-once or at-most-once dispatch backed by
//!   a reply cache.
//! - **Monitoring**: server-initiated callback datagrams to subscribed
//!   clients on every mutating operation, with duration-based expiry.
//! - **Freshness caching**: a client-side range-addressable cache reconciled
//!   against the server's last-modified timestamp.
//! - **Fault injection**: per-direction send/receive probabilities simulate a
//!   lossy network on both endpoints.
//!
//! # Example
//!
//! ```no_run
//! use reach::{client::FileClient, config::ClientConfig};
//!
//! # async fn run() -> Result<(), reach::ServiceError> {
//! let client = FileClient::connect(&ClientConfig::default()).await?;
//! let response = client.read("/data/report.txt", 0, 100).await?;
//! println!("{}", response.message);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod faults;
pub mod protocol;
pub mod server;

pub use client::FileClient;
pub use config::Config;
pub use error::ServiceError;
pub use protocol::{Op, Request, Response, Status};
pub use server::UdpServer;

// Re-export commonly used crates for convenience
pub use bytes;
pub use tokio;
