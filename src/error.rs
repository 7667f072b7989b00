//! Error types for the remote file access service.
//!
//! This module defines the error types used throughout the client and server.
//! Errors are designed to provide context about what went wrong and where.
//! Note that most protocol-level failures are not errors in this sense: loss,
//! timeout, and semantic failures travel as `Response` status codes, and only
//! local faults (I/O, malformed datagrams, configuration) surface here.

use crate::config::MAX_DATAGRAM_SIZE;
use std::io;
use thiserror::Error;

/// Errors that can occur in the client or server outside the request/response
/// status channel.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An I/O error occurred during file or socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A datagram could not be decoded into a request or response.
    #[error("malformed datagram: {0}")]
    Malformed(String),

    /// A marshalled message would not fit in a single datagram.
    #[error("datagram of {0} bytes exceeds the {MAX_DATAGRAM_SIZE}-byte limit")]
    OversizedDatagram(usize),

    /// Failed to serialize the configuration to TOML.
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Failed to deserialize the configuration from TOML.
    #[error("TOML deserialization error: {0}")]
    TomlDeserialization(#[from] toml::de::Error),

    /// A server or client address could not be parsed.
    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// A configuration value is invalid (bad probability, unknown mode, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}
