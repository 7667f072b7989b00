//! Configuration management for the file access service.
//!
//! This module handles loading, saving, and managing configuration for both
//! the server and client components. Configuration is stored in TOML format
//! and covers network endpoints, invocation semantics, retry behavior, cache
//! freshness, and the simulated-loss probabilities used for testing the
//! reliability layer.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// A request or response must fit in a single datagram of this size.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

// Network constants
pub const DEFAULT_SERVER_PORT: u16 = 9433;
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// Cache constants
pub const DEFAULT_FRESHNESS_MS: u64 = 5_000;

// Loss-simulation defaults: a perfect network unless configured otherwise.
pub const DEFAULT_SEND_PROBABILITY: f64 = 1.0;
pub const DEFAULT_RECV_PROBABILITY: f64 = 1.0;

/// Main configuration structure containing both endpoint configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server-specific configuration.
    pub server: ServerConfig,
    /// Client-specific configuration.
    pub client: ClientConfig,
}

/// Configuration for the file server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the UDP socket to.
    pub address: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory under which request paths are resolved. With the default
    /// of `/`, absolute request paths address the host filesystem directly.
    pub root_directory: String,
    /// Invocation semantics: `at_least_once` or `at_most_once`.
    pub mode: String,
    /// Probability that an inbound datagram is processed rather than dropped.
    pub recv_probability: f64,
    /// Probability that an outbound datagram is actually sent.
    pub send_probability: f64,
}

/// Configuration for the file client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_address: String,
    pub server_port: u16,
    /// How long to wait for a reply before treating a round as lost.
    pub timeout_ms: u64,
    /// Number of send/receive rounds before giving up on an invocation.
    pub max_retries: u32,
    /// How long a cached read stays valid without revalidation.
    pub freshness_ms: u64,
    /// Probability that a request datagram is actually sent.
    pub send_probability: f64,
    /// Probability that a reply datagram is actually received.
    pub recv_probability: f64,
}

impl Config {
    /// Loads configuration from a file, or creates a new default configuration
    /// if the file doesn't exist.
    pub fn load_or_create(path: &PathBuf) -> Result<Self, ServiceError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to a file in TOML format.
    pub fn save(&self, path: &PathBuf) -> Result<(), ServiceError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks that probabilities are in range and the mode is recognized.
    pub fn validate(&self) -> Result<(), ServiceError> {
        for (name, p) in [
            ("server.recv_probability", self.server.recv_probability),
            ("server.send_probability", self.server.send_probability),
            ("client.send_probability", self.client.send_probability),
            ("client.recv_probability", self.client.recv_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ServiceError::Config(format!(
                    "{name} must be within [0.0, 1.0], got {p}"
                )));
            }
        }
        if self.client.max_retries == 0 {
            return Err(ServiceError::Config(
                "client.max_retries must be at least 1".to_string(),
            ));
        }
        self.server
            .mode
            .parse::<crate::server::InvocationMode>()
            .map_err(ServiceError::Config)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_SERVER_PORT,
            root_directory: "/".to_string(),
            mode: "at_most_once".to_string(),
            recv_probability: DEFAULT_RECV_PROBABILITY,
            send_probability: DEFAULT_SEND_PROBABILITY,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            freshness_ms: DEFAULT_FRESHNESS_MS,
            send_probability: DEFAULT_SEND_PROBABILITY,
            recv_probability: DEFAULT_RECV_PROBABILITY,
        }
    }
}
