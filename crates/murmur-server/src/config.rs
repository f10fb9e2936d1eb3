//! Server configuration loaded from `MURMUR_*` environment variables.
//!
//! # Environment Variables
//!
//! - `MURMUR_BIND_ADDR`: HTTP listen address. Default: `0.0.0.0:3000`
//! - `MURMUR_HISTORY_LIMIT`: Keep only the newest N messages. Default: unbounded
//! - `MURMUR_OUTBOUND_BUFFER`: Per-connection outbound queue depth. Default: `256`
//! - `MURMUR_MAX_MESSAGE_LEN`: Maximum characters per message. Default: `4000`
//! - `MURMUR_LOG_FORMAT`: `json` or `pretty`. Default: `pretty`
//!
//! # Examples
//!
//! ```bash
//! MURMUR_BIND_ADDR=127.0.0.1:8080 MURMUR_HISTORY_LIMIT=1000 cargo run
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use murmur_core::MAX_CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Default HTTP listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default per-connection outbound queue depth.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },

    #[error("{var} must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// History cap; `None` keeps every message
    pub history_limit: Option<usize>,
    /// Depth of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Maximum message length in characters
    pub max_message_len: usize,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            history_limit: None,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_message_len: MAX_CONTENT_LENGTH,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Load server configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("MURMUR_BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidAddr {
                var: "MURMUR_BIND_ADDR",
                value,
            })?,
            None => defaults.bind_addr,
        };

        let history_limit = match parse_number(&lookup, "MURMUR_HISTORY_LIMIT")? {
            Some(0) | None => None,
            Some(limit) => Some(limit),
        };

        let outbound_buffer = parse_positive(&lookup, "MURMUR_OUTBOUND_BUFFER")?
            .unwrap_or(defaults.outbound_buffer);

        let max_message_len = parse_positive(&lookup, "MURMUR_MAX_MESSAGE_LEN")?
            .unwrap_or(defaults.max_message_len);

        let log_format = match lookup("MURMUR_LOG_FORMAT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidLogFormat {
                    var: "MURMUR_LOG_FORMAT",
                    value,
                })?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind_addr,
            history_limit,
            outbound_buffer,
            max_message_len,
            log_format,
        })
    }

    /// Log the current server configuration.
    pub fn log_config(&self) {
        info!("Bind address: {}", self.bind_addr);
        match self.history_limit {
            Some(limit) => info!("History: newest {} messages", limit),
            None => info!("History: unbounded"),
        }
        info!("Outbound queue depth: {}", self.outbound_buffer);
        info!("Max message length: {}", self.max_message_len);
    }

    /// Create a test configuration on an ephemeral local port.
    pub fn test_local() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Self::default()
        }
    }
}

fn parse_number<F>(lookup: &F, var: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(None),
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number(lookup, var)? {
        Some(0) => Err(ConfigError::Zero { var }),
        other => Ok(other),
    }
}
