//! Murmur Server: WebSocket transport, configuration and telemetry around
//! the `murmur-core` router.

pub mod config;
pub mod server;
pub mod telemetry;

pub use config::{ConfigError, LogFormat, ServerConfig};
