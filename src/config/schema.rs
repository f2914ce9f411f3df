//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MuxConfig {
    /// Certificate, key and trust-root locations.
    pub tls: TlsConfig,

    /// Deadlines for the bounded-wait operations.
    pub timeouts: TimeoutConfig,

    /// Demo HTTPS responder settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// TLS file locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the server certificate chain (PEM).
    pub cert_path: Option<String>,

    /// Path to the server private key (PEM).
    pub key_path: Option<String>,

    /// Path to the CA certificates clients trust (PEM).
    pub ca_path: Option<String>,

    /// Name clients send as SNI and verify the certificate against.
    pub server_name: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            ca_path: None,
            server_name: "localhost".to_string(),
        }
    }
}

/// Timeouts in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for a complete handshake.
    pub handshake_ms: u64,

    /// Budget for one receive.
    pub recv_ms: u64,

    /// Budget for one send.
    pub send_ms: u64,

    /// Server closes a connection that makes no progress for this long.
    pub idle_ms: u64,
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake_ms)
    }

    pub fn recv(&self) -> Duration {
        Duration::from_millis(self.recv_ms)
    }

    pub fn send(&self) -> Duration {
        Duration::from_millis(self.send_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_ms: 3000,
            recv_ms: 3000,
            send_ms: 3000,
            idle_ms: 10_000,
        }
    }
}

/// Demo HTTPS responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Requests larger than this are dropped.
    pub max_request_bytes: usize,

    /// Longest single wait, so shutdown is noticed promptly.
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            max_connections: 1024,
            max_request_bytes: 8192,
            poll_interval_ms: 250,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
