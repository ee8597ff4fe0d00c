//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the server to (e.g. `0.0.0.0:4000`).
    pub listen_addr: SocketAddr,

    /// Seconds a client has to send `connection_init` after connecting.
    pub connection_init_timeout_secs: u64,

    /// Capacity of each connection's outbound frame queue.
    pub outbound_buffer: usize,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4000".to_string())
            .parse()?;

        let connection_init_timeout_secs = parse_env("CONNECTION_INIT_TIMEOUT_SECS", 3);
        let outbound_buffer = parse_env("OUTBOUND_BUFFER", 64);

        Ok(Self {
            listen_addr,
            connection_init_timeout_secs,
            outbound_buffer,
        })
    }

    /// Returns the handshake window as a [`Duration`].
    #[must_use]
    pub const fn connection_init_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_init_timeout_secs)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
