//! Configuration for a room session

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one [`RoomSession`](crate::session::RoomSession)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSessionConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Per-link connect timeout in seconds (default: 15)
    ///
    /// A link that has not reached `Connected` within this window from its
    /// creation is torn down and retried once.
    pub connect_timeout_secs: u64,

    /// Audio health check interval in seconds (default: 5)
    pub health_check_interval_secs: u64,

    /// Reconnect delay after transport degradation in milliseconds (default: 3000)
    pub degraded_reconnect_delay_ms: u64,

    /// Retry delay after a connect timeout or failure in milliseconds (default: 2000)
    pub retry_delay_ms: u64,

    /// Window for verifying a live inbound track after connecting, in
    /// milliseconds (default: 1000)
    pub track_verify_window_ms: u64,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for RoomSessionConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            connect_timeout_secs: 15,
            health_check_interval_secs: 5,
            degraded_reconnect_delay_ms: 3000,
            retry_delay_ms: 2000,
            track_verify_window_ms: 1000,
        }
    }
}

impl RoomSessionConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - `connect_timeout_secs` is not in range 5-60
    /// - `health_check_interval_secs` is not in range 1-60
    /// - a reconnect delay is not in range 500-10000 ms
    /// - `track_verify_window_ms` is not in range 100-5000
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.connect_timeout_secs < 5 || self.connect_timeout_secs > 60 {
            return Err(Error::InvalidConfig(format!(
                "connect_timeout_secs must be in range 5-60, got {}",
                self.connect_timeout_secs
            )));
        }

        if self.health_check_interval_secs == 0 || self.health_check_interval_secs > 60 {
            return Err(Error::InvalidConfig(format!(
                "health_check_interval_secs must be in range 1-60, got {}",
                self.health_check_interval_secs
            )));
        }

        for (name, ms) in [
            ("degraded_reconnect_delay_ms", self.degraded_reconnect_delay_ms),
            ("retry_delay_ms", self.retry_delay_ms),
        ] {
            if !(500..=10_000).contains(&ms) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in range 500-10000, got {}",
                    name, ms
                )));
            }
        }

        if !(100..=5_000).contains(&self.track_verify_window_ms) {
            return Err(Error::InvalidConfig(format!(
                "track_verify_window_ms must be in range 100-5000, got {}",
                self.track_verify_window_ms
            )));
        }

        Ok(())
    }

    /// Add TURN servers to this configuration
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }

    /// Override the per-link connect timeout
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Override the audio health check interval
    pub fn with_health_check_interval_secs(mut self, secs: u64) -> Self {
        self.health_check_interval_secs = secs;
        self
    }

    /// Per-link connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Health check interval as a [`Duration`]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Degradation reconnect delay as a [`Duration`]
    pub fn degraded_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.degraded_reconnect_delay_ms)
    }

    /// Post-timeout retry delay as a [`Duration`]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Inbound-track verification window as a [`Duration`]
    pub fn track_verify_window(&self) -> Duration {
        Duration::from_millis(self.track_verify_window_ms)
    }
}
