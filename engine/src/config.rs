//! Configuration management for the allocation engine binaries.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Mock payment-gateway behavior
    pub gateway: GatewayConfig,
    /// Notification delivery configuration
    pub notifications: NotificationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log filter (trace, debug, info, warn, error or an `EnvFilter` spec)
    pub filter: String,
}

/// Mock payment-gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Simulated gateway latency in milliseconds
    pub simulated_latency_ms: u64,
    /// Decline every order (exercises the all-or-nothing admission path)
    pub decline_all: bool,
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Disable delivery entirely (state transitions are unaffected)
    pub enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log: LogConfig {
                filter: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "info,seatline_engine=debug".to_string()),
            },
            gateway: GatewayConfig {
                simulated_latency_ms: env::var("SEATLINE_GATEWAY_LATENCY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25),
                decline_all: env::var("SEATLINE_GATEWAY_DECLINE_ALL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
            },
            notifications: NotificationConfig {
                enabled: env::var("SEATLINE_NOTIFICATIONS_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::from_env();
        assert!(!config.log.filter.is_empty());
        assert!(config.gateway.simulated_latency_ms < 10_000);
    }
}
