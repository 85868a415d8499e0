//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Largest accepted backoff multiplier
pub const MAX_BACKOFF_MULTIPLIER: f64 = 16.0;

/// Configuration for the agent running on each computer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Presence server address (`host:port`)
    pub server_address: String,

    /// Private half of the person's key pair
    pub private_key_path: PathBuf,

    /// Interval between heartbeats; keep it well under the server's grace
    /// timeout (a third of it tolerates two lost beats)
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Give up on a connection when the server has been silent this long
    #[serde(with = "duration_secs")]
    pub server_timeout: Duration,

    /// TCP connect timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Handshake timeout once connected
    #[serde(with = "duration_secs")]
    pub auth_timeout: Duration,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_address: format!("localhost:{}", super::DEFAULT_PRESENCE_PORT),
            private_key_path: super::default_config_dir().join("presence_key"),
            heartbeat_interval: Duration::from_secs(30),
            server_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat_interval must be greater than zero".to_string(),
            ));
        }
        if self.server_timeout <= self.heartbeat_interval {
            return Err(ConfigError::Invalid(format!(
                "server_timeout ({:?}) must exceed heartbeat_interval ({:?})",
                self.server_timeout, self.heartbeat_interval
            )));
        }
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff.multiplier)
            || !(0.0..=1.0).contains(&self.backoff.jitter)
        {
            return Err(ConfigError::Invalid(format!(
                "backoff multiplier must be within 1..={} and jitter within 0..=1",
                MAX_BACKOFF_MULTIPLIER
            )));
        }
        Ok(())
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
