//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};
use crate::error::ConfigError;

/// Configuration for the presence server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address agents connect to
    pub bind_address: String,

    /// Address the HTTP status endpoint listens on
    pub status_address: String,

    /// Public half of the person's key pair
    pub public_key_path: PathBuf,

    /// Maximum silence on an authenticated connection before eviction
    #[serde(with = "duration_secs")]
    pub grace_timeout: Duration,

    /// How often the sweep looks for silent connections (default: grace / 2)
    #[serde(
        default,
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub sweep_interval: Option<Duration>,

    /// How long a connecting agent has to answer the challenge
    #[serde(with = "duration_secs")]
    pub auth_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", super::DEFAULT_PRESENCE_PORT),
            status_address: format!("0.0.0.0:{}", super::DEFAULT_STATUS_PORT),
            public_key_path: super::default_config_dir().join("presence_key.pub"),
            grace_timeout: Duration::from_secs(90),
            sweep_interval: None,
            auth_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Sweep interval actually used
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.grace_timeout / 2)
    }

    /// Reject settings the liveness bookkeeping cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "grace_timeout must be greater than zero".to_string(),
            ));
        }
        if self.auth_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "auth_timeout must be greater than zero".to_string(),
            ));
        }
        let sweep = self.effective_sweep_interval();
        if sweep.is_zero() || sweep > self.grace_timeout {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval ({:?}) must be non-zero and at most grace_timeout ({:?})",
                sweep, self.grace_timeout
            )));
        }
        Ok(())
    }
}
