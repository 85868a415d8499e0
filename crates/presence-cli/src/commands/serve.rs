//! `presence serve`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use presence_core::config::{ServerConfig, DEFAULT_PRESENCE_PORT, DEFAULT_STATUS_PORT};

use super::{with_host, with_port};

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Interface both listeners bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port agents connect to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port of the HTTP status endpoint
    #[arg(short = 's', long)]
    pub status_port: Option<u16>,

    /// Public key agents must prove they hold
    #[arg(short = 'k', long)]
    pub pubkey: Option<PathBuf>,
}

impl ServeArgs {
    /// Apply these flags on top of `config`
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = &self.bind {
            config.bind_address = with_host(&config.bind_address, host, DEFAULT_PRESENCE_PORT);
            config.status_address = with_host(&config.status_address, host, DEFAULT_STATUS_PORT);
        }
        if let Some(port) = self.port {
            config.bind_address = with_port(&config.bind_address, port);
        }
        if let Some(port) = self.status_port {
            config.status_address = with_port(&config.status_address, port);
        }
        if let Some(path) = &self.pubkey {
            config.public_key_path = path.clone();
        }
        config
    }
}

/// Run the presence server until `cancel` fires
pub async fn serve_command(config: ServerConfig, cancel: CancellationToken) -> Result<()> {
    tracing::info!(
        "Starting presence server (agents on {}, status on {})",
        config.bind_address,
        config.status_address
    );
    presence_server::run(config, cancel).await
}
