//! `presence join`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use presence_core::config::{AgentConfig, DEFAULT_PRESENCE_PORT};

use super::{ensure_port, with_port};

#[derive(Debug, Clone, Default, Args)]
pub struct JoinArgs {
    /// Presence server (`host` or `host:port`; overrides config)
    pub server: Option<String>,

    /// Server port, when not part of the address
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Private key proving this computer belongs to the person
    #[arg(short = 'k', long)]
    pub privkey: Option<PathBuf>,
}

impl JoinArgs {
    /// Apply these flags on top of `config`
    pub fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(server) = &self.server {
            config.server_address = ensure_port(server, DEFAULT_PRESENCE_PORT);
        }
        if let Some(port) = self.port {
            config.server_address = with_port(&config.server_address, port);
        }
        if let Some(path) = &self.privkey {
            config.private_key_path = path.clone();
        }
        config
    }
}

/// Hold this computer's presence connection until `cancel` fires
pub async fn join_command(config: AgentConfig, cancel: CancellationToken) -> Result<()> {
    presence_agent::run(config, cancel).await
}
