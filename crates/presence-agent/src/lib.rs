//! presence-agent: the per-computer half of presence
//!
//! The agent opens an outbound connection to the presence server, proves it
//! holds the person's private key, and then sends heartbeats for as long as
//! the user is at the computer. Any failure drops it back to
//! `Disconnected`, from where it retries with exponential backoff.

pub mod gate;
pub mod link;
pub mod liveness;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use presence_core::config::AgentConfig;

pub use gate::{AlwaysPresent, PresenceGate, ScreenLockGate};
pub use link::{Connector, DisconnectReason, ExponentialBackoff, Link};
pub use liveness::LivenessLoop;

/// Load the private key and hold a presence connection until `cancel` fires
pub async fn run(config: AgentConfig, cancel: CancellationToken) -> Result<()> {
    config.validate().context("Invalid agent configuration")?;

    let server_address = config.server_address.clone();
    let connector = Connector::new(config).context("Failed to load private key")?;

    tracing::info!("Joining presence server at {}", server_address);
    let agent = LivenessLoop::new(connector, Arc::new(ScreenLockGate::new()));
    agent.run(cancel).await;

    tracing::info!("Agent stopped");
    Ok(())
}
