//! presence-server: answers "is this person online?"
//!
//! Agents on each of the person's computers hold an authenticated TCP
//! connection open. The server keeps one registry entry per live
//! connection and reports `ONLINE` over HTTP whenever the registry is
//! non-empty.

pub mod auth;
pub mod connection;
pub mod presence;
pub mod server;
pub mod state;
pub mod status;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use presence_core::config::ServerConfig;

pub use auth::{Challenge, IdentityVerifier, Verdict};
pub use connection::{ConnectionInfo, ConnectionRegistry};
pub use presence::PresenceAggregator;
pub use server::PresenceServer;
pub use state::ServerState;

/// Load the trust anchor, bind both listeners and serve until `cancel` fires
pub async fn run(config: ServerConfig, cancel: CancellationToken) -> Result<()> {
    let verifier = IdentityVerifier::from_file(&config.public_key_path).with_context(|| {
        format!(
            "Failed to load public key from {:?}",
            config.public_key_path
        )
    })?;
    tracing::info!("Trusting key {}", verifier.fingerprint());

    let server = PresenceServer::bind(config, verifier).await?;
    server.run(cancel).await
}
