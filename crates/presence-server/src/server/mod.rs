//! Presence listener and server composition

mod handler;
mod listener;

pub use handler::ConnectionHandler;
pub use listener::PresenceListener;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use presence_core::config::ServerConfig;

use crate::auth::IdentityVerifier;
use crate::connection::run_liveness_sweep;
use crate::state::ServerState;
use crate::status;

/// A server with both sockets bound but nothing running yet
pub struct PresenceServer {
    state: Arc<ServerState>,
    presence_listener: TcpListener,
    status_listener: TcpListener,
    presence_addr: SocketAddr,
    status_addr: SocketAddr,
}

impl PresenceServer {
    /// Validate the configuration and bind the agent and status ports
    pub async fn bind(config: ServerConfig, verifier: IdentityVerifier) -> Result<Self> {
        config.validate().context("Invalid server configuration")?;

        let presence_listener = TcpListener::bind(&config.bind_address)
            .await
            .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
        let status_listener = TcpListener::bind(&config.status_address)
            .await
            .with_context(|| format!("Failed to bind to {}", config.status_address))?;

        let presence_addr = presence_listener.local_addr()?;
        let status_addr = status_listener.local_addr()?;

        Ok(Self {
            state: Arc::new(ServerState::new(config, verifier)),
            presence_listener,
            status_listener,
            presence_addr,
            status_addr,
        })
    }

    /// Address agents should connect to
    pub fn presence_addr(&self) -> SocketAddr {
        self.presence_addr
    }

    /// Address of the HTTP status endpoint
    pub fn status_addr(&self) -> SocketAddr {
        self.status_addr
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Run the listener, the sweep and the status endpoint until `cancel`
    /// fires or the listener fails
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let cancel = cancel.child_token();
        let state = self.state;

        let sweep = tokio::spawn(run_liveness_sweep(
            Arc::clone(&state.registry),
            state.config.grace_timeout,
            state.config.effective_sweep_interval(),
            cancel.clone(),
        ));

        let status = tokio::spawn(status::serve(
            self.status_listener,
            state.aggregator(),
            cancel.clone(),
        ));

        let listener = PresenceListener::new(Arc::clone(&state), cancel.clone());
        let result = listener.run(self.presence_listener).await;

        // Whatever ended the listener, bring the rest down with it
        cancel.cancel();

        if let Err(e) = sweep.await {
            tracing::error!("Liveness sweep task failed: {}", e);
        }
        match status.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Status endpoint failed: {}", e),
            Err(e) => tracing::error!("Status endpoint task failed: {}", e),
        }

        tracing::info!("Presence server stopped");
        result
    }
}
