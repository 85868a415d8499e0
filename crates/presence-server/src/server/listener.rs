//! Presence listener
//!
//! Accepts incoming agent connections and spawns one handler task per
//! connection.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::handler::ConnectionHandler;
use crate::state::ServerState;

/// Accept loop for agent connections
pub struct PresenceListener {
    /// Shared server state
    state: Arc<ServerState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl PresenceListener {
    pub fn new(state: Arc<ServerState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Accept connections until cancelled
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Presence listener accepting agents on {}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Presence listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            self.handle_connection(socket, peer_addr);
                        }
                        Err(e) => {
                            // Typically EMFILE; keep serving existing connections
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::debug!("New connection from {}", peer_addr);

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let handler = ConnectionHandler::new(Arc::clone(&self.state), peer_addr);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Connection handler cancelled for {}", peer_addr);
                }
                _ = handler.run(socket, cancel.child_token()) => {}
            }
        });
    }
}
