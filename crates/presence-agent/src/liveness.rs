//! The agent's connection state machine
//!
//! `Disconnected -> Authenticating -> Connected`, back to `Disconnected` on
//! any failure, with exponential backoff before the next attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use presence_core::error::ConnectionError;
use presence_core::ClientState;

use crate::gate::PresenceGate;
use crate::link::{Connector, DisconnectReason, ExponentialBackoff, Link};

/// How one pass through the state machine ended
enum Outcome {
    /// Authenticated, then the link ended
    Held(DisconnectReason),
    /// Never reached `Connected`
    Failed(ConnectionError),
    /// Cancelled before the link was up
    Cancelled,
}

/// Keeps this computer's presence connection alive until cancelled
pub struct LivenessLoop {
    connector: Connector,
    gate: Arc<dyn PresenceGate>,
    state: watch::Sender<ClientState>,
}

impl LivenessLoop {
    pub fn new(connector: Connector, gate: Arc<dyn PresenceGate>) -> Self {
        let (state, _) = watch::channel(ClientState::Disconnected);
        Self {
            connector,
            gate,
            state,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Run until `cancel` fires. Ends in `Disconnected`.
    pub async fn run(&self, cancel: CancellationToken) {
        let config = self.connector.config();
        let mut backoff = ExponentialBackoff::from_config(&config.backoff);

        while !cancel.is_cancelled() {
            if !self.gate.is_present() {
                tracing::debug!("User away, not connecting");
                if !pause(config.heartbeat_interval, &cancel).await {
                    break;
                }
                continue;
            }

            match self.attempt(&cancel).await {
                Outcome::Cancelled | Outcome::Held(DisconnectReason::Cancelled) => break,
                Outcome::Held(DisconnectReason::Absent) => {
                    tracing::info!("User away, disconnected");
                    self.transition(ClientState::Disconnected);
                    backoff.reset();
                    continue;
                }
                Outcome::Held(reason) => {
                    tracing::warn!("Disconnected: {}", reason);
                    backoff.reset();
                }
                Outcome::Failed(e) => {
                    tracing::warn!("Connection attempt failed: {}", e);
                }
            }

            self.transition(ClientState::Disconnected);
            let delay = backoff.next_delay();
            tracing::info!("Reconnecting in {:?}", delay);
            if !pause(delay, &cancel).await {
                break;
            }
        }

        self.transition(ClientState::Disconnected);
    }

    async fn attempt(&self, cancel: &CancellationToken) -> Outcome {
        let config = self.connector.config();

        let mut transport = tokio::select! {
            _ = cancel.cancelled() => return Outcome::Cancelled,
            result = self.connector.open_transport() => match result {
                Ok(transport) => transport,
                Err(e) => return Outcome::Failed(e),
            },
        };

        self.transition(ClientState::Authenticating);
        tokio::select! {
            _ = cancel.cancelled() => return Outcome::Cancelled,
            result = self.connector.authenticate(&mut transport) => {
                if let Err(e) = result {
                    return Outcome::Failed(e);
                }
            }
        }

        self.transition(ClientState::Connected);
        tracing::info!("Connected to presence server at {}", config.server_address);

        let link = Link::new(transport);
        let reason = link
            .hold(
                config.heartbeat_interval,
                config.server_timeout,
                self.gate.as_ref(),
                cancel,
            )
            .await;
        Outcome::Held(reason)
    }

    fn transition(&self, next: ClientState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!("Agent state: {} -> {}", current, next);
            *current = next;
            true
        });
    }
}

/// Sleep unless cancelled first; false means cancelled
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
