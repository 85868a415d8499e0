//! Per-connection handler
//!
//! Drives one agent connection through the handshake and, if admitted,
//! relays its heartbeats into the registry until the connection ends.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use presence_core::error::ConnectionError;
use presence_protocol::{FrameCodec, Message, PROTOCOL_VERSION};

use crate::connection::RegistrationGuard;
use crate::state::ServerState;

type Transport = Framed<TcpStream, FrameCodec>;

/// Why an admitted connection ended
#[derive(Debug)]
enum CloseReason {
    Goodbye,
    PeerClosed,
    Evicted,
    Transport(String),
    ProtocolViolation(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Goodbye => write!(f, "agent said goodbye"),
            CloseReason::PeerClosed => write!(f, "connection closed by agent"),
            CloseReason::Evicted => write!(f, "evicted after grace timeout"),
            CloseReason::Transport(e) => write!(f, "transport error: {}", e),
            CloseReason::ProtocolViolation(e) => write!(f, "protocol violation: {}", e),
        }
    }
}

/// Handler for a single agent connection
pub struct ConnectionHandler {
    /// Shared server state
    state: Arc<ServerState>,
    /// Peer address of the connecting agent
    peer_addr: SocketAddr,
}

impl ConnectionHandler {
    pub fn new(state: Arc<ServerState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Run the connection to completion.
    ///
    /// `cancel` ends the connection from outside; the registry fires it on
    /// eviction.
    pub async fn run(self, stream: TcpStream, cancel: CancellationToken) {
        let mut transport = Framed::new(stream, FrameCodec::new());

        let auth_timeout = self.state.config.auth_timeout;
        let outcome = match tokio::time::timeout(auth_timeout, self.authenticate(&mut transport))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ConnectionError::AuthenticationTimeout(auth_timeout)),
        };

        if let Err(e) = outcome {
            tracing::warn!("Rejected {}: {}", self.peer_addr, e);
            return;
        }

        let guard = RegistrationGuard::register(
            Arc::clone(&self.state.registry),
            self.peer_addr,
            cancel.clone(),
        );

        if let Err(e) = transport.send(Message::AuthResult { accepted: true }).await {
            tracing::warn!(
                "Failed to confirm authentication to {}: {}",
                self.peer_addr,
                e
            );
            return;
        }
        tracing::info!("Agent {} authenticated as {}", self.peer_addr, guard.id());

        let reason = self.relay_heartbeats(&mut transport, &guard, &cancel).await;
        tracing::info!("{} ({}) disconnected: {}", guard.id(), self.peer_addr, reason);
        // Dropping the guard removes the registry entry
    }

    /// Challenge the agent and check its answer.
    ///
    /// On a bad signature the agent is told `accepted: false` and nothing
    /// else; the caller then drops the connection.
    async fn authenticate(&self, transport: &mut Transport) -> Result<(), ConnectionError> {
        let challenge = self.state.verifier.challenge();
        tracing::debug!("Challenging {} with {}", self.peer_addr, challenge.nonce());

        transport
            .send(Message::Challenge {
                nonce: *challenge.nonce(),
                version: PROTOCOL_VERSION.to_string(),
            })
            .await?;

        let signature = match transport.next().await {
            Some(Ok(Message::Response { signature })) => signature,
            Some(Ok(other)) => {
                return Err(ConnectionError::HandshakeFailed(format!(
                    "expected Response, got {:?}",
                    other.message_type()
                )))
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(ConnectionError::ConnectionLost(
                    "closed during handshake".to_string(),
                ))
            }
        };

        if self.state.verifier.verify(challenge, &signature).is_accepted() {
            Ok(())
        } else {
            let _ = transport.send(Message::AuthResult { accepted: false }).await;
            Err(ConnectionError::AuthenticationFailed)
        }
    }

    async fn relay_heartbeats(
        &self,
        transport: &mut Transport,
        guard: &RegistrationGuard,
        cancel: &CancellationToken,
    ) -> CloseReason {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return CloseReason::Evicted,

                frame = transport.next() => match frame {
                    Some(Ok(Message::Heartbeat { timestamp })) => {
                        if !guard.touch() {
                            return CloseReason::Evicted;
                        }
                        tracing::trace!("Heartbeat from {} ({})", guard.id(), self.peer_addr);
                        // A peer that never reads must not pin the task past eviction
                        tokio::select! {
                            _ = cancel.cancelled() => return CloseReason::Evicted,
                            sent = transport.send(Message::HeartbeatAck { timestamp }) => {
                                if let Err(e) = sent {
                                    return CloseReason::Transport(e.to_string());
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Goodbye)) => return CloseReason::Goodbye,
                    Some(Ok(other)) => {
                        return CloseReason::ProtocolViolation(format!(
                            "unexpected {:?} after authentication",
                            other.message_type()
                        ))
                    }
                    Some(Err(e)) => return CloseReason::Transport(e.to_string()),
                    None => return CloseReason::PeerClosed,
                },
            }
        }
    }
}
