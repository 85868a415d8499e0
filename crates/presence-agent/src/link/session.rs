//! An authenticated connection being held open with heartbeats

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use presence_core::time::current_time_millis;
use presence_protocol::Message;

use super::connector::Transport;
use crate::gate::PresenceGate;

/// Why a held link ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Shutdown requested; `Goodbye` was sent
    Cancelled,
    /// The gate reported the user away; `Goodbye` was sent
    Absent,
    /// Server closed the connection
    ServerClosed,
    /// No acknowledgement from the server for longer than the timeout
    ServerSilent(Duration),
    /// Read or write failed
    Transport(String),
    /// Server sent a message that has no place after the handshake
    Protocol(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Cancelled => write!(f, "shutting down"),
            DisconnectReason::Absent => write!(f, "user away"),
            DisconnectReason::ServerClosed => write!(f, "server closed the connection"),
            DisconnectReason::ServerSilent(d) => write!(f, "server silent for {:?}", d),
            DisconnectReason::Transport(e) => write!(f, "transport error: {}", e),
            DisconnectReason::Protocol(e) => write!(f, "protocol violation: {}", e),
        }
    }
}

/// An authenticated connection to the presence server
pub struct Link {
    transport: Transport,
}

impl Link {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Send heartbeats until something ends the connection.
    ///
    /// The first heartbeat goes out immediately. Before each one the gate
    /// is consulted; an absent user ends the link with `Goodbye`, as does
    /// cancellation.
    pub async fn hold(
        mut self,
        heartbeat_interval: Duration,
        server_timeout: Duration,
        gate: &dyn PresenceGate,
        cancel: &CancellationToken,
    ) -> DisconnectReason {
        let mut ticker = interval(heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_heard = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.say_goodbye().await;
                    return DisconnectReason::Cancelled;
                }

                _ = ticker.tick() => {
                    if !gate.is_present() {
                        self.say_goodbye().await;
                        return DisconnectReason::Absent;
                    }

                    let silent = last_heard.elapsed();
                    if silent > server_timeout {
                        return DisconnectReason::ServerSilent(silent);
                    }

                    let timestamp = current_time_millis();
                    if let Err(e) = self.transport.send(Message::Heartbeat { timestamp }).await {
                        return DisconnectReason::Transport(e.to_string());
                    }
                    tracing::trace!("Heartbeat sent ({})", timestamp);
                }

                frame = self.transport.next() => {
                    match frame {
                        Some(Ok(Message::HeartbeatAck { timestamp })) => {
                            tracing::trace!("Heartbeat acknowledged ({})", timestamp);
                            last_heard = Instant::now();
                        }
                        Some(Ok(other)) => {
                            return DisconnectReason::Protocol(format!(
                                "unexpected {:?}",
                                other.message_type()
                            ));
                        }
                        Some(Err(e)) => return DisconnectReason::Transport(e.to_string()),
                        None => return DisconnectReason::ServerClosed,
                    }
                }
            }
        }
    }

    /// Tell the server we are leaving, best effort
    async fn say_goodbye(&mut self) {
        if let Err(e) = self.transport.send(Message::Goodbye).await {
            tracing::debug!("Failed to send Goodbye: {}", e);
        }
    }
}
