//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registry handle for one authenticated connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Aggregate answer to "is this person online?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    /// At least one computer holds a live connection
    Online,
    /// No live connections
    Offline,
}

impl Presence {
    /// Map the OR over all connections to a presence value
    pub fn from_online(online: bool) -> Self {
        if online {
            Presence::Online
        } else {
            Presence::Offline
        }
    }

    /// Exact body served by the status endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "ONLINE",
            Presence::Offline => "OFFLINE",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Presence::Online)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Presence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ONLINE" => Ok(Presence::Online),
            "OFFLINE" => Ok(Presence::Offline),
            other => Err(format!("unexpected status body: {:?}", other)),
        }
    }
}

/// Client liveness loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    /// No transport; waiting out backoff or the presence gate
    Disconnected,
    /// Transport open, handshake in progress
    Authenticating,
    /// Authenticated and sending heartbeats
    Connected,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "disconnected"),
            ClientState::Authenticating => write!(f, "authenticating"),
            ClientState::Connected => write!(f, "connected"),
        }
    }
}
