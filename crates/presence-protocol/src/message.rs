//! Message types for the presence protocol
//!
//! # Message Flow
//!
//! 1. Agent opens a TCP connection
//! 2. Server sends `Challenge` carrying a fresh nonce
//! 3. Agent answers with `Response`, an SSH signature over the nonce
//! 4. Server sends `AuthResult`; on rejection it closes the connection
//! 5. Agent sends `Heartbeat` periodically, server answers `HeartbeatAck`
//! 6. Agent sends `Goodbye` before a clean disconnect
//!
//! Nothing but the handshake messages is accepted before step 4 succeeds.

use serde::{Deserialize, Serialize};

use crate::nonce::Nonce;

/// Current protocol version string.
///
/// Format: "MAJOR.MINOR" where MAJOR changes indicate breaking changes.
pub const PROTOCOL_VERSION: &str = "1.0";

/// SSHSIG namespace used when signing challenge nonces.
pub const SIGNATURE_NAMESPACE: &str = "presence";

/// Whether a peer advertising `version` can talk to us
pub fn is_compatible_version(version: &str) -> bool {
    fn major(v: &str) -> Option<&str> {
        v.split('.').next().filter(|m| !m.is_empty())
    }
    major(version).is_some() && major(version) == major(PROTOCOL_VERSION)
}

/// Message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Nonce challenge (server → agent)
    Challenge = 0x01,
    /// Signed nonce (agent → server)
    Response = 0x02,
    /// Handshake verdict (server → agent)
    AuthResult = 0x03,
    /// Liveness signal (agent → server)
    Heartbeat = 0x04,
    /// Liveness acknowledgment (server → agent)
    HeartbeatAck = 0x05,
    /// Clean disconnect (agent → server)
    Goodbye = 0x06,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Challenge),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::AuthResult),
            0x04 => Some(Self::Heartbeat),
            0x05 => Some(Self::HeartbeatAck),
            0x06 => Some(Self::Goodbye),
            _ => None,
        }
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// First frame on every connection
    Challenge {
        /// Single-use nonce to sign
        nonce: Nonce,
        /// Server protocol version
        version: String,
    },

    /// Answer to a challenge
    Response {
        /// PEM-armored SSHSIG over the nonce bytes
        signature: String,
    },

    /// Handshake verdict.
    ///
    /// Deliberately carries no reason: a rejected peer learns nothing
    /// beyond the fact that it was rejected.
    AuthResult {
        /// Whether the signature was accepted
        accepted: bool,
    },

    /// Liveness signal
    Heartbeat {
        /// Sender's unix time in milliseconds
        timestamp: u64,
    },

    /// Liveness acknowledgment
    HeartbeatAck {
        /// Echo of the heartbeat timestamp
        timestamp: u64,
    },

    /// Agent is going away on purpose
    Goodbye,
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Challenge { .. } => MessageType::Challenge,
            Message::Response { .. } => MessageType::Response,
            Message::AuthResult { .. } => MessageType::AuthResult,
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::HeartbeatAck { .. } => MessageType::HeartbeatAck,
            Message::Goodbye => MessageType::Goodbye,
        }
    }
}
