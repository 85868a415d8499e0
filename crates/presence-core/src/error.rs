//! Core error types

use presence_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures on a single presence connection.
///
/// None of these is fatal to the process: the server drops the one
/// connection, the agent falls back to `Disconnected` and retries.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Signature rejected by the server
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Handshake did not complete in time
    #[error("Authentication timed out after {0:?}")]
    AuthenticationTimeout(std::time::Duration),

    /// Peer sent something the handshake does not allow
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Server speaks an incompatible protocol version
    #[error("Protocol version mismatch: server speaks {server}, we speak {ours}")]
    VersionMismatch { server: String, ours: String },

    /// TCP connect failed or timed out
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Established connection went away
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Framing error on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Key loading and generation errors
#[derive(Error, Debug)]
pub enum KeyError {
    /// Key file missing
    #[error("Key file not found: {0}")]
    NotFound(PathBuf),

    /// Key file exists but could not be parsed
    #[error("Failed to read key from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ssh_key::Error,
    },

    /// Key is passphrase protected
    #[error("Private key {0} is encrypted; presence keys must not have a passphrase")]
    Encrypted(PathBuf),

    /// Only Ed25519 keys are accepted
    #[error("Unsupported key algorithm {algorithm} in {path} (expected ssh-ed25519)")]
    UnsupportedAlgorithm { path: PathBuf, algorithm: String },

    /// Refusing to clobber an existing key
    #[error("Refusing to overwrite existing key file {0}")]
    AlreadyExists(PathBuf),

    /// Key generation or encoding failed
    #[error("Key generation failed: {0}")]
    Generate(#[source] ssh_key::Error),

    /// I/O error while writing a key
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
