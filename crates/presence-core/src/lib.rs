//! presence-core: Shared building blocks for presence
//!
//! This crate provides the error types, configuration structures, key file
//! handling and small domain types used by the server, the agent and the
//! CLI.

pub mod config;
pub mod error;
pub mod keys;
pub mod time;
pub mod types;

pub use types::{ClientState, ConnectionId, Presence};
