//! Server state shared by all tasks

use std::sync::Arc;

use presence_core::config::ServerConfig;

use crate::auth::IdentityVerifier;
use crate::connection::ConnectionRegistry;
use crate::presence::PresenceAggregator;

/// Explicitly constructed, explicitly shared server state.
///
/// Nothing here is process-global, so tests can run several servers side
/// by side.
pub struct ServerState {
    /// Configuration
    pub config: ServerConfig,
    /// Live connections
    pub registry: Arc<ConnectionRegistry>,
    /// Trust anchor
    pub verifier: Arc<IdentityVerifier>,
}

impl ServerState {
    pub fn new(config: ServerConfig, verifier: IdentityVerifier) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            verifier: Arc::new(verifier),
        }
    }

    /// Presence view over this state's registry
    pub fn aggregator(&self) -> PresenceAggregator {
        PresenceAggregator::new(Arc::clone(&self.registry))
    }
}
