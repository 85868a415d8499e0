//! Presence aggregation

use std::sync::Arc;

use presence_core::types::Presence;

use crate::connection::ConnectionRegistry;

/// Read-through view turning the registry into one boolean.
///
/// Holds no state of its own; the person is online exactly when at least
/// one of their computers has a live entry.
#[derive(Debug, Clone)]
pub struct PresenceAggregator {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceAggregator {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_online(&self) -> bool {
        self.registry.count() > 0
    }

    pub fn presence(&self) -> Presence {
        Presence::from_online(self.is_online())
    }
}
