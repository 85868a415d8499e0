//! Registry of live, authenticated agent connections
//!
//! The registry is the only mutable state shared between connection
//! tasks. Every operation takes the same mutex, so `add`, `touch`, `remove`
//! and `count` are linearizable: `count` always reports a state that
//! existed at some instant, never a half-applied update. Critical sections
//! are a hash map operation or a linear scan, never an await.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use presence_core::time::current_time_millis;
use presence_core::types::{ConnectionId, Presence};

/// One authenticated connection from one computer
#[derive(Debug)]
struct ClientConnection {
    peer_addr: SocketAddr,
    connected_at: Instant,
    connected_at_millis: u64,
    last_activity: Instant,
    heartbeats: u64,
    /// Fired when the registry drops the entry on its own (sweep)
    cancel: CancellationToken,
}

/// Point-in-time view of a registry entry
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Unix millis at which authentication completed
    pub connected_at_millis: u64,
    pub connected_for: Duration,
    /// Time since the last heartbeat (or since admission)
    pub idle: Duration,
    pub heartbeats: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<ConnectionId, ClientConnection>,
    next_id: u64,
}

/// Concurrency-safe set of live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an authenticated connection.
    ///
    /// `cancel` is fired if the entry is later evicted by the sweep, so the
    /// owning task can close the transport.
    pub fn add(&self, peer_addr: SocketAddr, cancel: CancellationToken) -> ConnectionId {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        inner.next_id += 1;
        let id = ConnectionId::new(inner.next_id);
        inner.entries.insert(
            id,
            ClientConnection {
                peer_addr,
                connected_at: now,
                connected_at_millis: current_time_millis(),
                last_activity: now,
                heartbeats: 0,
                cancel,
            },
        );

        if inner.entries.len() == 1 {
            tracing::info!("Presence changed: {} -> {}", Presence::Offline, Presence::Online);
        }
        tracing::debug!(
            "Registered {} from {} ({} live)",
            id,
            peer_addr,
            inner.entries.len()
        );
        id
    }

    /// Record a heartbeat. Returns false if the entry is gone (evicted).
    pub fn touch(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&id) {
            Some(entry) => {
                entry.last_activity = Instant::now();
                entry.heartbeats += 1;
                true
            }
            None => false,
        }
    }

    /// Drop an entry. Idempotent; returns whether it was still present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(&id).is_some();

        if removed {
            tracing::debug!("Removed {} ({} live)", id, inner.entries.len());
            if inner.entries.is_empty() {
                tracing::info!("Presence changed: {} -> {}", Presence::Online, Presence::Offline);
            }
        }
        removed
    }

    /// Number of live entries
    pub fn count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Evict every entry silent for longer than `grace`.
    ///
    /// Evicted entries have their cancellation token fired after removal.
    pub fn evict_expired(&self, grace: Duration) -> Vec<ConnectionId> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired: Vec<ConnectionId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_activity) > grace)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(entry) = inner.entries.remove(id) {
                tracing::info!(
                    "Evicting {} from {}: silent for {:?}",
                    id,
                    entry.peer_addr,
                    now.saturating_duration_since(entry.last_activity)
                );
                entry.cancel.cancel();
            }
        }

        if !expired.is_empty() && inner.entries.is_empty() {
            tracing::info!("Presence changed: {} -> {}", Presence::Online, Presence::Offline);
        }
        expired
    }

    /// Snapshot of all entries, oldest first
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let now = Instant::now();
        let inner = self.inner.lock();

        let mut list: Vec<ConnectionInfo> = inner
            .entries
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                id: *id,
                peer_addr: entry.peer_addr,
                connected_at_millis: entry.connected_at_millis,
                connected_for: now.saturating_duration_since(entry.connected_at),
                idle: now.saturating_duration_since(entry.last_activity),
                heartbeats: entry.heartbeats,
            })
            .collect();
        list.sort_by_key(|info| info.id);
        list
    }
}

/// Removes a registry entry when dropped.
///
/// Held by the connection task for as long as the connection is admitted,
/// so the entry goes away however the task ends: clean close, transport
/// error, shutdown, or panic.
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistrationGuard {
    /// Admit a connection and tie its entry to the returned guard
    pub fn register(
        registry: Arc<ConnectionRegistry>,
        peer_addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Self {
        let id = registry.add(peer_addr, cancel);
        Self { registry, id }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Forward a heartbeat to the registry
    pub fn touch(&self) -> bool {
        self.registry.touch(self.id)
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_add_touch_remove() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());

        let id = registry.add(peer(1), CancellationToken::new());
        assert_eq!(registry.count(), 1);
        assert!(registry.touch(id));
        assert_eq!(registry.list()[0].heartbeats, 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(!registry.touch(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_same_peer_gets_independent_entries() {
        let registry = ConnectionRegistry::new();
        let a = registry.add(peer(1), CancellationToken::new());
        let b = registry.add(peer(1), CancellationToken::new());
        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);

        registry.remove(a);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.list()[0].id, b);
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        {
            let guard =
                RegistrationGuard::register(Arc::clone(&registry), peer(2), CancellationToken::new());
            assert!(guard.touch());
            assert_eq!(registry.count(), 1);
        }
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired_cancels_only_silent_entries() {
        let registry = ConnectionRegistry::new();
        let silent_token = CancellationToken::new();
        let chatty_token = CancellationToken::new();
        let silent = registry.add(peer(1), silent_token.clone());
        let chatty = registry.add(peer(2), chatty_token.clone());

        tokio::time::advance(Duration::from_secs(8)).await;
        registry.touch(chatty);
        tokio::time::advance(Duration::from_secs(3)).await;

        let evicted = registry.evict_expired(Duration::from_secs(10));
        assert_eq!(evicted, vec![silent]);
        assert!(silent_token.is_cancelled());
        assert!(!chatty_token.is_cancelled());
        assert_eq!(registry.count(), 1);
        assert!(registry.list()[0].idle <= Duration::from_secs(3));
    }

    #[test]
    fn test_concurrent_adds_and_removes_balance() {
        let registry = Arc::new(ConnectionRegistry::new());
        let threads: Vec<_> = (0..8u16)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..500u16 {
                        let id = registry.add(peer(t * 1000 + i), CancellationToken::new());
                        // keep every fifth entry, remove the rest
                        if i % 5 == 0 {
                            kept.push(id);
                        } else {
                            assert!(registry.remove(id));
                        }
                        let _ = registry.count();
                    }
                    kept.len()
                })
            })
            .collect();

        let kept: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(kept, 8 * 100);
        assert_eq!(registry.count(), kept);
        assert_eq!(registry.list().len(), kept);
    }

    #[test]
    fn test_count_never_observes_phantom_states() {
        // Each writer holds exactly one entry at a time by adding the next
        // before removing the previous, so live count stays in 1..=2 per
        // writer. A reader seeing a value outside 0..=2*writers would mean
        // a torn read.
        let registry = Arc::new(ConnectionRegistry::new());
        let writers = 4;
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut current = registry.add(peer(w), CancellationToken::new());
                    for _ in 0..2000 {
                        let next = registry.add(peer(w), CancellationToken::new());
                        registry.remove(current);
                        current = next;
                    }
                    registry.remove(current);
                })
            })
            .collect();

        let reader = {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let n = registry.count();
                    assert!(n <= 2 * writers as usize, "impossible count {}", n);
                }
            })
        };

        for h in handles {
            h.join().unwrap();
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        reader.join().unwrap();
        assert_eq!(registry.count(), 0);
    }
}
