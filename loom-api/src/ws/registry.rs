//! Dream status connection registry
//!
//! In-memory map from dream id to the set of live client connections
//! watching that dream. The processing pipeline publishes status updates
//! through here; delivery is best-effort and a dream with no watchers is the
//! normal case, since processing keeps running whether or not anyone has a
//! socket open.
//!
//! One registry instance is created at startup and shared via `AppState`;
//! a single mutex guards every read-modify-write sequence, including the
//! drop-broken-connection side effect inside `publish`.

use loom_common::events::StatusUpdate;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque handle identifying one registered connection
///
/// Returned by `register`; required for `unregister` so two tabs watching
/// the same dream never remove each other's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle {
    dream_id: i64,
    connection_id: u64,
}

struct Connection {
    id: u64,
    sender: mpsc::UnboundedSender<StatusUpdate>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<i64, Vec<Connection>>,
    next_connection_id: u64,
}

/// Registry of live per-dream status connections
#[derive(Default)]
pub struct StatusRegistry {
    inner: Mutex<RegistryInner>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a dream's status updates
    ///
    /// A dream id may have zero, one, or many registered connections
    /// (multiple tabs or devices watching the same dream).
    pub fn register(
        &self,
        dream_id: i64,
        sender: mpsc::UnboundedSender<StatusUpdate>,
    ) -> ConnectionHandle {
        let mut inner = self.lock();
        inner.next_connection_id += 1;
        let connection_id = inner.next_connection_id;
        inner
            .connections
            .entry(dream_id)
            .or_default()
            .push(Connection {
                id: connection_id,
                sender,
            });
        debug!(dream_id, connection_id, "Status connection registered");
        ConnectionHandle {
            dream_id,
            connection_id,
        }
    }

    /// Remove a connection; drops the dream's entry when its set empties
    pub fn unregister(&self, handle: ConnectionHandle) {
        let mut inner = self.lock();
        if let Some(connections) = inner.connections.get_mut(&handle.dream_id) {
            connections.retain(|c| c.id != handle.connection_id);
            if connections.is_empty() {
                inner.connections.remove(&handle.dream_id);
            }
        }
        debug!(
            dream_id = handle.dream_id,
            connection_id = handle.connection_id,
            "Status connection unregistered"
        );
    }

    /// Deliver an update to every connection registered for a dream
    ///
    /// Best-effort: a connection whose send fails is dropped from the
    /// registry and delivery continues to the rest. Zero registered
    /// connections is a silent no-op. Never returns an error, so the
    /// pipeline calls this unconditionally at every phase transition.
    pub fn publish(&self, dream_id: i64, update: StatusUpdate) {
        let mut inner = self.lock();
        let Some(connections) = inner.connections.get_mut(&dream_id) else {
            return;
        };

        connections.retain(|connection| {
            let delivered = connection.sender.send(update.clone()).is_ok();
            if !delivered {
                debug!(
                    dream_id,
                    connection_id = connection.id,
                    "Dropping broken status connection"
                );
            }
            delivered
        });

        if connections.is_empty() {
            inner.connections.remove(&dream_id);
        }
    }

    /// Number of live connections for a dream (diagnostics and tests)
    pub fn connection_count(&self, dream_id: i64) -> usize {
        self.lock()
            .connections
            .get(&dream_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A panic while holding the lock poisons it; the map itself is still
        // coherent, so recover rather than cascade the panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_common::events::{DreamStatus, StatusUpdate};

    #[test]
    fn test_publish_without_connections_is_noop() {
        let registry = StatusRegistry::new();
        registry.publish(1, StatusUpdate::done(1));
        assert_eq!(registry.connection_count(1), 0);
    }

    #[test]
    fn test_publish_reaches_all_connections_for_dream() {
        let registry = StatusRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_other, mut rx_other) = mpsc::unbounded_channel();

        registry.register(7, tx_a);
        registry.register(7, tx_b);
        registry.register(8, tx_other);

        registry.publish(7, StatusUpdate::progress(DreamStatus::Analyzing, "working"));

        assert_eq!(rx_a.try_recv().unwrap().status, DreamStatus::Analyzing);
        assert_eq!(rx_b.try_recv().unwrap().status, DreamStatus::Analyzing);
        assert!(rx_other.try_recv().is_err(), "other dream must not receive");
    }

    #[test]
    fn test_failed_send_drops_connection_but_delivers_to_rest() {
        let registry = StatusRegistry::new();
        let (tx_broken, rx_broken) = mpsc::unbounded_channel();
        let (tx_healthy, mut rx_healthy) = mpsc::unbounded_channel();

        registry.register(3, tx_broken);
        registry.register(3, tx_healthy);
        drop(rx_broken); // client went away without unregistering

        registry.publish(3, StatusUpdate::done(3));

        assert_eq!(rx_healthy.try_recv().unwrap().status, DreamStatus::Done);
        assert_eq!(registry.connection_count(3), 1);
    }

    #[test]
    fn test_unregister_removes_only_own_connection() {
        let registry = StatusRegistry::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let handle_a = registry.register(5, tx_a);
        registry.register(5, tx_b);

        registry.unregister(handle_a);
        assert_eq!(registry.connection_count(5), 1);

        registry.publish(5, StatusUpdate::done(5));
        assert_eq!(rx_b.try_recv().unwrap().status, DreamStatus::Done);
    }

    #[test]
    fn test_empty_set_removes_key() {
        let registry = StatusRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = registry.register(9, tx);
        registry.unregister(handle);

        let inner = registry.lock();
        assert!(
            !inner.connections.contains_key(&9),
            "abandoned dream ids must not accumulate"
        );
    }
}
