//! ClientRegistry: the live set of connections and their identities.
//!
//! The registry is the only shared mutable state in the relay.  It lives
//! inside the relay's single event loop, so it is never accessed from two
//! places at once and needs no lock.
//!
//! # Identity side table
//!
//! A client's [`Identity`] is not stored on the transport handle.  The
//! registry keeps a separate `ConnectionId → Identity` map and removes both
//! entries together, so a connection can never outlive its identity or the
//! other way round.
//!
//! # Iteration order
//!
//! Connections are kept in a `BTreeMap` keyed by [`ConnectionId`].  Ids are
//! assigned in accept order, so [`ClientRegistry::iter`] yields clients in the
//! order they connected.  Iteration borrows the registry, which statically
//! rules out adds or removes while a broadcast is walking it.

use std::collections::{BTreeMap, HashMap};

use rbx_connect_core::Identity;
use thiserror::Error;

use crate::domain::ConnectionId;

/// Error returned when a frame cannot be handed to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection's writer has already shut down.
    #[error("connection is closed")]
    Closed,
}

/// Send/close capability of one client connection.
///
/// The WebSocket session in `infrastructure::ws_server` implements this;
/// tests use an in-memory fake.
///
/// Both operations are fire-and-forget: they must not wait for the frame to
/// reach the socket.
pub trait Connection: Send + 'static {
    /// Queues a text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the connection can no longer send.
    fn send(&self, frame: &str) -> Result<(), SendError>;

    /// Starts a graceful close.  Does not wait for the peer.
    fn close(&self);
}

/// A connection taken out of the registry, together with its identity.
#[derive(Debug)]
pub struct RemovedClient<C> {
    pub connection: C,
    pub identity: Option<Identity>,
}

/// In-memory registry of all open client connections.
pub struct ClientRegistry<C> {
    connections: BTreeMap<ConnectionId, C>,
    identities: HashMap<ConnectionId, Identity>,
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self {
            connections: BTreeMap::new(),
            identities: HashMap::new(),
        }
    }
}

impl<C: Connection> ClientRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open connection.
    ///
    /// Returns `false` (and keeps the existing entry) if `id` is already
    /// registered.
    pub fn add(&mut self, id: ConnectionId, connection: C) -> bool {
        if self.connections.contains_key(&id) {
            return false;
        }
        self.connections.insert(id, connection);
        true
    }

    /// Removes a connection and its identity in one step.
    pub fn remove(&mut self, id: ConnectionId) -> Option<RemovedClient<C>> {
        let connection = self.connections.remove(&id)?;
        Some(RemovedClient {
            connection,
            identity: self.identities.remove(&id),
        })
    }

    /// Attaches an identity to a registered connection, replacing any
    /// previous one.
    ///
    /// Returns `false` if `id` is not registered; the identity is dropped.
    pub fn set_identity(&mut self, id: ConnectionId, identity: Identity) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }
        self.identities.insert(id, identity);
        true
    }

    pub fn identity(&self, id: ConnectionId) -> Option<&Identity> {
        self.identities.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of open connections, identified or not.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Iterates over `(id, connection, identity)` in accept order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &C, Option<&Identity>)> + '_ {
        let identities = &self.identities;
        self.connections
            .iter()
            .map(move |(id, conn)| (*id, conn, identities.get(id)))
    }

    /// Removes every connection, in accept order.
    pub fn drain(&mut self) -> Vec<(ConnectionId, RemovedClient<C>)> {
        let connections = std::mem::take(&mut self.connections);
        connections
            .into_iter()
            .map(|(id, connection)| {
                let identity = self.identities.remove(&id);
                (id, RemovedClient { connection, identity })
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Arc, Mutex};

    use super::{Connection, SendError};

    /// In-memory connection that records what was sent to it.
    ///
    /// Clones share state, so a test can keep one handle while the registry
    /// owns the other.
    #[derive(Clone, Default)]
    pub(crate) struct FakeConnection {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
        failing: bool,
    }

    impl FakeConnection {
        /// A connection whose every send fails, as if its socket were closing.
        pub(crate) fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().expect("lock poisoned").clone()
        }

        pub(crate) fn is_closed(&self) -> bool {
            *self.closed.lock().expect("lock poisoned")
        }
    }

    impl Connection for FakeConnection {
        fn send(&self, frame: &str) -> Result<(), SendError> {
            if self.failing || self.is_closed() {
                return Err(SendError::Closed);
            }
            self.sent
                .lock()
                .expect("lock poisoned")
                .push(frame.to_string());
            Ok(())
        }

        fn close(&self) {
            *self.closed.lock().expect("lock poisoned") = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeConnection;
    use super::*;

    fn id(n: u64) -> ConnectionId {
        ConnectionId(n)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry: ClientRegistry<FakeConnection> = ClientRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_add_registers_connection_without_identity() {
        let mut registry = ClientRegistry::new();
        assert!(registry.add(id(1), FakeConnection::default()));
        assert!(registry.contains(id(1)));
        assert!(registry.identity(id(1)).is_none());
    }

    #[test]
    fn test_add_duplicate_id_is_rejected() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());
        assert!(!registry.add(id(1), FakeConnection::default()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_identity_then_read_back() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());

        assert!(registry.set_identity(id(1), Identity::new("Rig One", "rig1")));

        assert_eq!(
            registry.identity(id(1)),
            Some(&Identity::new("Rig One", "rig1"))
        );
    }

    #[test]
    fn test_set_identity_overwrites() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());
        registry.set_identity(id(1), Identity::new("Old", "old"));
        registry.set_identity(id(1), Identity::new("New", "new"));
        assert_eq!(registry.identity(id(1)).unwrap().name, "new");
    }

    #[test]
    fn test_set_identity_for_unknown_connection_is_ignored() {
        let mut registry: ClientRegistry<FakeConnection> = ClientRegistry::new();
        assert!(!registry.set_identity(id(9), Identity::new("Ghost", "ghost")));
        assert!(registry.identity(id(9)).is_none());
    }

    #[test]
    fn test_remove_returns_connection_and_identity_together() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());
        registry.set_identity(id(1), Identity::new("Rig One", "rig1"));

        let removed = registry.remove(id(1)).expect("registered");

        assert_eq!(removed.identity, Some(Identity::new("Rig One", "rig1")));
        assert!(!registry.contains(id(1)));
        assert!(registry.identity(id(1)).is_none());
    }

    #[test]
    fn test_remove_twice_returns_none_second_time() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());
        assert!(registry.remove(id(1)).is_some());
        assert!(registry.remove(id(1)).is_none());
    }

    #[test]
    fn test_iter_yields_accept_order_with_identities() {
        let mut registry = ClientRegistry::new();
        registry.add(id(3), FakeConnection::default());
        registry.add(id(1), FakeConnection::default());
        registry.add(id(2), FakeConnection::default());
        registry.set_identity(id(2), Identity::new("Two", "two"));

        let seen: Vec<(ConnectionId, Option<String>)> = registry
            .iter()
            .map(|(cid, _, identity)| (cid, identity.map(|i| i.name.clone())))
            .collect();

        assert_eq!(
            seen,
            vec![
                (id(1), None),
                (id(2), Some("two".to_string())),
                (id(3), None)
            ]
        );
    }

    #[test]
    fn test_drain_empties_both_tables() {
        let mut registry = ClientRegistry::new();
        registry.add(id(1), FakeConnection::default());
        registry.add(id(2), FakeConnection::default());
        registry.set_identity(id(1), Identity::new("One", "one"));

        let drained = registry.drain();

        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, id(1));
        assert!(drained[0].1.identity.is_some());
        assert!(registry.is_empty());
        assert!(registry.identity(id(1)).is_none());
    }
}
