//! Connection Registry implementation.
//!
//! Tracks live connections by identity for message routing.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::event::ServerEvent;

/// Opaque identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live connection handle: the connection id plus its outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Identifies the connection
    pub id: ConnectionId,
    /// Channel to send events to this connection
    pub sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { id, sender }
    }
}

/// Result of attempting to send an event to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Event was queued for delivery
    Sent,
    /// The connection's queue is full; the event was dropped
    ChannelFull,
    /// The connection's queue is closed
    ChannelClosed,
}

/// Registry mapping identities to live connections.
///
/// Thread-safe: both maps are `DashMap`s, so every read and write takes a
/// shard lock. The reverse map lets disconnects, which only know their own
/// connection id, find the identity they registered.
///
/// ## Usage
///
/// ```ignore
/// let registry = ConnectionRegistry::new();
///
/// // When a client joins:
/// let (tx, rx) = mpsc::channel(256);
/// registry.register("alice", ConnectionHandle::new(id, tx));
///
/// // When routing:
/// if let Some(handle) = registry.resolve("alice") {
///     registry.send_to(&handle, event);
/// }
///
/// // When the connection closes:
/// registry.unregister_by_handle(id);
/// ```
pub struct ConnectionRegistry {
    /// Identity to current connection
    connections: DashMap<String, ConnectionHandle>,
    /// Connection id to the identity it registered
    identities: DashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    /// Create a new connection registry.
    pub fn new() -> Self {
        info!("Creating connection registry");
        Self {
            connections: DashMap::new(),
            identities: DashMap::new(),
        }
    }

    /// Register a connection under an identity.
    ///
    /// Last write wins: if the identity is already mapped, the mapping is
    /// replaced and the displaced connection id is returned. The displaced
    /// connection stays open; its later disconnect will not remove the new
    /// mapping.
    #[instrument(skip(self, handle), fields(connection = %handle.id))]
    pub fn register(&self, identity: &str, handle: ConnectionHandle) -> Option<ConnectionId> {
        self.identities.insert(handle.id, identity.to_string());
        let displaced = self
            .connections
            .insert(identity.to_string(), handle)
            .map(|old| old.id);

        match displaced {
            Some(old) => debug!(displaced = %old, "Replaced existing registration"),
            None => debug!("Registered new connection"),
        }
        displaced
    }

    /// Look up the connection currently registered for an identity.
    pub fn resolve(&self, identity: &str) -> Option<ConnectionHandle> {
        self.connections
            .get(identity)
            .map(|entry| entry.value().clone())
    }

    /// Remove the registration made by a connection.
    ///
    /// The identity mapping is only removed if it still points at `id`, so
    /// a stale disconnect cannot evict a newer connection that reclaimed the
    /// identity. Returns the identity that was removed, if any.
    #[instrument(skip(self), fields(connection = %id))]
    pub fn unregister_by_handle(&self, id: ConnectionId) -> Option<String> {
        let (_, identity) = self.identities.remove(&id)?;

        let removed = self
            .connections
            .remove_if(&identity, |_, handle| handle.id == id)
            .map(|(identity, _)| identity);

        if removed.is_some() {
            debug!(identity = %identity, "Unregistered connection");
        } else {
            debug!(identity = %identity, "Identity already reclaimed by a newer connection");
        }
        removed
    }

    /// Check if an identity currently resolves to a connection.
    pub fn is_connected(&self, identity: &str) -> bool {
        self.connections.contains_key(identity)
    }

    /// Get the number of registered identities.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Snapshot of every registered connection handle.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Queue an event on a connection. At most one attempt is made.
    pub fn send_to(&self, handle: &ConnectionHandle, event: ServerEvent) -> SendResult {
        match handle.sender.try_send(event) {
            Ok(()) => SendResult::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection = %handle.id, "Outbound queue full, dropping event");
                SendResult::ChannelFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(connection = %handle.id, "Outbound queue closed, connection may have dropped");
                SendResult::ChannelClosed
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connection_count", &self.connections.len())
            .finish()
    }
}
