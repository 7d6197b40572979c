//! Connection registry: live connections, group membership, and fan-out.
//!
//! The registry is the only shared mutable structure in the server. It tracks
//! every open WebSocket connection, which named groups each one has joined,
//! and delivers events to all members of a group. It is explicitly
//! constructed and injected into both the connection handler and the event
//! router; there is no process-wide singleton.
//!
//! # Concurrency
//!
//! All state lives behind a single [`RwLock`]. Broadcast iterates the member
//! set under the read lock; membership mutation takes the write lock, so a
//! broadcast racing a disconnect either sees the connection (at-most-once
//! extra delivery) or does not. Once [`Registry::remove_connection`] returns,
//! the connection's receiver has been dropped and no further delivery can
//! reach it.
//!
//! Delivery is a non-blocking push into the connection's unbounded channel,
//! so one slow or dead recipient never stalls the others or the publisher.
//!
//! # Example
//!
//! ```rust
//! use pulse_server::registry::Registry;
//! use pulse_server::types::{Event, EventType, BROADCAST_GROUP};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let registry = Registry::new();
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let id = registry.register(7, tx).await;
//! registry.join(id, BROADCAST_GROUP).await;
//!
//! let event = Event::new(EventType::PostCreate, json!({"id": 1}));
//! let delivered = registry.broadcast(BROADCAST_GROUP, &event).await;
//! assert_eq!(delivered, 1);
//! assert_eq!(rx.recv().await.unwrap(), event);
//!
//! registry.remove_connection(id).await;
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::types::{user_group, Event, UserId};

/// Unique identifier of one live connection.
pub type ConnectionId = Uuid;

/// Sender half used to deliver events to one connection's outbound task.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// State kept for one registered connection.
struct ConnectionEntry {
    user_id: UserId,
    sender: EventSender,
    groups: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

/// Tracks live connections and their group memberships.
///
/// Cheap to share via `Arc`; all methods take `&self`.
pub struct Registry {
    inner: RwLock<Inner>,
    /// Connection total kept outside the lock for health reporting.
    active_count: AtomicUsize,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Registers a new connection and returns its id.
    ///
    /// The connection starts with no group memberships; the connection
    /// handler joins groups explicitly once the identity is known.
    pub async fn register(&self, user_id: UserId, sender: EventSender) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            id,
            ConnectionEntry {
                user_id,
                sender,
                groups: HashSet::new(),
            },
        );
        let count = self.active_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(connection_id = %id, user_id, active = count, "connection registered");
        id
    }

    /// Joins a connection to a group. Idempotent; creates the group bucket
    /// if absent. Returns `false` if the connection is not registered.
    pub async fn join(&self, id: ConnectionId, group: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.get_mut(&id) else {
            warn!(connection_id = %id, group, "join for unknown connection");
            return false;
        };
        entry.groups.insert(group.to_string());
        inner.groups.entry(group.to_string()).or_default().insert(id);
        trace!(connection_id = %id, group, "joined group");
        true
    }

    /// Removes a connection from a group. Idempotent; drops the group bucket
    /// once it empties.
    pub async fn leave(&self, id: ConnectionId, group: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.connections.get_mut(&id) {
            entry.groups.remove(group);
        }
        if let Some(members) = inner.groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                inner.groups.remove(group);
            }
        }
        trace!(connection_id = %id, group, "left group");
    }

    /// Removes a connection from every group and drops it from the registry.
    ///
    /// This is the single atomic deregistration step on disconnect: once it
    /// returns, the connection's sender is gone and no broadcast can reach
    /// it. Calling it again for the same id is a no-op.
    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.remove(&id) else {
            trace!(connection_id = %id, "remove for already-removed connection");
            return;
        };

        for group in &entry.groups {
            if let Some(members) = inner.groups.get_mut(group) {
                members.remove(&id);
                if members.is_empty() {
                    inner.groups.remove(group);
                }
            }
        }

        let count = self.active_count.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(
            connection_id = %id,
            user_id = entry.user_id,
            groups = entry.groups.len(),
            active = count,
            "connection removed"
        );
    }

    /// Delivers an event to every current member of a group.
    ///
    /// Each delivery is independent: a failed push to one recipient (its
    /// receiver already dropped) is logged and skipped without affecting the
    /// others. Returns the number of successful deliveries.
    pub async fn broadcast(&self, group: &str, event: &Event) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(group) else {
            trace!(group, event_type = %event.event_type, "broadcast to empty group");
            return 0;
        };

        let mut delivered = 0;
        for id in members {
            let Some(entry) = inner.connections.get(id) else {
                continue;
            };
            if entry.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(
                    connection_id = %id,
                    user_id = entry.user_id,
                    group,
                    event_type = %event.event_type,
                    "delivery failed, recipient channel closed"
                );
            }
        }

        debug!(group, event_type = %event.event_type, delivered, "broadcast event");
        delivered
    }

    /// Delivers an event to one user's personal group.
    pub async fn send_to_user(&self, user_id: UserId, event: &Event) -> usize {
        self.broadcast(&user_group(user_id), event).await
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Number of connections currently joined to a group.
    pub async fn member_count(&self, group: &str) -> usize {
        let inner = self.inner.read().await;
        inner.groups.get(group).map_or(0, HashSet::len)
    }

    /// The set of groups a connection has joined, or `None` if it is not
    /// registered.
    pub async fn groups_of(&self, id: ConnectionId) -> Option<HashSet<String>> {
        let inner = self.inner.read().await;
        inner.connections.get(&id).map(|entry| entry.groups.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}
