//! Event routing from backend publishers to subscriber groups.
//!
//! The [`EventRouter`] is the single entry point other parts of the backend
//! use to emit real-time events. Callers name an event type, an audience,
//! and a payload; the router maps the audience to registry groups and fans
//! the event out. Publishing is fire-and-forget: the caller learns how many
//! connections the event reached but a count of zero is not an error.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pulse_server::publish::EventRouter;
//! use pulse_server::registry::Registry;
//! use pulse_server::types::{Audience, EventType};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let router = EventRouter::new(Arc::new(Registry::new()));
//!
//! // Nobody is connected, so the event reaches nobody. Not an error.
//! let delivered = router
//!     .publish(EventType::PostCreate, Audience::Public, json!({"id": 1}))
//!     .await;
//! assert_eq!(delivered, 0);
//! # });
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::Registry;
use crate::types::{Audience, Event, EventType, BROADCAST_GROUP};

/// Routes published events to the right registry groups.
#[derive(Debug, Clone)]
pub struct EventRouter {
    registry: Arc<Registry>,
}

impl EventRouter {
    /// Creates a router over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Publishes an event to an audience and returns how many connections
    /// it was delivered to.
    ///
    /// Suppressed as a no-op (returning 0) when the payload is not a
    /// non-empty JSON object, or when a restricted audience lists no
    /// recipients. Suppression is logged; it never surfaces to subscribers.
    pub async fn publish(&self, event_type: EventType, audience: Audience, data: Value) -> usize {
        if !payload_is_publishable(&data) {
            warn!(
                event_type = %event_type,
                "suppressed publish with empty or non-object payload"
            );
            return 0;
        }

        let event = Event::new(event_type, data);

        let delivered = match audience {
            Audience::Public => self.registry.broadcast(BROADCAST_GROUP, &event).await,
            Audience::Users(user_ids) => {
                if user_ids.is_empty() {
                    warn!(event_type = %event_type, "suppressed publish with empty audience");
                    return 0;
                }
                let mut delivered = 0;
                for user_id in user_ids {
                    delivered += self.registry.send_to_user(user_id, &event).await;
                }
                delivered
            }
        };

        debug!(event_type = %event_type, delivered, "published event");
        delivered
    }
}

/// A payload is publishable only if it is a JSON object with at least one
/// field. Anything else indicates a caller bug upstream and is dropped
/// rather than sent to every browser.
fn payload_is_publishable(data: &Value) -> bool {
    matches!(data, Value::Object(map) if !map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{user_group, UserId};
    use serde_json::json;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    async fn subscriber(
        registry: &Registry,
        user_id: UserId,
        groups: &[&str],
    ) -> UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.register(user_id, tx).await;
        for group in groups {
            registry.join(id, group).await;
        }
        rx
    }

    #[tokio::test]
    async fn public_event_reaches_all_broadcast_members() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx_a = subscriber(&registry, 1, &[BROADCAST_GROUP, &user_group(1)]).await;
        let mut rx_b = subscriber(&registry, 2, &[BROADCAST_GROUP, &user_group(2)]).await;

        let delivered = router
            .publish(EventType::PostCreate, Audience::Public, json!({"id": 5}))
            .await;
        assert_eq!(delivered, 2);

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::PostCreate);
        assert_eq!(event.data, json!({"id": 5}));
        assert_eq!(rx_b.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn restricted_event_reaches_only_listed_users() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx_a = subscriber(&registry, 1, &[BROADCAST_GROUP, &user_group(1)]).await;
        let mut rx_b = subscriber(&registry, 2, &[BROADCAST_GROUP, &user_group(2)]).await;
        let mut rx_c = subscriber(&registry, 3, &[BROADCAST_GROUP, &user_group(3)]).await;

        let delivered = router
            .publish(
                EventType::FriendRequest,
                Audience::Users(vec![1, 3]),
                json!({"from": 2}),
            )
            .await;
        assert_eq!(delivered, 2);

        assert_eq!(rx_a.recv().await.unwrap().event_type, EventType::FriendRequest);
        assert_eq!(rx_c.recv().await.unwrap().event_type, EventType::FriendRequest);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn restricted_event_to_offline_user_is_a_noop() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx_a = subscriber(&registry, 1, &[&user_group(1)]).await;

        let delivered = router
            .publish(
                EventType::NotificationMessage,
                Audience::Users(vec![99]),
                json!({"text": "hi"}),
            )
            .await;
        assert_eq!(delivered, 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_with_multiple_connections_receives_on_each() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        // Same user, two tabs.
        let mut rx_a = subscriber(&registry, 7, &[&user_group(7)]).await;
        let mut rx_b = subscriber(&registry, 7, &[&user_group(7)]).await;

        let delivered = router
            .publish(
                EventType::NotificationMessage,
                Audience::user(7),
                json!({"text": "hi"}),
            )
            .await;
        assert_eq!(delivered, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn empty_payload_is_suppressed() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx = subscriber(&registry, 1, &[BROADCAST_GROUP]).await;

        assert_eq!(
            router
                .publish(EventType::PostDelete, Audience::Public, json!({}))
                .await,
            0
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_object_payload_is_suppressed() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx = subscriber(&registry, 1, &[BROADCAST_GROUP]).await;

        for payload in [json!(null), json!("text"), json!(42), json!([1, 2])] {
            assert_eq!(
                router
                    .publish(EventType::PostUpdate, Audience::Public, payload)
                    .await,
                0
            );
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_audience_is_suppressed() {
        let registry = Arc::new(Registry::new());
        let router = EventRouter::new(registry.clone());
        let mut rx = subscriber(&registry, 1, &[BROADCAST_GROUP, &user_group(1)]).await;

        assert_eq!(
            router
                .publish(
                    EventType::FriendRequest,
                    Audience::Users(Vec::new()),
                    json!({"from": 2}),
                )
                .await,
            0
        );
        assert!(rx.try_recv().is_err());
    }
}
