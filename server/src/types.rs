//! Shared event types for the Pulse server.
//!
//! This module defines the data that flows from producers (the CRUD layer)
//! through the event router to connected WebSocket clients. Events are
//! immutable once created and are never persisted by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of an authenticated user, as carried in the access token.
pub type UserId = u64;

/// Name of the global broadcast group every authenticated connection joins.
pub const BROADCAST_GROUP: &str = "events_broadcast";

/// Returns the personal group name for a user.
///
/// Personal groups are derived deterministically from the user id so that
/// producers and connection handlers always agree on the name.
///
/// # Example
///
/// ```
/// use pulse_server::types::user_group;
///
/// assert_eq!(user_group(42), "user_42");
/// ```
#[must_use]
pub fn user_group(user_id: UserId) -> String {
    format!("user_{user_id}")
}

/// The type of domain event being relayed.
///
/// The serialized form of each variant is the `type` field of the outbound
/// wire envelope, so these strings are part of the contract frontends rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PostCreate,
    PostUpdate,
    PostDelete,
    NotificationMessage,
    NotificationDelete,
    FriendRequest,
}

impl EventType {
    /// Returns the wire-format string for this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCreate => "post_create",
            Self::PostUpdate => "post_update",
            Self::PostDelete => "post_delete",
            Self::NotificationMessage => "notification_message",
            Self::NotificationDelete => "notification_delete",
            Self::FriendRequest => "friend_request",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which connections an event is intended for.
///
/// Producers select the audience when calling
/// [`publish`](crate::publish::EventRouter::publish); the router translates it
/// into group names. The audience is never forwarded to subscribers. In the
/// publish request body it appears as `"public"` or `{"users": [ids]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every connection in the global broadcast group.
    Public,

    /// Only the personal groups of the listed users (friends-only content,
    /// personal notifications). Callers list every recipient explicitly;
    /// the author is not added implicitly.
    Users(Vec<UserId>),
}

impl Audience {
    /// Convenience constructor for a single-recipient audience.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::Users(vec![user_id])
    }
}

/// An event as delivered to clients.
///
/// The serialized form is exactly the two-field envelope consumers rely on:
///
/// ```json
/// { "type": "post_create", "data": { "id": 1 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The domain event tag (`type` on the wire).
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Producer-supplied structured payload, forwarded unmodified.
    pub data: Value,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self { event_type, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventType::PostCreate).unwrap(),
            r#""post_create""#
        );
        assert_eq!(
            serde_json::to_string(&EventType::PostUpdate).unwrap(),
            r#""post_update""#
        );
        assert_eq!(
            serde_json::to_string(&EventType::PostDelete).unwrap(),
            r#""post_delete""#
        );
        assert_eq!(
            serde_json::to_string(&EventType::NotificationMessage).unwrap(),
            r#""notification_message""#
        );
        assert_eq!(
            serde_json::to_string(&EventType::NotificationDelete).unwrap(),
            r#""notification_delete""#
        );
        assert_eq!(
            serde_json::to_string(&EventType::FriendRequest).unwrap(),
            r#""friend_request""#
        );
    }

    #[test]
    fn event_type_as_str_matches_serde_form() {
        for event_type in [
            EventType::PostCreate,
            EventType::PostUpdate,
            EventType::PostDelete,
            EventType::NotificationMessage,
            EventType::NotificationDelete,
            EventType::FriendRequest,
        ] {
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
            assert_eq!(event_type.to_string(), event_type.as_str());
        }
    }

    #[test]
    fn event_serializes_to_two_field_envelope() {
        let event = Event::new(EventType::PostCreate, json!({"id": 1}));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value, json!({"type": "post_create", "data": {"id": 1}}));
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn event_deserializes_from_envelope() {
        let event: Event =
            serde_json::from_str(r#"{"type":"notification_message","data":{"id":5}}"#).unwrap();
        assert_eq!(event.event_type, EventType::NotificationMessage);
        assert_eq!(event.data, json!({"id": 5}));
    }

    #[test]
    fn user_group_is_deterministic() {
        assert_eq!(user_group(7), "user_7");
        assert_eq!(user_group(7), user_group(7));
        assert_ne!(user_group(7), user_group(9));
    }

    #[test]
    fn audience_user_builds_single_recipient() {
        assert_eq!(Audience::user(42), Audience::Users(vec![42]));
    }

    #[test]
    fn audience_deserializes_from_request_forms() {
        assert_eq!(
            serde_json::from_str::<Audience>(r#""public""#).unwrap(),
            Audience::Public
        );
        assert_eq!(
            serde_json::from_str::<Audience>(r#"{"users":[1,3]}"#).unwrap(),
            Audience::Users(vec![1, 3])
        );
    }

    #[test]
    fn broadcast_group_does_not_collide_with_personal_groups() {
        assert!(!BROADCAST_GROUP.starts_with("user_"));
    }
}
