//! Per-connection lifecycle for accepted WebSocket clients.
//!
//! A connection arrives here only after the origin gate and authentication
//! have passed, so the handler's job is membership and delivery: register
//! the connection, join the global broadcast group and the user's personal
//! group, then pump events out until the client goes away.
//!
//! # Lifecycle
//!
//! 1. Register with the [`Registry`] and join `events_broadcast` plus
//!    `user_<id>`.
//! 2. Spawn a forwarding task that drains the connection's event channel,
//!    serializes each event, and writes it to the socket. Events are
//!    delivered in the order they were published.
//! 3. Read inbound frames until a close frame or transport error. Clients
//!    have nothing meaningful to say on this socket; inbound text is logged
//!    and dropped without affecting the connection.
//! 4. On exit, abort the forwarder and deregister. Deregistration runs
//!    exactly once per connection regardless of which side closed first,
//!    and is safe to repeat.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::registry::Registry;
use crate::types::{user_group, UserId, BROADCAST_GROUP};

/// Drives an accepted WebSocket connection until it closes.
pub async fn serve_connection(socket: WebSocket, registry: Arc<Registry>, user_id: UserId) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let connection_id = registry.register(user_id, event_tx).await;
    registry.join(connection_id, BROADCAST_GROUP).await;
    registry.join(connection_id, &user_group(user_id)).await;

    info!(connection_id = %connection_id, user_id, "websocket client connected");

    let (mut sink, mut stream) = socket.split();

    // Forward events from the registry to the client, preserving publish
    // order. The channel closes when the registry drops this connection's
    // sender, which also ends the task.
    let forward_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    trace!(event_type = %event.event_type, "sending event to client");
                    if let Err(err) = sink.send(Message::Text(json.into())).await {
                        debug!(error = %err, "failed to send event to client");
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "failed to serialize event");
                }
            }
        }
    });

    // Drain inbound frames until the client leaves. This socket is
    // server-push only; client frames carry no commands.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!(connection_id = %connection_id, "client sent close frame");
                break;
            }
            Ok(Message::Ping(data)) => {
                // axum replies with a pong automatically.
                trace!(data_len = data.len(), "received ping");
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(payload) => {
                    debug!(connection_id = %connection_id, %payload, "ignoring inbound client frame");
                }
                Err(err) => {
                    debug!(
                        connection_id = %connection_id,
                        error = %err,
                        "dropping unparseable client frame"
                    );
                }
            },
            Ok(_) => {}
            Err(err) => {
                debug!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forward_task.abort();
    registry.remove_connection(connection_id).await;
    info!(connection_id = %connection_id, user_id, "websocket client disconnected");
}
