//! HTTP route handlers for the Pulse server.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `POST /publish` - Publish an event from a backend service
//! - `GET /ws` - WebSocket subscription endpoint for browsers
//! - `GET /health` - Health check endpoint
//!
//! # Architecture
//!
//! All routes share application state through [`AppState`], which contains
//! the configuration, the connection registry, the event router built over
//! it, and the server start time for uptime reporting. The origin policy and
//! token authenticator are derived from the configuration once at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_server::routes::{create_router, AppState};
//! use pulse_server::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let state = AppState::new(config);
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::ws::rejection::WebSocketUpgradeRejection,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::connection::serve_connection;
use crate::error::ServerError;
use crate::gatekeeper::OriginPolicy;
use crate::publish::EventRouter;
use crate::registry::Registry;
use crate::types::{Audience, EventType, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Maximum body size for publish requests (1 MB).
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Identity assigned to connections when auth checks are disabled and no
/// usable token is present (development only).
const DEV_FALLBACK_USER_ID: UserId = 0;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
///
/// Cloned per request; the heavyweight pieces live behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// Connection registry shared by the handlers and the publisher.
    pub registry: Arc<Registry>,

    /// Event router over the registry.
    pub publisher: EventRouter,

    /// Origin allow-list policy for the upgrade handshake.
    origin_policy: OriginPolicy,

    /// Access-token validator; `None` only when auth is disabled.
    authenticator: Option<Arc<Authenticator>>,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates application state with a fresh registry.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Arc::new(Registry::new()))
    }

    /// Creates application state over an existing registry.
    ///
    /// Useful for tests and for embedding the server next to in-process
    /// producers that hold their own [`EventRouter`].
    #[must_use]
    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        let origin_policy = if config.unsafe_no_auth {
            OriginPolicy::allow_any()
        } else {
            OriginPolicy::new(config.allowed_origins.clone())
        };

        let authenticator = config
            .jwt_secret
            .as_ref()
            .map(|secret| Arc::new(Authenticator::new(secret.as_bytes())));

        Self {
            config: Arc::new(config),
            publisher: EventRouter::new(registry.clone()),
            registry,
            origin_policy,
            authenticator,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("origin_policy", &self.origin_policy)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
///
/// Cross-origin access to the HTTP endpoints follows the same allow-list as
/// the WebSocket handshake; with `unsafe_no_auth` any origin is accepted.
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.unsafe_no_auth {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/publish", post(post_publish))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .route("/ws", get(get_ws))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Error Response Types
// ============================================================================

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Origin(_) => (StatusCode::FORBIDDEN, "origin_forbidden"),
            ServerError::Auth(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_format"),
            ServerError::Config(_) | ServerError::WebSocket(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Server-side detail stays in logs; clients get the category only.
        let message = if self.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(message).with_code(code))).into_response()
    }
}

// ============================================================================
// POST /publish - Event Publishing
// ============================================================================

/// Request body for the publish endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct PublishRequest {
    event_type: EventType,
    audience: Audience,
    data: Value,
}

/// Response body for an accepted publish.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Number of connections the event reached.
    pub delivered: usize,
}

/// POST /publish - Publish an event to connected clients.
///
/// # Authentication
///
/// Unless `unsafe_no_auth` is enabled, requests must carry
/// `Authorization: Bearer <token>` matching the configured publish token.
///
/// # Responses
///
/// - `202 Accepted` - Event routed; body reports the delivery count. A
///   suppressed publish (empty payload or empty audience) still answers 202
///   with a count of 0: suppression is a producer bug surfaced in logs, not
///   a client-visible failure.
/// - `400 Bad Request` - Body is not a valid publish request
/// - `401 Unauthorized` - Missing or invalid bearer token
async fn post_publish(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.config.unsafe_no_auth {
        let expected = match &state.config.publish_token {
            Some(token) => token.as_str(),
            None => {
                error!("publish token not configured but auth is enabled");
                return ServerError::internal("publish token not configured").into_response();
            }
        };

        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(token) if token == expected => {}
            Some(_) => {
                debug!("publish request with invalid bearer token");
                return ServerError::auth("invalid token").into_response();
            }
            None => {
                debug!("publish request without bearer token");
                return ServerError::auth("missing bearer token").into_response();
            }
        }
    }

    let request: PublishRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "failed to parse publish request");
            return ServerError::validation(format!("invalid publish request: {err}"))
                .into_response();
        }
    };

    let delivered = state
        .publisher
        .publish(request.event_type, request.audience, request.data)
        .await;

    (StatusCode::ACCEPTED, Json(PublishResponse { delivered })).into_response()
}

// ============================================================================
// GET /ws - WebSocket Subscription
// ============================================================================

/// GET /ws - WebSocket subscription endpoint.
///
/// # Handshake
///
/// The upgrade request must carry an allow-listed `Origin` header and a
/// valid `access_token` cookie. Both checks run before the protocol switch,
/// so a rejected client never registers anything. With `unsafe_no_auth`
/// both checks are skipped and tokenless connections get a fallback
/// identity.
///
/// # Responses
///
/// - `101 Switching Protocols` - WebSocket upgrade successful
/// - `401 Unauthorized` - Missing, malformed, or expired access token
/// - `403 Forbidden` - Origin not on the allow-list
///
/// Origin and auth checks run before the upgrade itself is validated, so a
/// disallowed caller gets the same rejection whether or not it speaks the
/// WebSocket protocol.
async fn get_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.origin_policy.permits(origin) {
        warn!(origin = origin.unwrap_or("<none>"), "rejected upgrade from disallowed origin");
        return ServerError::origin(origin.unwrap_or("missing Origin header")).into_response();
    }

    let cookie_header = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    let resolved = state
        .authenticator
        .as_ref()
        .map(|authenticator| authenticator.resolve(cookie_header))
        .and_then(|outcome| outcome.user_id());

    let user_id = match resolved {
        Some(user_id) => user_id,
        None if state.config.unsafe_no_auth => DEV_FALLBACK_USER_ID,
        None => {
            debug!("rejected upgrade without valid access token");
            return ServerError::auth("authentication required").into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(user_id, "websocket client connecting");
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, registry, user_id))
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Number of active WebSocket connections.
    pub connections: usize,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint.
///
/// Returns server health status and statistics. No authentication required.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed();

    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.registry.connection_count(),
        uptime_seconds: uptime.as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================
