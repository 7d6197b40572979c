//! Error types for the Pulse server.
//!
//! This module defines the error hierarchy used throughout the server.
//! Only handshake-stage failures ([`ServerError::Origin`] and
//! [`ServerError::Auth`]) are ever visible to a connecting client; everything
//! after the upgrade is operator-visible through logs only, so that one
//! subscriber's failure never leaks to another.

use std::error::Error;
use std::fmt;

use thiserror::Error as ThisError;

/// Errors that occur during configuration loading and validation.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration value is missing.
    #[error("missing required configuration: {0}")]
    Missing(String),

    /// A configuration value failed to parse or is invalid.
    #[error("invalid configuration value for '{key}': {reason}")]
    Invalid {
        /// The configuration key that has an invalid value.
        key: String,
        /// Description of why the value is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a new missing configuration error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing(key.into())
    }

    /// Creates a new invalid configuration error.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for the Pulse server.
///
/// # Error Categories
///
/// - **Configuration errors**: problems loading or validating server config
/// - **Origin errors**: the upgrade request came from a disallowed origin
/// - **Authentication errors**: missing, malformed, or expired credentials
/// - **Validation errors**: malformed publish requests
/// - **WebSocket errors**: connection issues with clients
/// - **Internal errors**: unexpected failures that don't fit other categories
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error during server initialization.
    Config(ConfigError),

    /// The declared origin of an upgrade request is not on the allow-list.
    Origin(String),

    /// Authentication failure during the upgrade handshake.
    Auth(String),

    /// Publish request validation failure (empty or malformed payload).
    Validation(String),

    /// WebSocket connection or protocol error.
    WebSocket(String),

    /// Unexpected internal server error.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Origin(msg) => write!(f, "origin not allowed: {msg}"),
            Self::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::WebSocket(msg) => write!(f, "websocket error: {msg}"),
            Self::Internal(msg) => write!(f, "internal server error: {msg}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl ServerError {
    /// Creates a new origin error.
    pub fn origin(message: impl Into<String>) -> Self {
        Self::Origin(message.into())
    }

    /// Creates a new authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a new WebSocket error.
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket(message.into())
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` if this error indicates a client-side problem.
    ///
    /// Client errors are those where the connecting client made an invalid
    /// request, as opposed to server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Origin(_) | Self::Auth(_) | Self::Validation(_)
        )
    }

    /// Returns `true` if this error indicates a server-side problem.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Config(_))
    }
}

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_displays_correctly() {
        let err = ConfigError::missing("PULSE_JWT_SECRET");
        assert_eq!(
            err.to_string(),
            "missing required configuration: PULSE_JWT_SECRET"
        );
    }

    #[test]
    fn config_error_invalid_displays_correctly() {
        let err = ConfigError::invalid("port", "must be a positive integer");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for 'port': must be a positive integer"
        );
    }

    #[test]
    fn server_error_config_displays_correctly() {
        let err = ServerError::Config(ConfigError::missing("PULSE_ALLOWED_ORIGINS"));
        assert_eq!(
            err.to_string(),
            "configuration error: missing required configuration: PULSE_ALLOWED_ORIGINS"
        );
    }

    #[test]
    fn server_error_origin_displays_correctly() {
        let err = ServerError::origin("https://evil.example");
        assert_eq!(err.to_string(), "origin not allowed: https://evil.example");
    }

    #[test]
    fn server_error_auth_displays_correctly() {
        let err = ServerError::auth("expired token");
        assert_eq!(err.to_string(), "authentication failed: expired token");
    }

    #[test]
    fn server_error_validation_displays_correctly() {
        let err = ServerError::validation("payload must be a non-empty object");
        assert_eq!(
            err.to_string(),
            "validation error: payload must be a non-empty object"
        );
    }

    #[test]
    fn server_error_websocket_displays_correctly() {
        let err = ServerError::websocket("connection closed unexpectedly");
        assert_eq!(
            err.to_string(),
            "websocket error: connection closed unexpectedly"
        );
    }

    #[test]
    fn server_error_internal_displays_correctly() {
        let err = ServerError::internal("registry lock poisoned");
        assert_eq!(err.to_string(), "internal server error: registry lock poisoned");
    }

    #[test]
    fn config_error_converts_to_server_error() {
        fn inner() -> Result<()> {
            Err(ConfigError::missing("KEY"))?;
            Ok(())
        }

        let result = inner();
        assert!(matches!(result.unwrap_err(), ServerError::Config(_)));
    }

    #[test]
    fn is_client_error_covers_handshake_and_validation() {
        assert!(ServerError::origin("bad").is_client_error());
        assert!(ServerError::auth("bad token").is_client_error());
        assert!(ServerError::validation("bad input").is_client_error());
        assert!(!ServerError::internal("oops").is_client_error());
        assert!(!ServerError::websocket("lost").is_client_error());
    }

    #[test]
    fn is_server_error_covers_internal_and_config() {
        assert!(ServerError::internal("oops").is_server_error());
        assert!(ServerError::Config(ConfigError::missing("X")).is_server_error());
        assert!(!ServerError::auth("bad token").is_server_error());
    }

    #[test]
    fn server_error_source_returns_config_error() {
        let err = ServerError::Config(ConfigError::missing("KEY"));
        assert!(err.source().is_some());
        assert!(ServerError::auth("x").source().is_none());
    }
}
