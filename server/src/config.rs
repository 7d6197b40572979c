//! Server configuration module.
//!
//! Parses configuration from environment variables for the Pulse server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PULSE_ALLOWED_ORIGINS` | Yes* | - | Comma-separated origin allow-list |
//! | `PULSE_JWT_SECRET` | Yes* | - | HS256 secret for access token validation |
//! | `PULSE_PUBLISH_TOKEN` | Yes* | - | Bearer token for the publish endpoint |
//! | `PORT` | No | 8080 | HTTP server port |
//! | `PULSE_UNSAFE_NO_AUTH` | No | false | Disable origin and auth checks (dev only) |
//!
//! *Not required if `PULSE_UNSAFE_NO_AUTH=true`

use std::env;

use tracing::warn;

use crate::error::ConfigError;

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Origins allowed to open WebSocket connections.
    pub allowed_origins: Vec<String>,

    /// HS256 secret used to validate `access_token` cookies.
    pub jwt_secret: Option<String>,

    /// Bearer token backend services must present to publish events.
    pub publish_token: Option<String>,

    /// HTTP server port.
    pub port: u16,

    /// When true, disables origin and authentication checks (development only).
    pub unsafe_no_auth: bool,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing (when `PULSE_UNSAFE_NO_AUTH` is not true)
    /// - Environment variables have invalid format
    /// - Port number is not a valid u16
    pub fn from_env() -> Result<Self, ConfigError> {
        let unsafe_no_auth = parse_bool_env("PULSE_UNSAFE_NO_AUTH");
        let port = parse_port()?;
        let allowed_origins = parse_allowed_origins()?;
        let jwt_secret = env::var("PULSE_JWT_SECRET").ok().filter(|s| !s.is_empty());
        let publish_token = env::var("PULSE_PUBLISH_TOKEN")
            .ok()
            .filter(|s| !s.is_empty());

        let config = Self {
            allowed_origins,
            jwt_secret,
            publish_token,
            port,
            unsafe_no_auth,
        };

        config.validate()?;

        if config.unsafe_no_auth {
            warn!(
                "PULSE_UNSAFE_NO_AUTH is enabled - origin and auth checks are disabled. \
                 Do not use in production!"
            );
        }

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Ensures that either `unsafe_no_auth` is true, or the origin
    /// allow-list, the JWT secret, and the publish token are all configured.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.unsafe_no_auth {
            return Ok(());
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::missing("PULSE_ALLOWED_ORIGINS"));
        }

        if self.jwt_secret.is_none() {
            return Err(ConfigError::missing("PULSE_JWT_SECRET"));
        }

        if self.publish_token.is_none() {
            return Err(ConfigError::missing("PULSE_PUBLISH_TOKEN"));
        }

        Ok(())
    }
}

/// Parse a boolean environment variable.
///
/// Returns `true` if the variable is set to "true" (case-insensitive),
/// `false` otherwise.
fn parse_bool_env(name: &str) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => port_str
            .parse()
            .map_err(|_| ConfigError::invalid("PORT", format!("'{port_str}' is not a valid port"))),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::invalid(
            "PORT",
            "contains invalid unicode".to_string(),
        )),
    }
}

/// Parse the PULSE_ALLOWED_ORIGINS environment variable.
///
/// Expected format: `https://app.example.com,https://staging.example.com`.
/// Entries are trimmed; empty entries are rejected rather than silently
/// widening the allow-list.
fn parse_allowed_origins() -> Result<Vec<String>, ConfigError> {
    let origins_str = match env::var("PULSE_ALLOWED_ORIGINS") {
        Ok(s) if !s.is_empty() => s,
        _ => return Ok(Vec::new()),
    };

    let mut origins = Vec::new();

    for entry in origins_str.split(',') {
        let origin = entry.trim();
        if origin.is_empty() {
            return Err(ConfigError::invalid(
                "PULSE_ALLOWED_ORIGINS",
                "origin entries cannot be empty",
            ));
        }
        origins.push(origin.trim_end_matches('/').to_string());
    }

    Ok(origins)
}
