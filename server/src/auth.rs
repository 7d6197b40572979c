//! Authentication module for access token resolution.
//!
//! Connections authenticate out-of-band during the WebSocket upgrade: the
//! browser sends its `access_token` cookie with the handshake request, and
//! the server validates it as an HS256 JWT before the socket is accepted.
//! This runs independently of the HTTP request/response cycle used by the
//! CRUD layer.
//!
//! # Resolution Contract
//!
//! Resolution never fails loudly. A missing, malformed, or expired token all
//! resolve to [`AuthOutcome::Anonymous`]; the connection handler decides what
//! to do with an anonymous caller (for this server: reject before upgrade).
//!
//! # Example
//!
//! ```rust
//! use pulse_server::auth::{Authenticator, AuthOutcome};
//!
//! let authenticator = Authenticator::new(b"secret");
//!
//! // No cookie header at all resolves to anonymous, never an error.
//! assert!(authenticator.resolve(None).is_anonymous());
//! ```

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::UserId;

/// Name of the cookie carrying the bearer token.
const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Claims expected inside an access token.
///
/// Matches the tokens minted by the account service: the numeric user id
/// plus the standard expiry claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric id of the authenticated user.
    pub user_id: UserId,

    /// Expiry as a Unix timestamp; validated during decode.
    pub exp: i64,
}

/// Result of resolving the handshake credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The token was present and valid.
    Identity(UserId),

    /// No usable credential was found. Downstream decides whether anonymous
    /// is acceptable; for this server it is not.
    Anonymous,
}

impl AuthOutcome {
    /// Returns the authenticated user id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Identity(user_id) => Some(*user_id),
            Self::Anonymous => None,
        }
    }

    /// Returns `true` if no identity was resolved.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Validates access tokens carried in upgrade-handshake cookies.
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    /// Creates an authenticator for the given HS256 secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Resolves the identity carried by a `Cookie` header, if any.
    ///
    /// Scans the semicolon-delimited cookie string for the `access_token`
    /// key and validates its value. Every failure mode resolves to
    /// [`AuthOutcome::Anonymous`]; the reason is logged for operators.
    #[must_use]
    pub fn resolve(&self, cookie_header: Option<&str>) -> AuthOutcome {
        let Some(token) = cookie_header.and_then(token_from_cookies) else {
            debug!("no access token in handshake cookies");
            return AuthOutcome::Anonymous;
        };

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => AuthOutcome::Identity(data.claims.user_id),
            Err(err) => {
                debug!(error = %err, "access token rejected");
                AuthOutcome::Anonymous
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

/// Extracts the access token value from a semicolon-delimited cookie string.
///
/// Returns `None` if the cookie is absent or has an empty value.
fn token_from_cookies(cookie_header: &str) -> Option<&str> {
    for part in cookie_header.split(';') {
        // Parts without an `=` (stray attributes, trailing semicolons) are
        // skipped, not treated as the end of the cookie string.
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        if name.trim() == ACCESS_TOKEN_COOKIE && !value.is_empty() {
            return Some(value);
        }
    }
    None
}
