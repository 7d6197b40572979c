//! Origin gatekeeping for the WebSocket upgrade handshake.
//!
//! Before any authentication work runs, the declared `Origin` of an upgrade
//! request is checked against a configured allow-list. A rejected request is
//! closed immediately with no partial registration; the gatekeeper itself
//! holds no state beyond the list it was built from.

use tracing::debug;

/// Decides whether an upgrade request's origin is acceptable.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    /// Allowed origins, normalized without a trailing slash. Empty means
    /// allow any origin (development mode only).
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Creates a policy from an allow-list of origins.
    #[must_use]
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Creates a policy that permits every origin, including requests with
    /// no `Origin` header. Used only when auth is disabled for development.
    #[must_use]
    pub fn allow_any() -> Self {
        Self { allowed: Vec::new() }
    }

    /// Returns `true` if a connection with the given declared origin may
    /// proceed to authentication.
    ///
    /// A missing `Origin` header is rejected unless the policy allows any
    /// origin: non-browser callers have no business on this endpoint.
    #[must_use]
    pub fn permits(&self, origin: Option<&str>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }

        match origin {
            Some(origin) => {
                let origin = origin.trim_end_matches('/');
                let permitted = self.allowed.iter().any(|allowed| allowed == origin);
                if !permitted {
                    debug!(origin, "origin not on allow-list");
                }
                permitted
            }
            None => {
                debug!("upgrade request without Origin header");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OriginPolicy {
        OriginPolicy::new(vec![
            "https://app.example.com".to_string(),
            "https://staging.example.com".to_string(),
        ])
    }

    #[test]
    fn permits_listed_origin() {
        assert!(policy().permits(Some("https://app.example.com")));
        assert!(policy().permits(Some("https://staging.example.com")));
    }

    #[test]
    fn rejects_unlisted_origin() {
        assert!(!policy().permits(Some("https://evil.example.com")));
    }

    #[test]
    fn rejects_missing_origin() {
        assert!(!policy().permits(None));
    }

    #[test]
    fn rejects_scheme_mismatch() {
        assert!(!policy().permits(Some("http://app.example.com")));
    }

    #[test]
    fn rejects_prefix_and_suffix_lookalikes() {
        assert!(!policy().permits(Some("https://app.example.com.evil.net")));
        assert!(!policy().permits(Some("https://xapp.example.com")));
    }

    #[test]
    fn trailing_slash_is_normalized_on_both_sides() {
        let policy = OriginPolicy::new(vec!["https://app.example.com/".to_string()]);
        assert!(policy.permits(Some("https://app.example.com")));
        assert!(policy.permits(Some("https://app.example.com/")));
    }

    #[test]
    fn allow_any_permits_everything() {
        let policy = OriginPolicy::allow_any();
        assert!(policy.permits(Some("https://anything.example")));
        assert!(policy.permits(None));
    }
}
