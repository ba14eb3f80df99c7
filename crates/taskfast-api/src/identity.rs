//! Caller identity resolution.
//!
//! The `x-user-email` header wins over any identity named in the body or
//! query string; with neither, the caller is the anonymous sentinel owner.

use axum::http::HeaderMap;
use serde::Deserialize;

use taskfast_core::types::Owner;

pub const IDENTITY_HEADER: &str = "x-user-email";

/// Identity fields a body or query string may carry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityParams {
    pub user_email: Option<String>,
    pub owner: Option<String>,
}

impl IdentityParams {
    fn named(&self) -> Option<&str> {
        [self.user_email.as_deref(), self.owner.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

fn header_identity(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The explicitly supplied identity, if any.
pub fn explicit_identity(headers: &HeaderMap, params: &IdentityParams) -> Option<Owner> {
    header_identity(headers)
        .or_else(|| params.named())
        .map(|id| Owner::resolve(Some(id)))
}

/// The caller's owner, falling back to the sentinel.
pub fn resolve_owner(headers: &HeaderMap, params: &IdentityParams) -> Owner {
    explicit_identity(headers, params).unwrap_or_else(Owner::anonymous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(email: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_str(email).unwrap());
        headers
    }

    fn params(user_email: Option<&str>, owner: Option<&str>) -> IdentityParams {
        IdentityParams {
            user_email: user_email.map(String::from),
            owner: owner.map(String::from),
        }
    }

    #[test]
    fn test_header_takes_precedence() {
        let owner = resolve_owner(&headers("ada@example.com"), &params(Some("bob@example.com"), None));
        assert_eq!(owner.as_str(), "ada@example.com");
    }

    #[test]
    fn test_body_identity_used_without_header() {
        let owner = resolve_owner(&HeaderMap::new(), &params(Some("bob@example.com"), Some("x")));
        assert_eq!(owner.as_str(), "bob@example.com");
        let owner = resolve_owner(&HeaderMap::new(), &params(Some("  "), Some("carol")));
        assert_eq!(owner.as_str(), "carol");
    }

    #[test]
    fn test_blank_header_falls_through() {
        let owner = resolve_owner(&headers("  "), &params(None, Some("carol")));
        assert_eq!(owner.as_str(), "carol");
    }

    #[test]
    fn test_no_identity_is_anonymous() {
        assert!(resolve_owner(&HeaderMap::new(), &IdentityParams::default()).is_anonymous());
        assert!(explicit_identity(&HeaderMap::new(), &IdentityParams::default()).is_none());
    }
}
