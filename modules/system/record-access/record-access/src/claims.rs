//! Extraction of identity-provider claims from forwarded request headers.

use http::HeaderMap;
use record_access_sdk::IdentityClaims;

use crate::config::OidcHeaders;

/// Builds [`IdentityClaims`] from the headers an authenticating proxy
/// forwards.
pub trait ClaimsFromHeaders: Sized {
    /// Returns `None` when none of the configured headers carries a value.
    fn from_headers(headers: &HeaderMap, names: &OidcHeaders) -> Option<Self>;
}

impl ClaimsFromHeaders for IdentityClaims {
    fn from_headers(headers: &HeaderMap, names: &OidcHeaders) -> Option<Self> {
        let groups = header_value(headers, &names.group_header)
            .map(|raw| split_groups(&raw, &names.group_separator))
            .unwrap_or_default();

        let claims = IdentityClaims {
            username: header_value(headers, &names.username_header),
            name: header_value(headers, &names.name_header),
            email: header_value(headers, &names.email_header),
            groups,
        };

        let empty = claims.username.is_none()
            && claims.name.is_none()
            && claims.email.is_none()
            && claims.groups.is_empty();
        (!empty).then_some(claims)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let value = headers.get(name)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn split_groups(raw: &str, separator: &str) -> Vec<String> {
    let parts: Vec<&str> = if separator.is_empty() {
        vec![raw]
    } else {
        raw.split(separator).collect()
    };
    let mut groups: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
        if !groups.iter().any(|g| g == part) {
            groups.push(part.to_owned());
        }
    }
    groups
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn names_with_groups() -> OidcHeaders {
        OidcHeaders {
            group_header: "Groups".to_owned(),
            ..OidcHeaders::default()
        }
    }

    #[test]
    fn reads_configured_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("sub", HeaderValue::from_static("alice"));
        headers.insert("mail", HeaderValue::from_static("alice@example.com"));
        headers.insert("groups", HeaderValue::from_static("admins, finance ,,admins"));

        let claims = IdentityClaims::from_headers(&headers, &names_with_groups()).unwrap();
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.name, None);
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.groups, ["admins", "finance"]);
    }

    #[test]
    fn group_header_disabled_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("groups", HeaderValue::from_static("admins"));
        assert!(IdentityClaims::from_headers(&headers, &OidcHeaders::default()).is_none());
    }

    #[test]
    fn blank_headers_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("sub", HeaderValue::from_static("   "));
        headers.insert("name", HeaderValue::from_static("Alice"));

        let claims = IdentityClaims::from_headers(&headers, &OidcHeaders::default()).unwrap();
        assert_eq!(claims.username, None);
        assert_eq!(claims.name.as_deref(), Some("Alice"));
    }
}
