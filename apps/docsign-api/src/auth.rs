//! Caller identity from request headers
//!
//! Identity is asserted by the fronting proxy: `X-User-Email` is required,
//! `X-User-Name` defaults to the email. The audit address is the first
//! `X-Forwarded-For` hop, then the socket peer.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use docsign_core::http::{FORWARDED_FOR_HEADER, USER_EMAIL_HEADER, USER_NAME_HEADER};
use docsign_core::AuthContext;

use crate::error::ApiError;

/// Extractor yielding the caller's [`AuthContext`]
#[derive(Debug, Clone)]
pub struct Caller(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        caller_from_headers(&parts.headers, peer).map(Caller)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn caller_from_headers(headers: &HeaderMap, peer: Option<String>) -> Result<AuthContext, ApiError> {
    let email = header_str(headers, USER_EMAIL_HEADER).ok_or(ApiError::Unauthorized)?;
    let name = header_str(headers, USER_NAME_HEADER).unwrap_or(email);

    let mut auth = AuthContext::new(email, name);

    let forwarded = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    if let Some(ip) = forwarded.or(peer) {
        auth = auth.with_client_ip(ip);
    }

    if let Some(token) = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        auth = auth.with_bearer_token(token.trim());
    }

    Ok(auth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_email_is_required() {
        let result = caller_from_headers(&headers(&[("x-user-name", "Ada")]), None);
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_name_defaults_to_email() {
        let auth = caller_from_headers(&headers(&[("x-user-email", "ada@example.com")]), None)
            .unwrap();
        assert_eq!(auth.user_name, "ada@example.com");
        assert_eq!(auth.client_ip, None);
    }

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let auth = caller_from_headers(
            &headers(&[
                ("x-user-email", "ada@example.com"),
                ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ]),
            Some("127.0.0.1".to_string()),
        )
        .unwrap();
        assert_eq!(auth.client_ip.as_deref(), Some("203.0.113.7"));

        let auth = caller_from_headers(
            &headers(&[("x-user-email", "ada@example.com")]),
            Some("127.0.0.1".to_string()),
        )
        .unwrap();
        assert_eq!(auth.client_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_bearer_token() {
        let auth = caller_from_headers(
            &headers(&[
                ("x-user-email", "ada@example.com"),
                ("authorization", "Bearer abc123"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(auth.bearer_token.as_deref(), Some("abc123"));
    }
}
