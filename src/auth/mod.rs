//! Caller identity.
//!
//! Sessions are issued by an external identity provider. Requests carry the
//! resulting user id either as `Authorization: Bearer <user id>` or in the
//! `marketlens_session` cookie; the bearer header wins when both are present.

use axum::http::{header, HeaderMap};


/// Cookie holding the session user id for browser navigations (OAuth start).
pub const SESSION_COOKIE: &str = "marketlens_session";

/// Resolves the authenticated user of a request.
pub fn authenticated_user(headers: &HeaderMap) -> Result<String, AuthError> {
    match extract_bearer_token(headers) {
        Ok(token) => Ok(token),
        Err(AuthError::Missing) => read_cookie(headers, SESSION_COOKIE)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::Missing),
        Err(e) => Err(e),
    }
}

/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

/// Returns the value of a cookie from the `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

fn parse_bearer_token(header_value: &str) -> Result<String, AuthError> {
    let (scheme, token) = header_value
        .split_once(' ')
        .ok_or(AuthError::InvalidFormat)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Empty);
    }

    Ok(token.to_string())
}

/// Identity extraction errors
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum AuthError {
    /// Neither an Authorization header nor a session cookie
    #[error("Authorization token not provided")]
    Missing,
    /// Not "Bearer <token>"
    #[error("Invalid authorization token format")]
    InvalidFormat,
    #[error("Authorization token is empty")]
    Empty,
}
