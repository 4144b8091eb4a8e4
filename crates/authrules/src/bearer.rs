//! Bearer token extraction from HTTP headers and gRPC metadata.

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderName};
use jwtauth::AuthError;
use tonic::metadata::MetadataMap;

const BEARER_PREFIX: &str = "bearer ";

/// Strip a case-insensitive `Bearer ` prefix. The token must be non-empty.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    value
        .get(BEARER_PREFIX.len()..)
        .filter(|token| !token.is_empty())
}

fn missing() -> AuthError {
    AuthError::invalid_token("no Authorization header containing bearer token")
}

/// Bearer token from the `Authorization` header.
///
/// # Errors
///
/// Returns `InvalidToken` if the header is absent, not ASCII, or not a
/// non-empty bearer credential.
pub fn from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    from_header_list(headers, std::slice::from_ref(&AUTHORIZATION))
}

/// Bearer token from the first of `names` carrying a bearer credential.
///
/// Headers are tried in order; a header holding some other scheme is
/// skipped.
///
/// # Errors
///
/// Returns `InvalidToken` if none of the headers holds a bearer token.
pub fn from_header_list<'a>(
    headers: &'a HeaderMap,
    names: &[HeaderName],
) -> Result<&'a str, AuthError> {
    names
        .iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_bearer)
        .ok_or_else(|| {
            tracing::debug!(target: "authrules.bearer", "Missing or malformed bearer header");
            missing()
        })
}

/// Bearer token from the `authorization` gRPC metadata entry.
///
/// # Errors
///
/// Same rules as [`from_headers`].
pub fn from_metadata(metadata: &MetadataMap) -> Result<&str, AuthError> {
    metadata
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .ok_or_else(|| {
            tracing::debug!(target: "authrules.bearer", "Missing or malformed authorization metadata");
            missing()
        })
}
