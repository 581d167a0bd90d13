//! Access-token authorization for protected routes.
//!
//! A route registered with `token(true)` only runs when the request presents
//! the API's configured access token, either as the `access_token` query
//! parameter or as an `Authorization: Bearer <token>` header. The check runs
//! before fingerprinting, so unauthorized requests never touch the cache.

use crate::http::Request;

/// Query parameter carrying the access token. Never forwarded to handlers.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Return the token a request presents, query parameter first.
pub fn presented_token(request: &Request) -> Option<&str> {
    if let Some(token) = request.query_param(ACCESS_TOKEN_PARAM) {
        return Some(token);
    }
    let value = request.headers().get("authorization")?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Returns `true` when `presented` equals the configured `expected` token.
///
/// Without a configured token every request is refused.
pub fn validate_token(expected: Option<&str>, presented: Option<&str>) -> bool {
    match (expected, presented) {
        (Some(expected), Some(presented)) if !expected.is_empty() => {
            constant_time_eq(expected.as_bytes(), presented.as_bytes())
        }
        _ => false,
    }
}

// Compare without an early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
