//! Bearer-token auth (`SPEC_FULL.md` §4): a single shared `ACE_API_KEY`,
//! modeled on the teacher's `middleware::auth_middleware` but without its
//! JWT/Casbin/org-scoping layer — the core has no user or role model.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::error::AceError;
use crate::http::state::AppState;

/// Fixed-time comparison — avoids leaking key-prefix-match timing on an
/// otherwise ordinary `==`.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_bearer_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AceError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if constant_time_eq(token.as_bytes(), state.api_key.as_bytes()) => {
            Ok(next.run(request).await)
        },
        _ => Err(AceError::unauthorized("missing or invalid bearer token")),
    }
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn equal_slices_match() {
        assert!(constant_time_eq(b"secret", b"secret"));
    }

    #[test]
    fn different_lengths_never_match() {
        assert!(!constant_time_eq(b"secret", b"secretx"));
    }

    #[test]
    fn differing_bytes_do_not_match() {
        assert!(!constant_time_eq(b"secret", b"secrex"));
    }
}
