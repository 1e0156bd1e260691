//! API handlers and shared request utilities.
//!
//! Token-path failures map to deliberately coarse 401 bodies: replay
//! detection and strict-origin rejections are indistinguishable from a
//! plain invalid session on the wire, so the detection logic does not
//! leak. Role-management failures return their specific reason; those
//! callers are already authenticated admins.

pub mod health;
pub mod register;
pub mod roles;
pub mod root;
pub mod session;
pub mod types;

use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use std::sync::Arc;
use tracing::error;

use crate::auth::{
    AuthError, OriginFingerprint, Principal, RoleService, SessionService,
};

/// Shared handler state, injected as an `Extension`.
pub struct AppState {
    pub sessions: SessionService,
    pub roles: RoleService,
}

pub type SharedState = Arc<AppState>;

/// Map a session-path error to a response. Security-sensitive variants
/// collapse into a generic body.
pub(crate) fn session_error_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::BadCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
        AuthError::TokenNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
        }
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "Session expired, please log in again".to_string(),
        ),
        AuthError::TokenReplayDetected | AuthError::OriginMismatch => {
            (StatusCode::UNAUTHORIZED, "Session invalid".to_string())
        }
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
        AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, "Invalid email".to_string()),
        AuthError::EmailTaken => (
            StatusCode::CONFLICT,
            "Email is already registered".to_string(),
        ),
        AuthError::RoleAlreadyHeld(_) | AuthError::RoleNotHeld(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        AuthError::HierarchyViolation(_) | AuthError::ProtectedRole => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        AuthError::Storage(err) => {
            error!("storage failure: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    }
}

/// Resolve the acting principal from a bearer access token.
pub(crate) fn require_principal(
    headers: &HeaderMap,
    state: &SharedState,
) -> Result<Principal, (StatusCode, String)> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Missing bearer token".to_string(),
        ));
    };
    state
        .sessions
        .authenticate_access_token(&token)
        .map_err(|err| session_error_response(&err))
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Build the request's origin fingerprint from proxy headers and the
/// user-agent string.
pub(crate) fn request_fingerprint(headers: &HeaderMap) -> OriginFingerprint {
    OriginFingerprint::new(extract_client_ip(headers), extract_user_agent(headers))
}

/// Extract a client IP from common proxy headers.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction_handles_casing_and_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(extract_bearer_token(&headers), Some("xyz".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn fingerprint_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.1.2.3, 172.16.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.0.9"));
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("app/1.0"),
        );

        let fingerprint = request_fingerprint(&headers);
        assert_eq!(fingerprint.address.as_deref(), Some("10.1.2.3"));
        assert_eq!(fingerprint.agent.as_deref(), Some("app/1.0"));
    }

    #[test]
    fn fingerprint_components_are_optional() {
        let fingerprint = request_fingerprint(&HeaderMap::new());
        assert!(fingerprint.address.is_none());
        assert!(fingerprint.agent.is_none());
    }

    #[test]
    fn replay_and_origin_mismatch_share_a_body() {
        let replay = session_error_response(&AuthError::TokenReplayDetected);
        let origin = session_error_response(&AuthError::OriginMismatch);
        assert_eq!(replay, origin);
        assert_eq!(replay.0, StatusCode::UNAUTHORIZED);
    }
}
