//! Session endpoints: login, refresh exchange, logout, revoke-all.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use super::{
    SharedState, request_fingerprint, require_principal, session_error_response,
    types::{
        LoginRequest, LogoutRequest, RefreshRequest, RevokeAllRequest, RevokeAllResponse,
        TokenResponse,
    },
};
use crate::auth::{Role, SessionTokens};

fn token_response(tokens: SessionTokens) -> TokenResponse {
    TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in_seconds: tokens.expires_in_seconds,
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, session opened", body = TokenResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Invalid credentials", body = String)
    ),
    tag = "session"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<SharedState>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fingerprint = request_fingerprint(&headers);
    match state
        .sessions
        .login(&request.email, &request.password, fingerprint)
        .await
    {
        Ok(tokens) => (StatusCode::OK, Json(token_response(tokens))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Invalid, expired, or replayed refresh token", body = String)
    ),
    tag = "session"
)]
pub async fn refresh(
    headers: HeaderMap,
    state: Extension<SharedState>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fingerprint = request_fingerprint(&headers);
    match state
        .sessions
        .refresh(&request.refresh_token, fingerprint)
        .await
    {
        Ok(tokens) => (StatusCode::OK, Json(token_response(tokens))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session cleared; idempotent"),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "session"
)]
pub async fn logout(
    state: Extension<SharedState>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let request: LogoutRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // Logout always succeeds from the caller's point of view; a storage
    // failure is logged by the error mapping but still surfaces as 500.
    match state.sessions.logout(&request.refresh_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/sessions/revoke-all",
    request_body = RevokeAllRequest,
    responses(
        (status = 200, description = "Sessions revoked", body = RevokeAllResponse),
        (status = 401, description = "Missing or invalid bearer token", body = String),
        (status = 403, description = "Targeting another user requires admin", body = String)
    ),
    tag = "session"
)]
pub async fn revoke_all(
    headers: HeaderMap,
    state: Extension<SharedState>,
    payload: Option<Json<RevokeAllRequest>>,
) -> impl IntoResponse {
    let principal = match require_principal(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response.into_response(),
    };

    let target = payload
        .and_then(|Json(request)| request.user_id)
        .unwrap_or(principal.user_id);
    if target != principal.user_id && !principal.holds(Role::Admin) {
        return (StatusCode::FORBIDDEN, "Forbidden".to_string()).into_response();
    }

    match state.sessions.revoke_all_sessions(target).await {
        Ok(revoked) => (StatusCode::OK, Json(RevokeAllResponse { revoked })).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}
