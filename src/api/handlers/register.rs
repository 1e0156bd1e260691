//! User registration.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use super::{
    SharedState, session_error_response,
    types::{RegisterRequest, RegisterResponse},
};

const MIN_PASSWORD_CHARS: usize = 12;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created with the user role", body = RegisterResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "session"
)]
pub async fn register(
    state: Extension<SharedState>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_CHARS} characters"),
        )
            .into_response();
    }

    match state
        .sessions
        .register(&request.email, &request.password, request.mobile)
        .await
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                user_id: user.id,
                email: user.email,
                roles: user.roles.into_iter().collect(),
            }),
        )
            .into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}
