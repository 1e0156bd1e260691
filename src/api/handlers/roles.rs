//! Role management endpoints. All of them require an admin bearer token;
//! the acting principal is resolved here and passed down explicitly.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use super::{
    SharedState, require_principal, session_error_response,
    types::{RoleGrantRequest, RoleSetResponse},
};
use crate::auth::{Role, RoleSet};

fn role_set_response(user_id: Uuid, roles: RoleSet) -> RoleSetResponse {
    RoleSetResponse {
        user_id,
        roles: roles.into_iter().collect(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/roles",
    request_body = RoleGrantRequest,
    params(
        ("user_id" = Uuid, Path, description = "Target user")
    ),
    responses(
        (status = 200, description = "Role granted", body = RoleSetResponse),
        (status = 401, description = "Missing or invalid bearer token", body = String),
        (status = 403, description = "Actor is not an admin", body = String),
        (status = 404, description = "Target user not found", body = String),
        (status = 409, description = "Role already held", body = String),
        (status = 422, description = "Ladder precondition unmet or protected role", body = String)
    ),
    tag = "roles"
)]
pub async fn grant_role(
    headers: HeaderMap,
    state: Extension<SharedState>,
    Path(user_id): Path<Uuid>,
    payload: Option<Json<RoleGrantRequest>>,
) -> impl IntoResponse {
    let principal = match require_principal(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response.into_response(),
    };
    let request: RoleGrantRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match state.roles.grant(&principal, user_id, request.role).await {
        Ok(roles) => (StatusCode::OK, Json(role_set_response(user_id, roles))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}/roles/{role}",
    params(
        ("user_id" = Uuid, Path, description = "Target user"),
        ("role" = String, Path, description = "Role name to revoke")
    ),
    responses(
        (status = 200, description = "Role revoked", body = RoleSetResponse),
        (status = 400, description = "Unknown role name", body = String),
        (status = 401, description = "Missing or invalid bearer token", body = String),
        (status = 403, description = "Actor is not an admin", body = String),
        (status = 404, description = "Target user not found", body = String),
        (status = 409, description = "Role not held", body = String),
        (status = 422, description = "Protected role", body = String)
    ),
    tag = "roles"
)]
pub async fn revoke_role(
    headers: HeaderMap,
    state: Extension<SharedState>,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let principal = match require_principal(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response.into_response(),
    };
    let Some(role) = Role::parse(&role) else {
        return (StatusCode::BAD_REQUEST, format!("Unknown role: {role}")).into_response();
    };

    match state.roles.revoke(&principal, user_id, role).await {
        Ok(roles) => (StatusCode::OK, Json(role_set_response(user_id, roles))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/promote-admin",
    params(
        ("user_id" = Uuid, Path, description = "Target user")
    ),
    responses(
        (status = 200, description = "User promoted to admin", body = RoleSetResponse),
        (status = 401, description = "Missing or invalid bearer token", body = String),
        (status = 403, description = "Actor is not an admin", body = String),
        (status = 404, description = "Target user not found", body = String),
        (status = 409, description = "Already an admin", body = String),
        (status = 422, description = "Ladder precondition unmet", body = String)
    ),
    tag = "roles"
)]
pub async fn promote_admin(
    headers: HeaderMap,
    state: Extension<SharedState>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let principal = match require_principal(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response.into_response(),
    };

    match state.roles.promote_to_admin(&principal, user_id).await {
        Ok(roles) => (StatusCode::OK, Json(role_set_response(user_id, roles))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/demote-admin",
    params(
        ("user_id" = Uuid, Path, description = "Target user")
    ),
    responses(
        (status = 200, description = "Admin role removed", body = RoleSetResponse),
        (status = 401, description = "Missing or invalid bearer token", body = String),
        (status = 403, description = "Actor is not an admin", body = String),
        (status = 404, description = "Target user not found", body = String),
        (status = 409, description = "Not an admin", body = String)
    ),
    tag = "roles"
)]
pub async fn demote_admin(
    headers: HeaderMap,
    state: Extension<SharedState>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let principal = match require_principal(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response.into_response(),
    };

    match state.roles.demote_from_admin(&principal, user_id).await {
        Ok(roles) => (StatusCode::OK, Json(role_set_response(user_id, roles))).into_response(),
        Err(err) => session_error_response(&err).into_response(),
    }
}
