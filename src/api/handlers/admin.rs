//! Administrative surface: role table, role assignment, lockout recovery.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ErrorBody;
use crate::api::handlers::require_claims;
use crate::api::types::{AssignRoleRequest, RoleEntry};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    get,
    path = "/v1/admin/roles",
    responses(
        (status = 200, description = "The full role to permission table.", body = [RoleEntry]),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks role:read.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_roles(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<Vec<RoleEntry>>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    let roles = service.list_roles(&claims)?;
    Ok(Json(
        roles
            .into_iter()
            .map(|(role, permissions)| RoleEntry { role, permissions })
            .collect(),
    ))
}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/role",
    params(("user_id" = Uuid, Path, description = "Target user id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 204, description = "Role changed; outstanding access tokens keep the old role until expiry."),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks role:assign, or the target is the caller.", body = ErrorBody),
        (status = 404, description = "Target user does not exist.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn assign_role(
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<StatusCode, AuthError> {
    let claims = require_claims(&service, &headers)?;
    service.change_user_role(&claims, user_id, payload.role).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/unlock",
    params(("user_id" = Uuid, Path, description = "Target user id")),
    responses(
        (status = 204, description = "Lockout cleared and failure counter reset."),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks user:update.", body = ErrorBody),
        (status = 404, description = "Target user does not exist.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn unlock_user(
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<StatusCode, AuthError> {
    let claims = require_claims(&service, &headers)?;
    service.force_unlock(&claims, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
