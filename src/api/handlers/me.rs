//! Authenticated self-service: the caller's effective permissions.

use axum::{extract::Extension, http::HeaderMap, Json};
use std::sync::Arc;

use crate::api::error::ErrorBody;
use crate::api::handlers::require_claims;
use crate::api::types::{CheckPermissionRequest, CheckPermissionResponse, PermissionsResponse};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    get,
    path = "/v1/me/permissions",
    responses(
        (status = 200, description = "The caller's role and effective permission set.", body = PermissionsResponse),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn permissions(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<PermissionsResponse>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    Ok(Json(PermissionsResponse {
        role: claims.role,
        permissions: service.permissions_of(&claims),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/me/permissions/check",
    request_body = CheckPermissionRequest,
    responses(
        (status = 200, description = "Allow/deny for one permission. Unknown permission strings are denied, not rejected.", body = CheckPermissionResponse),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn check_permission(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    let allowed = payload
        .permission
        .parse()
        .is_ok_and(|permission| service.check_permission(&claims, permission));
    Ok(Json(CheckPermissionResponse { allowed }))
}
