//! Session directory: list and revoke refresh chains.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ErrorBody;
use crate::api::handlers::require_claims;
use crate::api::types::{RevokeAllRequest, RevokedResponse, SessionSummary};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    get,
    path = "/v1/sessions",
    responses(
        (status = 200, description = "Active sessions for the caller.", body = [SessionSummary]),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks session:read.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn list_sessions(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<Vec<SessionSummary>>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    let sessions = service.list_sessions(&claims).await?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{chain_id}",
    params(("chain_id" = Uuid, Path, description = "Session chain id")),
    responses(
        (status = 204, description = "Session chain revoked."),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks session:revoke.", body = ErrorBody),
        (status = 404, description = "No such session for this caller.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn revoke_session(
    Path(chain_id): Path<Uuid>,
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<StatusCode, AuthError> {
    let claims = require_claims(&service, &headers)?;
    service.revoke_session(&claims, chain_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/sessions/revoke_all",
    request_body = RevokeAllRequest,
    responses(
        (status = 200, description = "Count of revoked refresh records.", body = RevokedResponse),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Foreign target without user:update.", body = ErrorBody),
        (status = 404, description = "Target user does not exist.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn revoke_all(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    payload: Option<Json<RevokeAllRequest>>,
) -> Result<Json<RevokedResponse>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    let target = payload.and_then(|Json(body)| body.user_id);
    let revoked = service.revoke_all_sessions(&claims, target).await?;
    Ok(Json(RevokedResponse { revoked }))
}
