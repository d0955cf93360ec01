//! API-key management. The plaintext secret appears only in the creation
//! response; every listing carries metadata and scopes, never the secret.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ErrorBody;
use crate::api::handlers::require_claims;
use crate::api::types::{ApiKeySummary, CreateApiKeyRequest, CreateApiKeyResponse};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path = "/v1/apikeys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key created; the secret is shown exactly once.", body = CreateApiKeyResponse),
        (status = 400, description = "Empty scope set.", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Requested scope exceeds the caller's role.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "apikeys"
)]
pub async fn create_api_key(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), AuthError> {
    let claims = require_claims(&service, &headers)?;
    let (record, secret) = service
        .create_api_key(&claims, payload.scopes, payload.rate_limit_override)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            key_id: record.id,
            secret,
            scopes: record.scopes,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/apikeys",
    responses(
        (status = 200, description = "The caller's active API keys.", body = [ApiKeySummary]),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks apikey:read.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "apikeys"
)]
pub async fn list_api_keys(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<Vec<ApiKeySummary>>, AuthError> {
    let claims = require_claims(&service, &headers)?;
    let keys = service.list_api_keys(&claims).await?;
    Ok(Json(keys.into_iter().map(ApiKeySummary::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/v1/apikeys/{key_id}",
    params(("key_id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 204, description = "API key revoked."),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 403, description = "Role lacks apikey:revoke.", body = ErrorBody),
        (status = 404, description = "No such key for this caller.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "apikeys"
)]
pub async fn revoke_api_key(
    Path(key_id): Path<Uuid>,
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<StatusCode, AuthError> {
    let claims = require_claims(&service, &headers)?;
    service.revoke_api_key(&claims, key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
