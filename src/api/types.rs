//! Wire types for the HTTP surface.
//!
//! Request bodies use `deny_unknown_fields` so typos fail loudly instead of
//! silently dropping an option. Secrets (passwords, refresh tokens, API-key
//! plaintext) only ever appear in request bodies or a single creation
//! response, never in summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::TokenPair;
use crate::rbac::{Permission, Role};
use crate::store::ApiKeyRecord;
use crate::token::RefreshRecord;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Username or email address.
    pub login: String,
    pub password: String,
    /// Opaque client identifier, echoed on the session for the owner to
    /// recognize their devices.
    pub fingerprint: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RevokeAllRequest {
    /// Another user's id; requires `user:update`. Defaults to the caller.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokedResponse {
    pub revoked: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub chain_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: Option<String>,
}

impl From<RefreshRecord> for SessionSummary {
    fn from(record: RefreshRecord) -> Self {
        Self {
            chain_id: record.chain_id,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            fingerprint: record.fingerprint,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateApiKeyRequest {
    pub scopes: BTreeSet<Permission>,
    pub rate_limit_override: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateApiKeyResponse {
    pub key_id: Uuid,
    /// Shown exactly once; only a hash is stored.
    pub secret: String,
    pub scopes: BTreeSet<Permission>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeySummary {
    pub key_id: Uuid,
    pub scopes: BTreeSet<Permission>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub rate_limit_override: Option<u32>,
}

impl From<ApiKeyRecord> for ApiKeySummary {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            key_id: record.id,
            scopes: record.scopes,
            created_at: record.created_at,
            revoked_at: record.revoked_at,
            rate_limit_override: record.rate_limit_override,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionsResponse {
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckPermissionRequest {
    /// A `category:action` string. Unknown values are simply not allowed,
    /// they are not an error.
    pub permission: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleEntry {
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub name: String,
    pub version: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn token_response_carries_bearer_type() {
        let response = TokenResponse::from(TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 3600,
        });
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
    }

    #[test]
    fn session_summary_hides_the_token_hash() {
        let record = RefreshRecord::root(Uuid::new_v4(), "hash".into(), 60, None, Utc::now());
        let summary = SessionSummary::from(record.clone());
        let json = serde_json::to_string(&summary).expect("serialize");
        assert!(!json.contains("hash"));
        assert_eq!(summary.chain_id, record.chain_id);
    }

    #[test]
    fn unknown_request_fields_are_rejected() {
        let err = serde_json::from_str::<LoginRequest>(
            r#"{"login":"alice","password":"pw","paswword":"typo"}"#,
        );
        assert!(err.is_err());
    }
}
