//! OpenAPI document for the HTTP surface, served at `/openapi.json`.

use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api::{error, handlers, types};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "keyward",
        description = "Token lifecycle and role-based authorization service",
    ),
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::change_password,
        handlers::session::list_sessions,
        handlers::session::revoke_session,
        handlers::session::revoke_all,
        handlers::apikey::create_api_key,
        handlers::apikey::list_api_keys,
        handlers::apikey::revoke_api_key,
        handlers::me::permissions,
        handlers::me::check_permission,
        handlers::admin::list_roles,
        handlers::admin::assign_role,
        handlers::admin::unlock_user,
    ),
    components(schemas(
        error::ErrorBody,
        types::HealthResponse,
        types::RegisterRequest,
        types::RegisterResponse,
        types::LoginRequest,
        types::TokenResponse,
        types::RefreshRequest,
        types::ChangePasswordRequest,
        types::RevokeAllRequest,
        types::RevokedResponse,
        types::SessionSummary,
        types::CreateApiKeyRequest,
        types::CreateApiKeyResponse,
        types::ApiKeySummary,
        types::PermissionsResponse,
        types::CheckPermissionRequest,
        types::CheckPermissionResponse,
        types::RoleEntry,
        types::AssignRoleRequest,
        crate::rbac::Role,
        crate::rbac::Permission,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "sessions", description = "Session directory"),
        (name = "apikeys", description = "API key management"),
        (name = "me", description = "Caller's effective permissions"),
        (name = "admin", description = "Role table and account administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/v1/auth/register",
            "/v1/auth/login",
            "/v1/auth/refresh",
            "/v1/auth/logout",
            "/v1/auth/password",
            "/v1/sessions",
            "/v1/sessions/{chain_id}",
            "/v1/sessions/revoke_all",
            "/v1/apikeys",
            "/v1/apikeys/{key_id}",
            "/v1/me/permissions",
            "/v1/me/permissions/check",
            "/v1/admin/roles",
            "/v1/admin/users/{user_id}/role",
            "/v1/admin/users/{user_id}/unlock",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
