//! Registration, login, rotation and credential endpoints.
//!
//! Every failure here maps through the shared error taxonomy so the wire
//! never distinguishes an unknown account from a wrong password.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::error::ErrorBody;
use crate::api::handlers::{bearer_token, client_key, require_claims};
use crate::api::types::{
    ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse,
    TokenResponse,
};
use crate::auth::{AuthError, AuthService, RegisterInput};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created with the default user role.", body = RegisterResponse),
        (status = 400, description = "Malformed username, email or password.", body = ErrorBody),
        (status = 409, description = "Username or email already taken.", body = ErrorBody),
        (status = 429, description = "Too many requests.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    service.guard_api(&client_key(&headers))?;
    let user_id = service
        .register(RegisterInput {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            display_name: payload.display_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair minted.", body = TokenResponse),
        (status = 401, description = "Invalid credentials.", body = ErrorBody),
        (status = 423, description = "Account locked after repeated failures.", body = ErrorBody),
        (status = 429, description = "Too many login attempts.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let pair = service
        .login(
            &payload.login,
            &payload.password,
            payload.fingerprint,
            &client_key(&headers),
        )
        .await?;
    Ok(Json(TokenResponse::from(pair)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair.", body = TokenResponse),
        (status = 401, description = "Invalid, expired, revoked or reused refresh token.", body = ErrorBody),
        (status = 429, description = "Too many refresh attempts.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let pair = service
        .refresh(&payload.refresh_token, &client_key(&headers))
        .await?;
    Ok(Json(TokenResponse::from(pair)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session chain revoked."),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<StatusCode, AuthError> {
    service.logout(bearer_token(&headers)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password rotated; sessions stay valid."),
        (status = 400, description = "New password rejected by policy.", body = ErrorBody),
        (status = 401, description = "Wrong old password or invalid token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AuthError> {
    let claims = require_claims(&service, &headers)?;
    service
        .change_password(&claims, &payload.old_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
