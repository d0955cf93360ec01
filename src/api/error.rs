//! HTTP mapping for the error taxonomy.
//!
//! Login-path failures collapse to one generic message so the response body
//! never distinguishes "no such account" from "wrong password". Lockout is
//! disclosed: it leaks nothing a failed-login probe would not.

use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::auth::AuthError;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

fn parts(err: &AuthError) -> (StatusCode, String, Option<u64>) {
    match err {
        AuthError::Validation(detail) => (StatusCode::BAD_REQUEST, detail.clone(), None),
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "invalid credentials".to_string(),
            None,
        ),
        AuthError::AccountLocked {
            retry_after_seconds,
        } => (
            StatusCode::LOCKED,
            "account locked".to_string(),
            Some(*retry_after_seconds),
        ),
        AuthError::RateLimited {
            retry_after_seconds,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate limited".to_string(),
            Some(*retry_after_seconds),
        ),
        AuthError::TokenInvalid => (StatusCode::UNAUTHORIZED, "token invalid".to_string(), None),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token expired".to_string(), None),
        AuthError::TokenRevoked => (StatusCode::UNAUTHORIZED, "token revoked".to_string(), None),
        AuthError::ReuseDetected => (
            StatusCode::UNAUTHORIZED,
            "refresh token reuse detected".to_string(),
            None,
        ),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string(), None),
        AuthError::Conflict(detail) => (StatusCode::CONFLICT, detail.clone(), None),
        AuthError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string(), None),
        AuthError::Unavailable(detail) => {
            // Infrastructure detail goes to the log, not the wire.
            error!("store unavailable: {detail}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "service unavailable".to_string(),
                None,
            )
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message, retry_after_seconds) = parts(&self);
        let mut response = (
            status,
            Json(ErrorBody {
                error: message,
                retry_after_seconds,
            }),
        )
            .into_response();
        if let Some(seconds) = retry_after_seconds {
            response.headers_mut().insert(RETRY_AFTER, seconds.into());
        }
        response
    }
}
