//! The error taxonomy.
//!
//! Authentication-path failures (`InvalidCredentials`, `AccountLocked`,
//! `RateLimited`) are shaped so the HTTP layer can answer with a uniform
//! generic message; `Unavailable` is the only variant callers should retry.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, locally correctable by the caller.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account locked, retry in {retry_after_seconds}s")]
    AccountLocked { retry_after_seconds: u64 },
    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token revoked")]
    TokenRevoked,
    /// A rotated-away refresh token was presented again. Treated as a
    /// security event, not ordinary expiry.
    #[error("refresh token reuse detected")]
    ReuseDetected,
    /// Never names the missing permission.
    #[error("forbidden")]
    Forbidden,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found")]
    NotFound,
    /// Infrastructure failure; retryable with backoff.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => AuthError::Conflict(detail),
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Unavailable(detail) => AuthError::Unavailable(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert!(matches!(
            AuthError::from(StoreError::Conflict("dup".into())),
            AuthError::Conflict(_)
        ));
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::NotFound
        ));
        assert!(matches!(
            AuthError::from(StoreError::Unavailable("timeout".into())),
            AuthError::Unavailable(_)
        ));
    }

    #[test]
    fn forbidden_message_names_no_permission() {
        assert_eq!(AuthError::Forbidden.to_string(), "forbidden");
    }
}
