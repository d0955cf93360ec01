//! Signed access tokens.
//!
//! Verification is pure CPU (HS256 signature + expiry) and never touches the
//! store, which is what makes it safe on every protected request at high
//! concurrency. Claims are immutable once minted: a role change only shows up
//! in tokens issued after it.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::rbac::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub role: Role,
    /// The refresh chain this token was minted alongside. Logout revokes it.
    pub sid: Uuid,
    /// Unique token id.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies access tokens with a fixed TTL.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &[u8], access_ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is the security boundary here; no leeway.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl: Duration::seconds(access_ttl_seconds),
        }
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Mint an access token. Claims are fixed for the token's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if signing fails.
    pub fn mint(
        &self,
        user_id: Uuid,
        role: Role,
        chain_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(String, Claims), AuthError> {
        let claims = Claims {
            sub: user_id,
            role,
            sid: chain_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthError::Unavailable(format!("failed to sign access token: {err}")))?;
        Ok((token, claims))
    }

    /// Verify signature and expiry. No store access.
    ///
    /// # Errors
    ///
    /// `TokenExpired` for an expired signature, `TokenInvalid` for anything
    /// else (bad signature, malformed token, wrong algorithm).
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_seconds: i64) -> TokenIssuer {
        TokenIssuer::new(b"test-secret-test-secret", ttl_seconds)
    }

    #[test]
    fn mint_then_verify_round_trips_claims() {
        let issuer = issuer(3600);
        let user_id = Uuid::new_v4();
        let chain_id = Uuid::new_v4();
        let (token, minted) = issuer
            .mint(user_id, Role::Developer, chain_id, Utc::now())
            .expect("mint");

        let claims = issuer.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Developer);
        assert_eq!(claims.sid, chain_id);
        assert_eq!(claims.jti, minted.jti);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_reports_token_expired() {
        let issuer = issuer(-10);
        let (token, _) = issuer
            .mint(Uuid::new_v4(), Role::User, Uuid::new_v4(), Utc::now())
            .expect("mint");
        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tampered_token_reports_token_invalid() {
        let issuer = issuer(3600);
        let (token, _) = issuer
            .mint(Uuid::new_v4(), Role::User, Uuid::new_v4(), Utc::now())
            .expect("mint");
        let mut tampered = token;
        tampered.pop();
        assert!(matches!(
            issuer.verify(&tampered),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            issuer.verify("not-a-jwt"),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn wrong_secret_reports_token_invalid() {
        let (token, _) = issuer(3600)
            .mint(Uuid::new_v4(), Role::User, Uuid::new_v4(), Utc::now())
            .expect("mint");
        let other = TokenIssuer::new(b"another-secret-entirely", 3600);
        assert!(matches!(other.verify(&token), Err(AuthError::TokenInvalid)));
    }
}
