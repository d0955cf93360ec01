//! The `AuthService` facade.
//!
//! One object owns the whole token lifecycle: registration, login (through
//! the abuse guard), rotation with reuse detection, revocation, API keys,
//! and the admin operations. Handlers and the CLI only ever talk to this.

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::abuse::{EndpointClass, RateDecision, RateLimiter};
use crate::auth::password::{burn_verification, hash_password, verify_password};
use crate::auth::{AuthError, AuthPolicy};
use crate::rbac::{
    authorize, effective_permissions, AccessContext, Permission, Role, RoleRegistry, RoleTable,
};
use crate::store::{ApiKeyRecord, AuthStore, NewUser, UserRecord};
use crate::token::{generate_opaque_secret, hash_secret, Claims, RefreshRecord, RefreshState, TokenIssuer};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

static USERNAME_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,32}$").ok());
static EMAIL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds, echoed so clients can schedule a
    /// refresh ahead of expiry.
    pub expires_in: i64,
}

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    issuer: TokenIssuer,
    registry: RoleRegistry,
    limiter: Arc<dyn RateLimiter>,
    policy: AuthPolicy,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        issuer: TokenIssuer,
        registry: RoleRegistry,
        limiter: Arc<dyn RateLimiter>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            store,
            issuer,
            registry,
            limiter,
            policy,
        }
    }

    #[must_use]
    pub fn role_table(&self) -> Arc<RoleTable> {
        self.registry.load()
    }

    /// Swap in a new role→permission table. Atomic for readers.
    pub fn reload_role_table(&self, table: RoleTable) {
        self.registry.replace(table);
    }

    // ------------------------------------------------------------------
    // Registration & credentials
    // ------------------------------------------------------------------

    /// Register a new account with the default `user` role.
    ///
    /// # Errors
    /// `Validation` for malformed input, `Conflict` for duplicates.
    pub async fn register(&self, input: RegisterInput) -> Result<Uuid, AuthError> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;
        if input.display_name.trim().is_empty() {
            return Err(AuthError::Validation("display name is required".into()));
        }

        let password_hash = hash_password(&input.password, self.policy.password_cost())?;
        let record = self
            .store
            .insert_user(NewUser {
                username: input.username,
                email: normalize_email(&input.email),
                display_name: input.display_name.trim().to_string(),
                password_hash,
                role: Role::User,
            })
            .await?;

        info!(user = %record.id, username = %record.username, "user registered");
        Ok(record.id)
    }

    /// Authenticate and mint a token pair.
    ///
    /// The abuse guard runs first: rate limit, then lockout — a locked
    /// account fails before any hashing so lockout cannot be used as a
    /// timing oracle or a hashing-cost amplifier.
    ///
    /// # Errors
    /// `RateLimited`, `AccountLocked`, `InvalidCredentials`.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        fingerprint: Option<String>,
        client_key: &str,
    ) -> Result<TokenPair, AuthError> {
        self.check_rate(client_key, EndpointClass::Login)?;

        let now = Utc::now();
        let Some(user) = self.store.user_by_login(login).await? else {
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        };
        if !user.active {
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(retry_after_seconds) = self
            .policy
            .lockout()
            .remaining_seconds(user.locked_until, now)
        {
            return Err(AuthError::AccountLocked {
                retry_after_seconds,
            });
        }

        if !verify_password(password, &user.password_hash)? {
            let outcome = self
                .store
                .record_login_failure(
                    user.id,
                    self.policy.lockout().threshold(),
                    self.policy.lockout().duration(),
                    now,
                )
                .await?;
            if let Some(until) = outcome.locked_until {
                warn!(user = %user.id, locked_until = %until, "account locked after repeated failures");
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.store.record_login_success(user.id, now).await?;
        self.issue_pair(&user, fingerprint).await
    }

    /// Verify a password and rotate it. Sessions stay valid; stolen refresh
    /// tokens are handled by `revoke_all_sessions`, not here.
    ///
    /// # Errors
    /// `InvalidCredentials` for a wrong old password, `Validation` for a weak
    /// new one.
    pub async fn change_password(
        &self,
        claims: &Claims,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let user = self.require_user(claims.sub).await?;
        if !verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        let password_hash = hash_password(new_password, self.policy.password_cost())?;
        self.store.update_password(user.id, &password_hash).await?;
        info!(user = %user.id, "password changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token lifecycle
    // ------------------------------------------------------------------

    /// Signature + expiry check only; no store access.
    ///
    /// # Errors
    /// `TokenExpired`, `TokenInvalid`.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.issuer.verify(token)
    }

    /// Rotate a refresh token.
    ///
    /// Presenting a superseded record revokes the entire chain: reuse of a
    /// rotated-away token implies theft or replay, and invalidating the
    /// lineage limits the attacker's window. The loser of a benign
    /// concurrent rotation is indistinguishable from a replay at the store
    /// boundary and gets the same treatment, so a double-submit kills the
    /// whole chain no matter which side of the swap it lands on.
    ///
    /// # Errors
    /// `TokenInvalid`, `TokenExpired`, `TokenRevoked`, `ReuseDetected`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_key: &str,
    ) -> Result<TokenPair, AuthError> {
        self.check_rate(client_key, EndpointClass::Refresh)?;

        let now = Utc::now();
        let token_hash = hash_secret(refresh_token);
        let Some(record) = self.store.refresh_by_hash(&token_hash).await? else {
            return Err(AuthError::TokenInvalid);
        };

        match record.state {
            RefreshState::Revoked => Err(AuthError::TokenRevoked),
            _ if record.is_expired(now) => Err(AuthError::TokenExpired),
            RefreshState::Superseded => {
                let revoked = self.store.revoke_chain(record.chain_id).await?;
                warn!(
                    user = %record.user_id,
                    chain = %record.chain_id,
                    records_revoked = revoked,
                    "security.refresh_reuse: superseded refresh token presented; chain revoked"
                );
                Err(AuthError::ReuseDetected)
            }
            RefreshState::Current => {
                let user = self
                    .store
                    .user_by_id(record.user_id)
                    .await?
                    .ok_or(AuthError::TokenRevoked)?;
                if !user.active {
                    return Err(AuthError::TokenRevoked);
                }

                let secret = generate_opaque_secret()
                    .map_err(|err| AuthError::Unavailable(err.to_string()))?;
                let child = RefreshRecord::child_of(&record, hash_secret(&secret), now);
                if !self.store.rotate_refresh(record.id, child).await? {
                    // Lost the swap to a concurrent rotation. Same verdict as
                    // presenting a superseded record: the chain dies.
                    let revoked = self.store.revoke_chain(record.chain_id).await?;
                    warn!(
                        user = %record.user_id,
                        chain = %record.chain_id,
                        records_revoked = revoked,
                        "security.refresh_reuse: concurrent rotation of one refresh token; chain revoked"
                    );
                    return Err(AuthError::ReuseDetected);
                }

                let (access_token, _) =
                    self.issuer.mint(user.id, user.role, record.chain_id, now)?;
                Ok(TokenPair {
                    access_token,
                    refresh_token: secret,
                    expires_in: self.issuer.access_ttl_seconds(),
                })
            }
        }
    }

    /// Revoke the session chain the access token was minted with.
    ///
    /// # Errors
    /// `TokenInvalid` / `TokenExpired` for a bad token.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.verify_access(access_token)?;
        self.store.revoke_chain(claims.sid).await?;
        info!(user = %claims.sub, chain = %claims.sid, "session logged out");
        Ok(())
    }

    /// Revoke every chain of a user. Self-service, or any caller holding
    /// `user:update` for another target. Idempotent; returns the count.
    ///
    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub async fn revoke_all_sessions(
        &self,
        claims: &Claims,
        target: Option<Uuid>,
    ) -> Result<u64, AuthError> {
        let target = target.unwrap_or(claims.sub);
        if target != claims.sub {
            self.require_permission(claims, Permission::UserUpdate)?;
            self.require_user(target).await?;
        }
        let revoked = self.store.revoke_user_chains(target).await?;
        info!(actor = %claims.sub, target = %target, revoked, "all sessions revoked");
        Ok(revoked)
    }

    // ------------------------------------------------------------------
    // Session directory
    // ------------------------------------------------------------------

    /// Active sessions (current, unexpired chain heads) for the caller.
    ///
    /// # Errors
    /// `Forbidden` when the role lacks `session:read`.
    pub async fn list_sessions(&self, claims: &Claims) -> Result<Vec<RefreshRecord>, AuthError> {
        self.require_permission(claims, Permission::SessionRead)?;
        Ok(self.store.active_sessions(claims.sub, Utc::now()).await?)
    }

    /// Revoke a single session chain, distinct from `revoke_all_sessions`.
    /// Foreign chains need `user:update`; otherwise they are reported as
    /// `NotFound` to avoid session enumeration.
    ///
    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub async fn revoke_session(&self, claims: &Claims, chain_id: Uuid) -> Result<(), AuthError> {
        self.require_permission(claims, Permission::SessionRevoke)?;

        let own = self
            .store
            .active_sessions(claims.sub, Utc::now())
            .await?
            .iter()
            .any(|record| record.chain_id == chain_id);

        let table = self.registry.load();
        if !own && !authorize(&table, &claims_context(claims), Permission::UserUpdate) {
            return Err(AuthError::NotFound);
        }
        if self.store.revoke_chain(chain_id).await? == 0 && !own {
            return Err(AuthError::NotFound);
        }
        info!(actor = %claims.sub, chain = %chain_id, "session revoked");
        Ok(())
    }

    // ------------------------------------------------------------------
    // API keys
    // ------------------------------------------------------------------

    /// Create an API key scoped at or below the caller's role grant. The
    /// plaintext secret is returned exactly once.
    ///
    /// # Errors
    /// `Forbidden` when a requested scope exceeds the caller's role.
    pub async fn create_api_key(
        &self,
        claims: &Claims,
        scopes: BTreeSet<Permission>,
        rate_limit_override: Option<u32>,
    ) -> Result<(ApiKeyRecord, String), AuthError> {
        self.require_permission(claims, Permission::ApikeyCreate)?;
        if scopes.is_empty() {
            return Err(AuthError::Validation("at least one scope is required".into()));
        }

        let granted = self.registry.load().permissions(claims.role);
        if !scopes.is_subset(&granted) {
            return Err(AuthError::Forbidden);
        }

        let secret =
            generate_opaque_secret().map_err(|err| AuthError::Unavailable(err.to_string()))?;
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            user_id: claims.sub,
            secret_hash: hash_secret(&secret),
            scopes,
            created_at: Utc::now(),
            revoked_at: None,
            rate_limit_override,
        };
        self.store.insert_api_key(record.clone()).await?;
        info!(user = %claims.sub, key = %record.id, "api key created");
        Ok((record, secret))
    }

    /// # Errors
    /// `Forbidden` when the role lacks `apikey:read`.
    pub async fn list_api_keys(&self, claims: &Claims) -> Result<Vec<ApiKeyRecord>, AuthError> {
        self.require_permission(claims, Permission::ApikeyRead)?;
        Ok(self.store.api_keys_for_user(claims.sub).await?)
    }

    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub async fn revoke_api_key(&self, claims: &Claims, key_id: Uuid) -> Result<(), AuthError> {
        self.require_permission(claims, Permission::ApikeyRevoke)?;
        if !self
            .store
            .revoke_api_key(claims.sub, key_id, Utc::now())
            .await?
        {
            return Err(AuthError::NotFound);
        }
        info!(user = %claims.sub, key = %key_id, "api key revoked");
        Ok(())
    }

    /// Resolve an API-key secret to its owner and effective permission set:
    /// the key's scopes intersected with the owner's *current* role grant,
    /// so a role downgrade shrinks every outstanding key immediately.
    ///
    /// # Errors
    /// `TokenRevoked` for revoked keys or deactivated owners,
    /// `InvalidCredentials` for an unknown secret.
    pub async fn authenticate_api_key(
        &self,
        secret: &str,
    ) -> Result<(UserRecord, BTreeSet<Permission>), AuthError> {
        let Some(key) = self.store.api_key_by_hash(&hash_secret(secret)).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if key.is_revoked() {
            return Err(AuthError::TokenRevoked);
        }
        let user = self
            .store
            .user_by_id(key.user_id)
            .await?
            .ok_or(AuthError::TokenRevoked)?;
        if !user.active {
            return Err(AuthError::TokenRevoked);
        }

        let table = self.registry.load();
        let context = AccessContext::scoped(user.role, key.scopes.clone());
        let effective = effective_permissions(&table, &context);
        Ok((user, effective))
    }

    // ------------------------------------------------------------------
    // Authorization surface
    // ------------------------------------------------------------------

    /// Allow/deny for the caller's token against one permission.
    #[must_use]
    pub fn check_permission(&self, claims: &Claims, permission: Permission) -> bool {
        authorize(&self.registry.load(), &claims_context(claims), permission)
    }

    /// The caller's full effective permission set.
    #[must_use]
    pub fn permissions_of(&self, claims: &Claims) -> BTreeSet<Permission> {
        self.registry.load().permissions(claims.role)
    }

    /// The role→permission table, admin only.
    ///
    /// # Errors
    /// `Forbidden` when the role lacks `role:read`.
    pub fn list_roles(&self, claims: &Claims) -> Result<Vec<(Role, BTreeSet<Permission>)>, AuthError> {
        self.require_permission(claims, Permission::RoleRead)?;
        let table = self.registry.load();
        Ok(Role::ALL
            .into_iter()
            .map(|role| (role, table.permissions(role)))
            .collect())
    }

    /// Admin role change with audit trail. A caller can never change their
    /// own role, admin or not.
    ///
    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub async fn change_user_role(
        &self,
        claims: &Claims,
        target: Uuid,
        role: Role,
    ) -> Result<(), AuthError> {
        self.require_permission(claims, Permission::RoleAssign)?;
        if target == claims.sub {
            return Err(AuthError::Forbidden);
        }
        let user = self.require_user(target).await?;
        self.store.update_role(target, role).await?;
        // Audit trail: role transitions must be attributable.
        info!(
            actor = %claims.sub,
            target = %target,
            old_role = %user.role,
            new_role = %role,
            "user role changed"
        );
        Ok(())
    }

    /// Admin force-clear of an active lockout.
    ///
    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub async fn force_unlock(&self, claims: &Claims, target: Uuid) -> Result<(), AuthError> {
        self.require_permission(claims, Permission::UserUpdate)?;
        self.store.clear_lockout(target).await?;
        info!(actor = %claims.sub, target = %target, "lockout force-cleared");
        Ok(())
    }

    /// Per-endpoint rate check for general API traffic.
    ///
    /// # Errors
    /// `RateLimited`.
    pub fn guard_api(&self, client_key: &str) -> Result<(), AuthError> {
        self.check_rate(client_key, EndpointClass::Api)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn issue_pair(
        &self,
        user: &UserRecord,
        fingerprint: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let secret =
            generate_opaque_secret().map_err(|err| AuthError::Unavailable(err.to_string()))?;
        let root = RefreshRecord::root(
            user.id,
            hash_secret(&secret),
            self.policy.refresh_ttl_seconds(),
            fingerprint,
            now,
        );
        let chain_id = root.chain_id;
        self.store.insert_refresh_root(root).await?;

        let (access_token, _) = self.issuer.mint(user.id, user.role, chain_id, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token: secret,
            expires_in: self.issuer.access_ttl_seconds(),
        })
    }

    fn check_rate(&self, key: &str, class: EndpointClass) -> Result<(), AuthError> {
        match self.limiter.check(key, class) {
            RateDecision::Allowed => Ok(()),
            RateDecision::Limited {
                retry_after_seconds,
            } => Err(AuthError::RateLimited {
                retry_after_seconds,
            }),
        }
    }

    fn require_permission(&self, claims: &Claims, permission: Permission) -> Result<(), AuthError> {
        if authorize(&self.registry.load(), &claims_context(claims), permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    async fn require_user(&self, id: Uuid) -> Result<UserRecord, AuthError> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or(AuthError::NotFound)
    }
}

fn claims_context(claims: &Claims) -> AccessContext {
    AccessContext::for_role(claims.role)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let valid = USERNAME_REGEX
        .as_ref()
        .is_some_and(|re| re.is_match(username));
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "username must be 3-32 characters of letters, digits, '_' or '-'".into(),
        ))
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let normalized = normalize_email(email);
    let valid = EMAIL_REGEX
        .as_ref()
        .is_some_and(|re| re.is_match(&normalized));
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("invalid email address".into()))
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation_bounds() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice with spaces").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn email_validation_normalizes_first() {
        assert!(validate_email(" Alice@Example.COM ").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing-domain@").is_err());
    }

    #[test]
    fn password_validation_bounds() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }
}
