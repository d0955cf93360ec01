//! The persistence seam.
//!
//! `AuthStore` is the one trait the engine talks to. The in-memory
//! implementation backs tests and single-node development; the Postgres
//! implementation backs production. Every operation that must be atomic per
//! user or per chain (lockout increments, rotation) is a single trait method
//! so implementations can make it one critical section or one transaction.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

use crate::rbac::{Permission, Role};
use crate::token::RefreshRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation (duplicate username/email/hash).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    /// Infrastructure failure. Retryable by the caller; never an
    /// authorization decision.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub failed_logins: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Result of an atomic failed-login increment.
#[derive(Debug, Clone, Copy)]
pub struct FailureOutcome {
    pub failed_logins: u32,
    /// Set when this failure crossed the threshold and locked the account.
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret_hash: String,
    pub scopes: BTreeSet<Permission>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub rate_limit_override: Option<u32>,
}

impl ApiKeyRecord {
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    // Users
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
    /// Lookup by username or email.
    async fn user_by_login(&self, login: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Atomically bump the failed-login counter; lock the account when the
    /// counter reaches `threshold` and reset it.
    async fn record_login_failure(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, StoreError>;
    /// Reset the failure counter and stamp `last_login`.
    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;
    /// Admin force-clear of an active lockout.
    async fn clear_lockout(&self, id: Uuid) -> Result<(), StoreError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), StoreError>;

    // Refresh chains
    async fn insert_refresh_root(&self, record: RefreshRecord) -> Result<(), StoreError>;
    async fn refresh_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshRecord>, StoreError>;
    /// Rotation CAS: insert `child` and flip the parent `current →
    /// superseded` in one atomic step, guarded on the parent still being
    /// current. Returns `false` when another rotation won the race; the
    /// store is unchanged in that case.
    async fn rotate_refresh(
        &self,
        parent_id: Uuid,
        child: RefreshRecord,
    ) -> Result<bool, StoreError>;
    /// Revoke every record of one chain. Returns how many records changed
    /// state; zero means the chain was already fully revoked (idempotent).
    async fn revoke_chain(&self, chain_id: Uuid) -> Result<u64, StoreError>;
    /// Revoke every chain of a user. Idempotent.
    async fn revoke_user_chains(&self, user_id: Uuid) -> Result<u64, StoreError>;
    /// Non-revoked, non-expired `current` records for a user.
    async fn active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshRecord>, StoreError>;

    // API keys
    async fn insert_api_key(&self, key: ApiKeyRecord) -> Result<(), StoreError>;
    async fn api_key_by_hash(&self, secret_hash: &str)
        -> Result<Option<ApiKeyRecord>, StoreError>;
    async fn api_keys_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError>;
    /// Returns `false` when the key does not exist or belongs to another
    /// user; revoking an already-revoked key is a no-op success.
    async fn revoke_api_key(
        &self,
        user_id: Uuid,
        key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
