//! Refresh-chain records and their state machine.
//!
//! A chain is the lineage produced by successive rotations from one login.
//! States per record:
//!
//! - `Current`: unused, valid; at most one per chain.
//! - `Superseded`: rotated away but still recorded. Presenting it again is a
//!   reuse event and revokes the whole chain.
//! - `Revoked`: explicit revocation (logout, revoke-all, reuse response).
//!
//! Expiry is derived from `expires_at` rather than stored as a state, so a
//! record never needs a background sweep to become invalid.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Current,
    Superseded,
    Revoked,
}

impl RefreshState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RefreshState::Current => "current",
            RefreshState::Superseded => "superseded",
            RefreshState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(RefreshState::Current),
            "superseded" => Ok(RefreshState::Superseded),
            "revoked" => Ok(RefreshState::Revoked),
            other => Err(format!("unknown refresh state: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 hex of the opaque secret. The plaintext is never stored.
    pub token_hash: String,
    /// `None` for the chain root.
    pub parent_id: Option<Uuid>,
    pub state: RefreshState,
    pub issued_at: DateTime<Utc>,
    /// Fixed at the chain root; rotation does not extend it.
    pub expires_at: DateTime<Utc>,
    pub fingerprint: Option<String>,
}

impl RefreshRecord {
    /// Root a new chain. The chain id doubles as the session id carried in
    /// access-token claims.
    #[must_use]
    pub fn root(
        user_id: Uuid,
        token_hash: String,
        ttl_seconds: i64,
        fingerprint: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id: Uuid::new_v4(),
            user_id,
            token_hash,
            parent_id: None,
            state: RefreshState::Current,
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            fingerprint,
        }
    }

    /// Derive the successor record for a rotation. The child inherits the
    /// chain id, fingerprint, and the root's expiry.
    #[must_use]
    pub fn child_of(parent: &RefreshRecord, token_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id: parent.chain_id,
            user_id: parent.user_id,
            token_hash,
            parent_id: Some(parent.id),
            state: RefreshState::Current,
            issued_at: now,
            expires_at: parent.expires_at,
            fingerprint: parent.fingerprint.clone(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
