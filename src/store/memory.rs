//! In-memory store.
//!
//! One async mutex guards all maps, so every trait method is naturally a
//! single critical section. That is exactly the atomicity the rotation CAS
//! and the lockout counter need, at the cost of serializing writers — fine
//! for tests and single-node development.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ApiKeyRecord, AuthStore, FailureOutcome, NewUser, StoreError, UserRecord};
use crate::rbac::Role;
use crate::token::{RefreshRecord, RefreshState};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    refresh: HashMap<Uuid, RefreshRecord>,
    refresh_by_hash: HashMap<String, Uuid>,
    api_keys: HashMap<Uuid, ApiKeyRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(StoreError::Conflict("username already taken".to_string()));
        }
        if inner
            .users
            .values()
            .any(|existing| existing.email == user.email)
        {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }

        let record = UserRecord {
            id: Uuid::now_v7(),
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            password_hash: user.password_hash,
            role: user.role,
            failed_logins: 0,
            locked_until: None,
            active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<UserRecord>, StoreError> {
        // Emails are stored lowercased; accept any casing at login.
        let email = login.trim().to_lowercase();
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username == login || user.email == email)
            .cloned())
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;

        user.failed_logins += 1;
        if user.failed_logins >= threshold {
            user.failed_logins = 0;
            user.locked_until = Some(now + lockout);
            return Ok(FailureOutcome {
                failed_logins: 0,
                locked_until: user.locked_until,
            });
        }
        Ok(FailureOutcome {
            failed_logins: user.failed_logins,
            locked_until: None,
        })
    }

    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.failed_logins = 0;
        user.locked_until = None;
        user.last_login = Some(now);
        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.failed_logins = 0;
        user.locked_until = None;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role;
        Ok(())
    }

    async fn insert_refresh_root(&self, record: RefreshRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.refresh_by_hash.contains_key(&record.token_hash) {
            return Err(StoreError::Conflict("refresh hash collision".to_string()));
        }
        inner
            .refresh_by_hash
            .insert(record.token_hash.clone(), record.id);
        inner.refresh.insert(record.id, record);
        Ok(())
    }

    async fn refresh_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .refresh_by_hash
            .get(token_hash)
            .and_then(|id| inner.refresh.get(id))
            .cloned())
    }

    async fn rotate_refresh(
        &self,
        parent_id: Uuid,
        child: RefreshRecord,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;

        // CAS guard: only a record that is still current can be rotated.
        match inner.refresh.get(&parent_id) {
            Some(parent) if parent.state == RefreshState::Current => {}
            Some(_) => return Ok(false),
            None => return Err(StoreError::NotFound),
        }

        if let Some(parent) = inner.refresh.get_mut(&parent_id) {
            parent.state = RefreshState::Superseded;
        }
        inner
            .refresh_by_hash
            .insert(child.token_hash.clone(), child.id);
        inner.refresh.insert(child.id, child);
        Ok(true)
    }

    async fn revoke_chain(&self, chain_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut changed = 0;
        for record in inner.refresh.values_mut() {
            if record.chain_id == chain_id && record.state != RefreshState::Revoked {
                record.state = RefreshState::Revoked;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn revoke_user_chains(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut changed = 0;
        for record in inner.refresh.values_mut() {
            if record.user_id == user_id && record.state != RefreshState::Revoked {
                record.state = RefreshState::Revoked;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<RefreshRecord> = inner
            .refresh
            .values()
            .filter(|record| {
                record.user_id == user_id
                    && record.state == RefreshState::Current
                    && !record.is_expired(now)
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|record| record.issued_at);
        Ok(sessions)
    }

    async fn insert_api_key(&self, key: ApiKeyRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .api_keys
            .values()
            .any(|existing| existing.secret_hash == key.secret_hash)
        {
            return Err(StoreError::Conflict("api key hash collision".to_string()));
        }
        inner.api_keys.insert(key.id, key);
        Ok(())
    }

    async fn api_key_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .api_keys
            .values()
            .find(|key| key.secret_hash == secret_hash)
            .cloned())
    }

    async fn api_keys_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut keys: Vec<ApiKeyRecord> = inner
            .api_keys
            .values()
            .filter(|key| key.user_id == user_id && !key.is_revoked())
            .cloned()
            .collect();
        keys.sort_by_key(|key| key.created_at);
        Ok(keys)
    }

    async fn revoke_api_key(
        &self,
        user_id: Uuid,
        key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.api_keys.get_mut(&key_id) {
            Some(key) if key.user_id == user_id => {
                if key.revoked_at.is_none() {
                    key.revoked_at = Some(now);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
