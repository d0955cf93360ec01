//! Postgres store.
//!
//! Runtime sqlx queries; every statement runs inside a `db.query` span.
//! Infrastructure failures map to `StoreError::Unavailable` so callers never
//! mistake an outage for an authorization decision.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::Instrument;
use uuid::Uuid;

use super::{ApiKeyRecord, AuthStore, FailureOutcome, NewUser, StoreError, UserRecord};
use crate::rbac::{Permission, Role};
use crate::token::{RefreshRecord, RefreshState};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations.
    ///
    /// # Errors
    /// Returns `Unavailable` if the migration run fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migrations failed: {err}")))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn unavailable(err: &sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn query_span(operation: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation
    )
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, StoreError> {
    let role: String = row.get("role");
    let role = Role::from_str(&role).map_err(StoreError::Unavailable)?;
    let failed_logins: i32 = row.get("failed_logins");
    Ok(UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        role,
        failed_logins: u32::try_from(failed_logins).unwrap_or(0),
        locked_until: row.get("locked_until"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    })
}

fn refresh_from_row(row: &PgRow) -> Result<RefreshRecord, StoreError> {
    let state: String = row.get("state");
    let state = RefreshState::from_str(&state).map_err(StoreError::Unavailable)?;
    Ok(RefreshRecord {
        id: row.get("id"),
        chain_id: row.get("chain_id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        parent_id: row.get("parent_id"),
        state,
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
        fingerprint: row.get("fingerprint"),
    })
}

fn api_key_from_row(row: &PgRow) -> Result<ApiKeyRecord, StoreError> {
    let raw_scopes: Vec<String> = row.get("scopes");
    let mut scopes = BTreeSet::new();
    for scope in raw_scopes {
        let permission = Permission::from_str(&scope).map_err(StoreError::Unavailable)?;
        scopes.insert(permission);
    }
    let rate_limit_override: Option<i32> = row.get("rate_limit_override");
    Ok(ApiKeyRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        secret_hash: row.get("secret_hash"),
        scopes,
        created_at: row.get("created_at"),
        revoked_at: row.get("revoked_at"),
        rate_limit_override: rate_limit_override.and_then(|value| u32::try_from(value).ok()),
    })
}

#[async_trait]
impl AuthStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let query = r"
            INSERT INTO users (id, username, email, display_name, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, display_name, password_hash, role,
                      failed_logins, locked_until, active, created_at, last_login
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict("username or email already registered".to_string())
                } else {
                    unavailable(&err)
                }
            })?;
        user_from_row(&row)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let query = r"
            SELECT id, username, email, display_name, password_hash, role,
                   failed_logins, locked_until, active, created_at, last_login
            FROM users WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<UserRecord>, StoreError> {
        // Emails are stored lowercased; accept any casing at login.
        let query = r"
            SELECT id, username, email, display_name, password_hash, role,
                   failed_logins, locked_until, active, created_at, last_login
            FROM users WHERE username = $1 OR email = LOWER(TRIM($1))
        ";
        let row = sqlx::query(query)
            .bind(login)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, StoreError> {
        // Single statement so two concurrent failures cannot under-count.
        let query = r"
            UPDATE users SET
                failed_logins = CASE WHEN failed_logins + 1 >= $2 THEN 0
                                     ELSE failed_logins + 1 END,
                locked_until  = CASE WHEN failed_logins + 1 >= $2 THEN $3
                                     ELSE locked_until END
            WHERE id = $1
            RETURNING failed_logins, locked_until
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(i64::from(threshold))
            .bind(now + lockout)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?
            .ok_or(StoreError::NotFound)?;

        let failed_logins: i32 = row.get("failed_logins");
        let locked_until: Option<DateTime<Utc>> = row.get("locked_until");
        Ok(FailureOutcome {
            failed_logins: u32::try_from(failed_logins).unwrap_or(0),
            locked_until: locked_until.filter(|until| *until > now),
        })
    }

    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let query = r"
            UPDATE users
            SET failed_logins = 0, locked_until = NULL, last_login = $2
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE users SET failed_logins = 0, locked_until = NULL WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), StoreError> {
        let query = "UPDATE users SET role = $2 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_refresh_root(&self, record: RefreshRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO refresh_tokens
                (id, chain_id, user_id, token_hash, parent_id, state,
                 issued_at, expires_at, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        sqlx::query(query)
            .bind(record.id)
            .bind(record.chain_id)
            .bind(record.user_id)
            .bind(&record.token_hash)
            .bind(record.parent_id)
            .bind(record.state.as_str())
            .bind(record.issued_at)
            .bind(record.expires_at)
            .bind(&record.fingerprint)
            .execute(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict("refresh hash collision".to_string())
                } else {
                    unavailable(&err)
                }
            })?;
        Ok(())
    }

    async fn refresh_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let query = r"
            SELECT id, chain_id, user_id, token_hash, parent_id, state,
                   issued_at, expires_at, fingerprint
            FROM refresh_tokens WHERE token_hash = $1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        row.as_ref().map(refresh_from_row).transpose()
    }

    async fn rotate_refresh(
        &self,
        parent_id: Uuid,
        child: RefreshRecord,
    ) -> Result<bool, StoreError> {
        // Child first, conditional parent flip last; a cancelled request can
        // roll back but never leave a chain without a current record.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| unavailable(&err))?;

        let insert = r"
            INSERT INTO refresh_tokens
                (id, chain_id, user_id, token_hash, parent_id, state,
                 issued_at, expires_at, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        sqlx::query(insert)
            .bind(child.id)
            .bind(child.chain_id)
            .bind(child.user_id)
            .bind(&child.token_hash)
            .bind(child.parent_id)
            .bind(child.state.as_str())
            .bind(child.issued_at)
            .bind(child.expires_at)
            .bind(&child.fingerprint)
            .execute(&mut *tx)
            .instrument(query_span("INSERT"))
            .await
            .map_err(|err| unavailable(&err))?;

        // The CAS: flip only if the parent is still current.
        let flip = r"
            UPDATE refresh_tokens SET state = 'superseded'
            WHERE id = $1 AND state = 'current'
        ";
        let result = sqlx::query(flip)
            .bind(parent_id)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(|err| unavailable(&err))?;
            return Ok(false);
        }
        tx.commit().await.map_err(|err| unavailable(&err))?;
        Ok(true)
    }

    async fn revoke_chain(&self, chain_id: Uuid) -> Result<u64, StoreError> {
        let query = r"
            UPDATE refresh_tokens SET state = 'revoked'
            WHERE chain_id = $1 AND state <> 'revoked'
        ";
        let result = sqlx::query(query)
            .bind(chain_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        Ok(result.rows_affected())
    }

    async fn revoke_user_chains(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let query = r"
            UPDATE refresh_tokens SET state = 'revoked'
            WHERE user_id = $1 AND state <> 'revoked'
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        Ok(result.rows_affected())
    }

    async fn active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshRecord>, StoreError> {
        let query = r"
            SELECT id, chain_id, user_id, token_hash, parent_id, state,
                   issued_at, expires_at, fingerprint
            FROM refresh_tokens
            WHERE user_id = $1 AND state = 'current' AND expires_at > $2
            ORDER BY issued_at
        ";
        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        rows.iter().map(refresh_from_row).collect()
    }

    async fn insert_api_key(&self, key: ApiKeyRecord) -> Result<(), StoreError> {
        let scopes: Vec<String> = key
            .scopes
            .iter()
            .map(|scope| scope.as_str().to_string())
            .collect();
        let rate_limit_override = key
            .rate_limit_override
            .and_then(|value| i32::try_from(value).ok());
        let query = r"
            INSERT INTO api_keys
                (id, user_id, secret_hash, scopes, created_at, revoked_at, rate_limit_override)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        sqlx::query(query)
            .bind(key.id)
            .bind(key.user_id)
            .bind(&key.secret_hash)
            .bind(&scopes)
            .bind(key.created_at)
            .bind(key.revoked_at)
            .bind(rate_limit_override)
            .execute(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict("api key hash collision".to_string())
                } else {
                    unavailable(&err)
                }
            })?;
        Ok(())
    }

    async fn api_key_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let query = r"
            SELECT id, user_id, secret_hash, scopes, created_at, revoked_at, rate_limit_override
            FROM api_keys WHERE secret_hash = $1
        ";
        let row = sqlx::query(query)
            .bind(secret_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn api_keys_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let query = r"
            SELECT id, user_id, secret_hash, scopes, created_at, revoked_at, rate_limit_override
            FROM api_keys
            WHERE user_id = $1 AND revoked_at IS NULL
            ORDER BY created_at
        ";
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .map_err(|err| unavailable(&err))?;
        rows.iter().map(api_key_from_row).collect()
    }

    async fn revoke_api_key(
        &self,
        user_id: Uuid,
        key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let query = r"
            UPDATE api_keys SET revoked_at = COALESCE(revoked_at, $3)
            WHERE id = $1 AND user_id = $2
        ";
        let result = sqlx::query(query)
            .bind(key_id)
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .map_err(|err| unavailable(&err))?;
        Ok(result.rows_affected() > 0)
    }
}
