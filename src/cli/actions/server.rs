use crate::abuse::{FixedWindowLimiter, LockoutPolicy, WindowConfig};
use crate::api;
use crate::auth::{AuthPolicy, AuthService};
use crate::rbac::RoleRegistry;
use crate::store::PgStore;
use crate::token::TokenIssuer;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub lockout_threshold: u32,
    pub lockout_seconds: i64,
    pub password_cost: u32,
    pub login_rate_limit: u32,
    pub refresh_rate_limit: u32,
    pub api_rate_limit: u32,
    pub rate_window_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, migrations fail, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    let issuer = TokenIssuer::new(
        args.jwt_secret.expose_secret().as_bytes(),
        args.access_ttl_seconds,
    );

    let window = Duration::from_secs(args.rate_window_seconds);
    let limiter = FixedWindowLimiter::new()
        .with_login(WindowConfig::new(args.login_rate_limit, window))
        .with_refresh(WindowConfig::new(args.refresh_rate_limit, window))
        .with_api(WindowConfig::new(args.api_rate_limit, window));

    let policy = AuthPolicy::new()
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
        .with_password_cost(args.password_cost)
        .with_lockout(
            LockoutPolicy::new()
                .with_threshold(args.lockout_threshold)
                .with_duration_seconds(args.lockout_seconds),
        );

    let service = AuthService::new(
        Arc::new(store),
        issuer,
        RoleRegistry::default(),
        Arc::new(limiter),
        policy,
    );

    api::serve(args.port, Arc::new(service)).await
}
