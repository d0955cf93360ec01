//! Map validated CLI matches to the action to execute.

use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the DSN is not a
/// postgres URL.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let parsed = Url::parse(&dsn).context("invalid DSN")?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        anyhow::bail!("DSN must be a postgres:// URL");
    }

    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        access_ttl_seconds: matches.get_one::<i64>("access-ttl").copied().unwrap_or(3600),
        refresh_ttl_seconds: matches
            .get_one::<i64>("refresh-ttl")
            .copied()
            .unwrap_or(2_592_000),
        lockout_threshold: matches
            .get_one::<u32>("lockout-threshold")
            .copied()
            .unwrap_or(5),
        lockout_seconds: matches
            .get_one::<i64>("lockout-seconds")
            .copied()
            .unwrap_or(1800),
        password_cost: matches
            .get_one::<u32>("password-cost")
            .copied()
            .unwrap_or(bcrypt::DEFAULT_COST),
        login_rate_limit: matches
            .get_one::<u32>("login-rate-limit")
            .copied()
            .unwrap_or(10),
        refresh_rate_limit: matches
            .get_one::<u32>("refresh-rate-limit")
            .copied()
            .unwrap_or(30),
        api_rate_limit: matches
            .get_one::<u32>("api-rate-limit")
            .copied()
            .unwrap_or(120),
        rate_window_seconds: matches
            .get_one::<u64>("rate-window-seconds")
            .copied()
            .unwrap_or(60),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action_from_matches() -> Result<()> {
        let matches = crate::cli::commands::new().try_get_matches_from(vec![
            "keyward",
            "--dsn",
            "postgres://localhost:5432/keyward",
            "--jwt-secret",
            "super-secret",
            "--access-ttl",
            "120",
        ])?;

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 8080);
        assert_eq!(args.dsn, "postgres://localhost:5432/keyward");
        assert_eq!(args.jwt_secret.expose_secret(), "super-secret");
        assert_eq!(args.access_ttl_seconds, 120);
        assert_eq!(args.lockout_threshold, 5);
        Ok(())
    }

    #[test]
    fn rejects_non_postgres_dsn() -> Result<()> {
        let matches = crate::cli::commands::new().try_get_matches_from(vec![
            "keyward",
            "--dsn",
            "mysql://localhost/keyward",
            "--jwt-secret",
            "secret",
        ])?;

        assert!(handler(&matches).is_err());
        Ok(())
    }
}
