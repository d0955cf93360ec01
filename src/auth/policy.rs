//! Service policy: every tunable the engine recognizes, with the reference
//! defaults. The access/refresh TTL ratio matters: access tokens must
//! self-expire quickly since they cannot be revoked, while refresh tokens
//! stay long enough to avoid forcing frequent re-authentication.

use crate::abuse::LockoutPolicy;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    lockout: LockoutPolicy,
    password_cost: u32,
}

impl AuthPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            lockout: LockoutPolicy::new(),
            password_cost: bcrypt::DEFAULT_COST,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    #[must_use]
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn lockout(&self) -> LockoutPolicy {
        self.lockout
    }

    #[must_use]
    pub fn password_cost(&self) -> u32 {
        self.password_cost
    }
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let policy = AuthPolicy::new();
        assert_eq!(policy.access_ttl_seconds(), 60 * 60);
        assert_eq!(policy.refresh_ttl_seconds(), 30 * 24 * 60 * 60);
        assert_eq!(policy.password_cost(), bcrypt::DEFAULT_COST);
        assert_eq!(policy.lockout().threshold(), 5);
    }

    #[test]
    fn access_ttl_stays_well_below_refresh_ttl() {
        let policy = AuthPolicy::new();
        assert!(policy.access_ttl_seconds() * 24 <= policy.refresh_ttl_seconds());
    }

    #[test]
    fn builders_override_defaults() {
        let policy = AuthPolicy::new()
            .with_access_ttl_seconds(120)
            .with_refresh_ttl_seconds(600)
            .with_password_cost(4)
            .with_lockout(LockoutPolicy::new().with_threshold(2));
        assert_eq!(policy.access_ttl_seconds(), 120);
        assert_eq!(policy.refresh_ttl_seconds(), 600);
        assert_eq!(policy.password_cost(), 4);
        assert_eq!(policy.lockout().threshold(), 2);
    }
}
