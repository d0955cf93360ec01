//! Password hashing via bcrypt with configurable cost.

use crate::auth::AuthError;

/// A well-formed bcrypt hash with no matching user. Verifying against it
/// keeps the latency of "unknown account" indistinguishable from "wrong
/// password", resisting timing-based account enumeration.
const DUMMY_HASH: &str = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// Hash a password.
///
/// # Errors
/// Returns `Unavailable` if hashing itself fails (never on bad input).
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost)
        .map_err(|err| AuthError::Unavailable(format!("password hashing failed: {err}")))
}

/// Verify a password against a stored hash.
///
/// # Errors
/// Returns `Unavailable` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash)
        .map_err(|err| AuthError::Unavailable(format!("password verification failed: {err}")))
}

/// Burn one verification for a login against a non-existent account.
pub fn burn_verification(password: &str) {
    let _ = bcrypt::verify(password, DUMMY_HASH);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost; keeps tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple", TEST_COST).expect("hash");
        assert!(verify_password("correct horse battery staple", &hash).expect("verify"));
        assert!(!verify_password("wrong password", &hash).expect("verify"));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same password", TEST_COST).expect("hash");
        let second = hash_password("same password", TEST_COST).expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_is_unavailable_not_denied() {
        let err = verify_password("password", "not-a-bcrypt-hash").unwrap_err();
        assert!(matches!(err, AuthError::Unavailable(_)));
    }

    #[test]
    fn dummy_hash_is_well_formed() {
        assert!(!verify_password("any input at all", DUMMY_HASH).expect("verify"));
        burn_verification("any input at all");
    }
}
