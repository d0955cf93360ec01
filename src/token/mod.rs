//! Token minting and the refresh-chain state machine.

pub mod chain;
pub mod jwt;

pub use chain::{RefreshRecord, RefreshState};
pub use jwt::{Claims, TokenIssuer};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Generate an opaque secret for refresh tokens and API keys.
///
/// The raw value is returned to the caller exactly once; the store only ever
/// sees its hash.
pub fn generate_opaque_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate opaque secret")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash an opaque secret for storage and lookup.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_decode_to_32_bytes() {
        let secret = generate_opaque_secret().expect("generate secret");
        let decoded = URL_SAFE_NO_PAD.decode(secret.as_bytes()).expect("decode");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn generated_secrets_are_unique() {
        let first = generate_opaque_secret().expect("generate secret");
        let second = generate_opaque_secret().expect("generate secret");
        assert_ne!(first, second);
    }

    #[test]
    fn hash_secret_is_stable_and_hex() {
        let first = hash_secret("token");
        assert_eq!(first, hash_secret("token"));
        assert_ne!(first, hash_secret("other"));
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
