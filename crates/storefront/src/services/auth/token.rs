//! Verification token issuance.
//!
//! The raw token travels to the user as a URL parameter and is never
//! persisted; only its SHA-256 hash is stored. Verifying re-derives the
//! hash from the presented token and matches it against the column.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Presented tokens shorter than this are rejected without touching the
/// database; genuine tokens are 64 hex characters.
pub const MIN_PRESENTED_LENGTH: usize = 20;

/// Number of random bytes in a raw token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// A freshly issued verification token.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    /// The raw secret, hex-encoded. Returned to the caller for transmission
    /// and then discarded.
    pub raw: String,
    /// SHA-256 hash of the raw token, hex-encoded. This is what gets stored.
    pub hash: String,
    /// Absolute expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Issue a new token expiring `ttl` from now.
    #[must_use]
    pub fn issue(ttl: Duration) -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rand::rng().fill(bytes.as_mut_slice());

        let raw = hex::encode(bytes);
        let hash = hash_token(&raw);

        Self {
            raw,
            hash,
            expires_at: Utc::now() + ttl,
        }
    }
}

/// Hash a presented raw token the same way issuance does.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
