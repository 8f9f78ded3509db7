//! User domain types.

use copperleaf_core::UserId;

/// An account row with the fields needed to authenticate.
///
/// The email is kept as the raw column value: rows written before email
/// verification shipped may have no email at all, and masking tolerates
/// whatever is stored.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Unique account ID.
    pub id: UserId,
    /// Canonical username as stored at registration.
    pub username: String,
    /// Email address on file, if any.
    pub email: Option<String>,
    /// Argon2id PHC-string hash of the password.
    pub password_hash: String,
    /// Whether the email address has been verified.
    pub is_verified: bool,
}
