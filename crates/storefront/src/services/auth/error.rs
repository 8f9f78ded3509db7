//! Authentication error types.

use thiserror::Error;

use copperleaf_core::{EmailError, UsernameError};

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username failed shape validation.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Email failed shape validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password failed shape validation.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// Request body was missing required fields.
    #[error("invalid request body")]
    MalformedRequest,

    /// Username is already registered.
    #[error("username already taken")]
    UsernameTaken,

    /// Email is already registered.
    #[error("email already in use")]
    EmailTaken,

    /// Wrong username or password. Deliberately one variant for both cases
    /// so responses cannot be used to enumerate usernames.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login blocked until the email is verified.
    #[error("email verification required")]
    VerificationRequired {
        /// Masked email safe to show the caller.
        email_hint: String,
    },

    /// Account not found, or it has no email on file to verify. Conflated
    /// into one outcome on purpose.
    #[error("account not found")]
    NotFound,

    /// Account is already verified; nothing to resend.
    #[error("account already verified")]
    AlreadyVerified,

    /// Email verification is globally disabled.
    #[error("email verification is disabled")]
    VerificationDisabled,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
