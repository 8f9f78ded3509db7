//! Authentication service.
//!
//! Owns the register / login / resend / verify flows and the account's
//! verification state machine: accounts are created `VERIFIED` when the
//! feature is globally disabled, otherwise `PENDING_VERIFICATION` until a
//! valid token is presented. `VERIFIED` is terminal.

mod error;
pub mod token;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use copperleaf_core::{Email, Username, mask_email};

use crate::config::StorefrontConfig;
use crate::db::users::UserRepository;
use crate::db::{ConflictField, RepositoryError};
use crate::services::email::{Dispatch, Mailer};
use token::{MIN_PRESENTED_LENGTH, VerificationToken, hash_token};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;
/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 72;

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registration {
    /// Whether the account must verify its email before logging in.
    pub requires_verification: bool,
    /// Dispatch outcome when a verification email was attempted.
    pub dispatch: Option<Dispatch>,
}

/// Outcome of presenting a verification token.
///
/// `Expired` deliberately conflates "wrong token", "already used" and
/// "time-expired" so the response leaks nothing about which case applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Account transitioned to verified.
    Success,
    /// Token was malformed (too short to ever be genuine).
    Invalid,
    /// No account holds this token unconsumed and unexpired.
    Expired,
}

/// Authentication service.
///
/// Stateless per-request: all authoritative state lives in the database.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    config: &'a StorefrontConfig,
    mailer: &'a Mailer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a StorefrontConfig, mailer: &'a Mailer) -> Self {
        Self {
            users: UserRepository::new(pool),
            config,
            mailer,
        }
    }

    /// Register a new account.
    ///
    /// The token write is durable before dispatch is attempted, and dispatch
    /// failure degrades the outcome rather than failing the registration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input, `UsernameTaken` /
    /// `EmailTaken` on conflict (the database's unique constraints are the
    /// final arbiter under concurrency), or `Repository` on database
    /// failure.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        base_url: &str,
    ) -> Result<Registration, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let email = Email::parse(email)?;

        // Pre-check for a friendly, field-specific message. Races with a
        // concurrent registration are caught by the unique constraints on
        // insert below.
        if let Some(existing) = self
            .users
            .find_by_username_or_email(&username, &email)
            .await?
        {
            if existing.username == username.as_str() {
                return Err(AuthError::UsernameTaken);
            }
            if existing.email.as_deref() == Some(email.as_str()) {
                return Err(AuthError::EmailTaken);
            }
        }

        let password_hash = hash_password(password)?;

        if !self.config.email_verification_enabled {
            self.users
                .insert(&username, &email, &password_hash, None)
                .await
                .map_err(map_conflict)?;

            return Ok(Registration {
                requires_verification: false,
                dispatch: None,
            });
        }

        let token = VerificationToken::issue(self.config.verify_ttl());
        self.users
            .insert(
                &username,
                &email,
                &password_hash,
                Some((&token.hash, token.expires_at)),
            )
            .await
            .map_err(map_conflict)?;

        let link = verification_link(base_url, &token.raw);
        let dispatch = self
            .mailer
            .send_verification(
                email.as_str(),
                username.as_str(),
                &link,
                self.config.verify_ttl_minutes,
            )
            .await;

        Ok(Registration {
            requires_verification: true,
            dispatch: Some(dispatch),
        })
    }

    /// Log in with username and password, returning the canonical username.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for both an unknown username and a wrong
    /// password (anti-enumeration), and `VerificationRequired` with a masked
    /// email hint when the account is still pending verification.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;

        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        if self.config.email_verification_enabled && !user.is_verified {
            return Err(AuthError::VerificationRequired {
                email_hint: user.email.as_deref().map(mask_email).unwrap_or_default(),
            });
        }

        Ok(user.username)
    }

    /// Issue a fresh verification token and re-dispatch the email.
    ///
    /// The fresh token overwrites the outstanding one, so any previously
    /// issued raw token becomes permanently unusable.
    ///
    /// # Errors
    ///
    /// Returns `VerificationDisabled` when the feature is globally off,
    /// `NotFound` when the account is missing or has no email on file, and
    /// `AlreadyVerified` when there is nothing to verify.
    pub async fn resend_verification(
        &self,
        username: &str,
        base_url: &str,
    ) -> Result<Dispatch, AuthError> {
        if !self.config.email_verification_enabled {
            return Err(AuthError::VerificationDisabled);
        }

        let username = Username::parse(username)?;

        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::NotFound)?;
        let Some(email) = user.email.clone() else {
            return Err(AuthError::NotFound);
        };

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let token = VerificationToken::issue(self.config.verify_ttl());
        self.users
            .set_verification_token(user.id, &token.hash, token.expires_at)
            .await?;

        let link = verification_link(base_url, &token.raw);
        Ok(self
            .mailer
            .send_verification(&email, &user.username, &link, self.config.verify_ttl_minutes)
            .await)
    }

    /// Consume a presented verification token.
    ///
    /// With verification globally disabled this always succeeds, so links
    /// issued before a deploy-time config flip still land somewhere sane.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure; token problems are
    /// reported through [`VerifyOutcome`], not errors.
    pub async fn verify_email(&self, raw_token: &str) -> Result<VerifyOutcome, AuthError> {
        if !self.config.email_verification_enabled {
            return Ok(VerifyOutcome::Success);
        }

        let raw_token = raw_token.trim();
        if raw_token.len() < MIN_PRESENTED_LENGTH {
            return Ok(VerifyOutcome::Invalid);
        }

        let token_hash = hash_token(raw_token);
        let Some(user_id) = self.users.find_by_active_token(&token_hash).await? else {
            return Ok(VerifyOutcome::Expired);
        };

        self.users.mark_verified(user_id).await?;
        Ok(VerifyOutcome::Success)
    }
}

/// Build the verification link carried in the email.
fn verification_link(base_url: &str, raw_token: &str) -> String {
    format!("{}/verify?token={raw_token}", base_url.trim_end_matches('/'))
}

/// Map a repository conflict to the field-specific auth error.
fn map_conflict(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(ConflictField::Username) => AuthError::UsernameTaken,
        RepositoryError::Conflict(ConflictField::Email) => AuthError::EmailTaken,
        other => AuthError::Repository(other),
    }
}

/// Validate password meets the shape requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::InvalidPassword(format!(
            "password must be {MIN_PASSWORD_LENGTH}-{MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"a".repeat(72)).is_ok());
        assert!(validate_password(&"a".repeat(73)).is_err());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("matrix1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("matrix1", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_garbage_hash() {
        assert!(matches!(
            verify_password("matrix1", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verification_link() {
        assert_eq!(
            verification_link("http://localhost:3000", "abc123"),
            "http://localhost:3000/verify?token=abc123"
        );
        // Trailing slashes never produce a double slash.
        assert_eq!(
            verification_link("https://shop.example.com/", "abc123"),
            "https://shop.example.com/verify?token=abc123"
        );
    }

    #[test]
    fn test_map_conflict() {
        assert!(matches!(
            map_conflict(RepositoryError::Conflict(ConflictField::Username)),
            AuthError::UsernameTaken
        ));
        assert!(matches!(
            map_conflict(RepositoryError::Conflict(ConflictField::Email)),
            AuthError::EmailTaken
        ));
        assert!(matches!(
            map_conflict(RepositoryError::NotFound),
            AuthError::Repository(RepositoryError::NotFound)
        ));
    }
}
