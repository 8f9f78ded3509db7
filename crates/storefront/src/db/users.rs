//! User repository for database operations.
//!
//! All account state lives in the `users` table; the repository is the only
//! code that touches it. Queries are runtime-checked (`sqlx::query` with
//! binds) because the table is bootstrapped in-process rather than by
//! offline migrations.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use copperleaf_core::{Email, UserId, Username};

use super::{ConflictField, RepositoryError};
use crate::models::AuthUser;

/// A row matched by the registration conflict pre-check.
///
/// The caller compares these fields against the attempted registration to
/// report which one collided.
#[derive(Debug, Clone)]
pub struct ExistingAccount {
    /// Username of the existing account.
    pub username: String,
    /// Email of the existing account, if any.
    pub email: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find an account matching either the username or the email.
    ///
    /// Returns at most one row (first match wins); the caller disambiguates
    /// which field conflicted. This is only a pre-check for a friendly
    /// message — [`insert`](Self::insert) still trusts the database's unique
    /// constraints as the final arbiter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_username_or_email(
        &self,
        username: &Username,
        email: &Email,
    ) -> Result<Option<ExistingAccount>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT username, email
            FROM users
            WHERE username = $1 OR email = $2
            LIMIT 1
            ",
        )
        .bind(username.as_str())
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(ExistingAccount {
                username: r.try_get("username")?,
                email: r.try_get("email")?,
            })),
            None => Ok(None),
        }
    }

    /// Get an account with full auth fields by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<AuthUser>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, password_hash, is_verified
            FROM users
            WHERE username = $1
            LIMIT 1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(AuthUser {
                id: UserId::new(r.try_get("id")?),
                username: r.try_get("username")?,
                email: r.try_get("email")?,
                password_hash: r.try_get("password_hash")?,
                is_verified: r.try_get("is_verified")?,
            })),
            None => Ok(None),
        }
    }

    /// Insert a new account.
    ///
    /// When `verification` is `Some((token_hash, expires_at))` the account is
    /// created pending verification; when `None` it is created already
    /// verified (the feature is globally disabled).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming the colliding field if a
    /// unique constraint on username or email is violated — this is the
    /// race-safe serialization point for concurrent registrations.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(
        &self,
        username: &Username,
        email: &Email,
        password_hash: &str,
        verification: Option<(&str, DateTime<Utc>)>,
    ) -> Result<UserId, RepositoryError> {
        let (token_hash, expires_at) = match verification {
            Some((hash, expires)) => (Some(hash), Some(expires)),
            None => (None, None),
        };

        let row = sqlx::query(
            r"
            INSERT INTO users
                (username, email, password_hash, is_verified,
                 verification_token_hash, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(username.as_str())
        .bind(email.as_str())
        .bind(password_hash)
        .bind(verification.is_none())
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(UserId::new(row.try_get("id")?))
    }

    /// Overwrite the outstanding verification token for an account.
    ///
    /// Issuing a new token permanently invalidates the prior one, and the
    /// account is re-armed as unverified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_verification_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET verification_token_hash = $1,
                verification_expires_at = $2,
                is_verified = FALSE,
                email_verified_at = NULL
            WHERE id = $3
            ",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(id.as_i64())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Find the account holding an outstanding, unexpired token.
    ///
    /// Expiry is compared strictly (`>`) against the database clock, not the
    /// application server's. Consumed and superseded tokens never match
    /// because their hashes have been cleared or overwritten.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_active_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id
            FROM users
            WHERE verification_token_hash = $1
              AND is_verified = FALSE
              AND verification_expires_at IS NOT NULL
              AND verification_expires_at > NOW()
            LIMIT 1
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(UserId::new(r.try_get("id")?))),
            None => Ok(None),
        }
    }

    /// Mark an account verified: clear the token fields and stamp
    /// `email_verified_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET is_verified = TRUE,
                verification_token_hash = NULL,
                verification_expires_at = NULL,
                email_verified_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i64())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

/// Map a unique-constraint violation to a field-specific conflict.
fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let field = match db_err.constraint() {
            Some(name) if name.contains("email") => ConflictField::Email,
            _ => ConflictField::Username,
        };
        return RepositoryError::Conflict(field);
    }
    RepositoryError::Database(e)
}
