//! Database operations for the storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `users` - the sole persisted table: credentials plus email-verification
//!   state (see [`schema`])
//!
//! The schema is bootstrapped in-process at startup rather than by offline
//! migrations; see [`schema::ensure_users_schema`]. Every statement it runs
//! is idempotent, so concurrent cold starts are safe.

pub mod schema;
pub mod users;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use users::UserRepository;

use crate::config::StorefrontConfig;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation. Carries which field collided.
    #[error("constraint violation on {0:?}")]
    Conflict(ConflictField),
}

/// Which unique field a conflicting insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
}

/// Create a `PostgreSQL` connection pool sized from configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &StorefrontConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .min_connections(2)
        .acquire_timeout(config.db.acquire_timeout)
        .connect(config.database_url.expose_secret())
        .await
}
