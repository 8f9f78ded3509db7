//! Idempotent schema bootstrap for the `users` table.
//!
//! Deployments that predate email verification have a `users` table without
//! the verification columns, so the bootstrap is additive: create the table
//! if absent, then add any missing column, then ensure the unique email
//! index. It never drops or narrows anything, and every statement tolerates
//! re-execution, so repeated invocation across restarts and concurrent cold
//! starts is safe.

use sqlx::PgPool;

use super::RepositoryError;

/// Statements run in order; each is individually idempotent.
const BOOTSTRAP_STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(32) NOT NULL UNIQUE,
        email VARCHAR(255),
        password_hash TEXT NOT NULL,
        is_verified BOOLEAN NOT NULL DEFAULT TRUE,
        verification_token_hash CHAR(64),
        verification_expires_at TIMESTAMPTZ,
        email_verified_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    // Columns added after the table first shipped; no-ops on fresh installs.
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS email VARCHAR(255)",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS is_verified BOOLEAN NOT NULL DEFAULT TRUE",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS verification_token_hash CHAR(64)",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS verification_expires_at TIMESTAMPTZ",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS email_verified_at TIMESTAMPTZ",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email)",
];

/// Ensure the `users` table, its columns, and the unique email index exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` only on unrecoverable database
/// errors; "already exists" conditions are absorbed by the `IF NOT EXISTS`
/// guards.
pub async fn ensure_users_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    for statement in BOOTSTRAP_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::debug!("users schema bootstrap complete");
    Ok(())
}
