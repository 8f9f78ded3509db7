//! Application state shared across handlers.
//!
//! The state owns the process lifecycle: configuration and the mailer are
//! built eagerly at construction, while the database pool and schema
//! bootstrap live behind a single `ensure_ready` guard so concurrent first
//! requests await one in-flight initialization instead of racing to create
//! their own.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::StorefrontConfig;
use crate::db::{self, RepositoryError};
use crate::services::email::{EmailError, Mailer};

/// Errors raised while bringing the process to `Ready`.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The database pool could not be established.
    #[error("database connection failed: {0}")]
    Pool(#[source] sqlx::Error),

    /// The users schema could not be bootstrapped.
    #[error("schema bootstrap failed: {0}")]
    Schema(#[from] RepositoryError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    mailer: Mailer,
    runtime: OnceCell<Runtime>,
}

/// The `Ready` half of the lifecycle: resources that exist only after a
/// successful initialization.
struct Runtime {
    pool: PgPool,
}

impl AppState {
    /// Create the application state. The database is not touched yet;
    /// that happens on the first [`ensure_ready`](Self::ensure_ready).
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the configured SMTP relay parameters are
    /// unusable.
    pub fn new(config: StorefrontConfig) -> Result<Self, EmailError> {
        let mailer = Mailer::from_config(config.smtp.as_ref())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                mailer,
                runtime: OnceCell::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the email dispatcher.
    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    /// Bring the process to `Ready` and return the database pool.
    ///
    /// Idempotent: the first caller runs pool creation, the schema
    /// bootstrap, and a warn-only SMTP probe; concurrent callers await the
    /// same in-flight initialization. On failure the guard stays unarmed,
    /// so a later request retries instead of wedging the process.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` if the pool cannot be created or the schema
    /// bootstrap fails.
    pub async fn ensure_ready(&self) -> Result<&PgPool, StartupError> {
        let runtime = self
            .inner
            .runtime
            .get_or_try_init(|| async {
                let pool = db::create_pool(&self.inner.config).await.map_err(|e| {
                    tracing::error!(error = %e, "failed to connect to the database; check the connection URL, credentials, and host");
                    StartupError::Pool(e)
                })?;
                tracing::info!("database pool created");

                db::schema::ensure_users_schema(&pool).await?;
                tracing::info!("users schema ready");

                self.inner.mailer.check_connection().await;

                Ok::<Runtime, StartupError>(Runtime { pool })
            })
            .await?;

        Ok(&runtime.pool)
    }
}
