//! Integration test harness for the Copperleaf storefront.
//!
//! Each [`TestApp`] serves the full storefront router on an ephemeral port
//! against the database named by `TEST_DATABASE_URL` (or `DATABASE_URL`),
//! and hands back a `reqwest` client with redirects disabled so `Location`
//! headers can be asserted directly.
//!
//! # Running Tests
//!
//! The tests in `tests/` are `#[ignore]`d by default because they need a
//! reachable `PostgreSQL`:
//!
//! ```bash
//! TEST_DATABASE_URL=postgres://localhost/copperleaf_test \
//!     cargo test -p copperleaf-integration-tests -- --ignored
//! ```
//!
//! Accounts created by the tests use randomized usernames and emails, so
//! repeated runs against the same database do not collide.

use std::time::Duration;

use rand::Rng;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use copperleaf_storefront::config::{DbPoolConfig, StorefrontConfig};
use copperleaf_storefront::routes;
use copperleaf_storefront::state::AppState;

/// A storefront instance serving on an ephemeral local port.
pub struct TestApp {
    /// Base URL of the running server, e.g. `http://127.0.0.1:49152`.
    pub base_url: String,
    /// HTTP client with redirects disabled.
    pub client: reqwest::Client,
    database_url: String,
}

impl TestApp {
    /// Bind an ephemeral port and serve the storefront on it.
    ///
    /// # Panics
    ///
    /// Panics if no test database URL is configured or the server cannot
    /// be started; these tests only run when explicitly requested.
    pub async fn spawn(email_verification_enabled: bool) -> Self {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("set TEST_DATABASE_URL (or DATABASE_URL) to run integration tests");

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("Failed to bind an ephemeral port");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let config = StorefrontConfig {
            database_url: SecretString::from(database_url.clone()),
            host: addr.ip(),
            port: addr.port(),
            // Left unset so verification links exercise the Host-header
            // derivation, the same path a proxied deployment takes.
            base_url: None,
            db: DbPoolConfig {
                max_connections: 5,
                acquire_timeout: Duration::from_secs(10),
            },
            smtp: None,
            email_verification_enabled,
            verify_ttl_minutes: 60,
            sentry_dsn: None,
        };

        let state = AppState::new(config).expect("Failed to initialize application state");
        let app = axum::Router::new().merge(routes::routes()).with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("Failed to create HTTP client"),
            database_url,
        }
    }

    /// Absolute URL for a path on this instance.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Direct database handle for test fixtures (e.g. forcing token expiry).
    pub async fn pool(&self) -> PgPool {
        PgPoolOptions::new()
            .max_connections(2)
            .connect(&self.database_url)
            .await
            .expect("Failed to connect to the test database")
    }
}

/// A randomized identifier with the given prefix, unique per call.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let mut bytes = [0_u8; 6];
    rand::rng().fill(bytes.as_mut_slice());
    format!("{prefix}_{}", hex::encode(bytes))
}
