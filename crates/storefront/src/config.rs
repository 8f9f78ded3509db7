//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string; TLS requirements are carried in the URL's `sslmode` parameter
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `APP_BASE_URL` - Public URL used to build verification links; when unset
//!   the link is derived from forwarded request headers
//! - `DB_MAX_CONNECTIONS` - Connection pool size (default: 10)
//! - `DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout (default: 10)
//! - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USERNAME` / `SMTP_PASSWORD` /
//!   `SMTP_FROM` - Outbound mail; all of host, username, password and from
//!   must be present together, otherwise delivery falls back to logged links
//! - `EMAIL_VERIFICATION_ENABLED` - Feature flag (default: true)
//! - `EMAIL_VERIFY_TTL_MINUTES` - Verification token lifetime (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Default verification token lifetime in minutes.
const DEFAULT_VERIFY_TTL_MINUTES: i64 = 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error(
        "Incomplete SMTP configuration: {0} is set but {1} is missing \
         (set all of SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD, SMTP_FROM, or none)"
    )]
    PartialSmtp(&'static str, &'static str),
}

/// Storefront application configuration.
///
/// Built once at process start and injected into every component that needs
/// it; nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL (carries credentials)
    pub database_url: SecretString,
    /// Bind address
    pub host: IpAddr,
    /// Listen port
    pub port: u16,
    /// Public base URL used to build verification links, without a trailing
    /// slash. `None` means derive it from request headers.
    pub base_url: Option<String>,
    /// Connection pool sizing and timeouts
    pub db: DbPoolConfig,
    /// Outbound SMTP transport; `None` disables real delivery
    pub smtp: Option<SmtpConfig>,
    /// Whether the email verification feature is enabled at all
    pub email_verification_enabled: bool,
    /// Verification token lifetime in minutes
    pub verify_ttl_minutes: i64,
    /// Sentry DSN; error tracking is off when unset
    pub sentry_dsn: Option<String>,
}

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbPoolConfig {
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// How long to wait for a free connection before failing the request
    pub acquire_timeout: Duration,
}

/// SMTP transport configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port
    pub port: u16,
    /// SMTP authentication username
    pub username: String,
    /// SMTP authentication password
    pub password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from the environment, honoring a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// with messages naming the offending variable so an operator can fix
    /// the deployment without reading source.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine; deployments set real environment variables.
        let _ = dotenvy::dotenv();

        let database_url = env_database_url("STOREFRONT_DATABASE_URL")?;
        let host = env_or("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = env_parse::<u16>("STOREFRONT_PORT", 3000)?;
        let base_url = env_opt("APP_BASE_URL").map(|url| url.trim_end_matches('/').to_string());

        let db = DbPoolConfig {
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(env_parse("DB_ACQUIRE_TIMEOUT_SECS", 10)?),
        };

        let smtp = SmtpConfig::from_env()?;
        let email_verification_enabled = env_bool("EMAIL_VERIFICATION_ENABLED", true)?;
        let verify_ttl_minutes = env_parse("EMAIL_VERIFY_TTL_MINUTES", DEFAULT_VERIFY_TTL_MINUTES)?;
        if verify_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "EMAIL_VERIFY_TTL_MINUTES".to_string(),
                "must be a positive number of minutes".to_string(),
            ));
        }
        let sentry_dsn = env_opt("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            db,
            smtp,
            email_verification_enabled,
            verify_ttl_minutes,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Verification token lifetime as a `chrono::Duration`.
    #[must_use]
    pub fn verify_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.verify_ttl_minutes)
    }
}

impl SmtpConfig {
    /// Load SMTP configuration, treating a fully absent block as disabled.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = env_opt("SMTP_HOST");
        let username = env_opt("SMTP_USERNAME");
        let password = env_opt("SMTP_PASSWORD");
        let from_address = env_opt("SMTP_FROM");

        let present: &[(&'static str, bool)] = &[
            ("SMTP_HOST", host.is_some()),
            ("SMTP_USERNAME", username.is_some()),
            ("SMTP_PASSWORD", password.is_some()),
            ("SMTP_FROM", from_address.is_some()),
        ];

        let set = present.iter().find(|(_, p)| *p);
        let missing = present.iter().find(|(_, p)| !*p);

        match (set, missing) {
            // Nothing configured: delivery disabled, links are logged instead.
            (None, _) => Ok(None),
            // A typo'd deployment should fail loudly rather than silently
            // falling back to logged links.
            (Some((set_name, _)), Some((missing_name, _))) => {
                Err(ConfigError::PartialSmtp(set_name, missing_name))
            }
            (Some(_), None) => Ok(Some(Self {
                // All four are present per the check above.
                host: host.unwrap_or_default(),
                port: env_parse("SMTP_PORT", 587)?,
                username: username.unwrap_or_default(),
                password: SecretString::from(password.unwrap_or_default()),
                from_address: from_address.unwrap_or_default(),
            })),
        }
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

/// Database URL under the app-specific key, falling back to `DATABASE_URL`.
fn env_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Optional variable; empty or whitespace-only counts as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Variable with a string default.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a variable into `T`, defaulting when unset.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_opt(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Boolean variable accepting `true`/`false`/`1`/`0`, case-insensitive.
fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected true or false, got {other}"),
            )),
        },
    }
}
