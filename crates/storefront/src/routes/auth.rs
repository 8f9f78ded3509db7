//! Authentication route handlers.
//!
//! JSON request/response bodies throughout, except `GET /verify`: it is
//! reached from an emailed link, so every outcome — including failure — is
//! a redirect to the login page with a `verified` query parameter.

use axum::{
    Json, Router,
    extract::{Query, State},
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::Redirect,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::services::auth::{AuthError, AuthService, VerifyOutcome};
use crate::state::AppState;

/// Routes served under `/`, `/auth`, and `/api/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/resend-verification", post(resend_verification))
        .route("/verify", get(verify))
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
///
/// Fields are optional so a missing field maps to the same friendly
/// 400 as any other malformed body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resend-verification request body.
#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub username: Option<String>,
}

/// Verify query parameters.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// How the verification email left the building.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailDelivery {
    /// Handed to the SMTP transport.
    Delivered,
    /// No transport, or the send failed; the link is in the response.
    Fallback,
}

/// Registration response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub requires_email_verification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_delivery: Option<EmailDelivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_verification_link: Option<String>,
}

/// Login response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
}

/// Resend-verification response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_verification_link: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /register`
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: core::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let Json(body) = body.map_err(|_| AuthError::MalformedRequest)?;
    let (Some(username), Some(password), Some(email)) =
        (body.username, body.password, body.email)
    else {
        return Err(AuthError::MalformedRequest.into());
    };

    let pool = state.ensure_ready().await?;
    let base_url = request_base_url(state.config(), &headers);

    let registration = AuthService::new(pool, state.config(), state.mailer())
        .register(&username, &password, &email, &base_url)
        .await?;

    let response = match registration.dispatch {
        None => RegisterResponse {
            message: "Registration successful. You can sign in now.".to_string(),
            requires_email_verification: false,
            email_delivery: None,
            dev_verification_link: None,
        },
        Some(dispatch) if dispatch.delivered => RegisterResponse {
            message: "Registration successful. A verification link was sent to your email."
                .to_string(),
            requires_email_verification: true,
            email_delivery: Some(EmailDelivery::Delivered),
            dev_verification_link: None,
        },
        Some(dispatch) => RegisterResponse {
            message: "Registration successful. Email delivery is unavailable; \
                      use the verification link provided."
                .to_string(),
            requires_email_verification: true,
            email_delivery: Some(EmailDelivery::Fallback),
            dev_verification_link: Some(dispatch.verification_link),
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /login`
async fn login(
    State(state): State<AppState>,
    body: core::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = body.map_err(|_| AuthError::MalformedRequest)?;
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(AuthError::MalformedRequest.into());
    };

    let pool = state.ensure_ready().await?;
    let username = AuthService::new(pool, state.config(), state.mailer())
        .login(&username, &password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful.".to_string(),
        username,
    }))
}

/// `POST /resend-verification`
async fn resend_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: core::result::Result<Json<ResendRequest>, JsonRejection>,
) -> Result<Json<ResendResponse>> {
    let Json(body) = body.map_err(|_| AuthError::MalformedRequest)?;
    let Some(username) = body.username else {
        return Err(AuthError::MalformedRequest.into());
    };

    let pool = state.ensure_ready().await?;
    let base_url = request_base_url(state.config(), &headers);

    let dispatch = AuthService::new(pool, state.config(), state.mailer())
        .resend_verification(&username, &base_url)
        .await?;

    let response = if dispatch.delivered {
        ResendResponse {
            message: "A new verification link was sent to your email.".to_string(),
            dev_verification_link: None,
        }
    } else {
        ResendResponse {
            message: "Email delivery is unavailable; use the verification link provided."
                .to_string(),
            dev_verification_link: Some(dispatch.verification_link),
        }
    };

    Ok(Json(response))
}

/// `GET /verify?token=`
///
/// Never answers with JSON: success and failure alike redirect back to the
/// login page, which renders the outcome from the query parameter.
async fn verify(
    State(state): State<AppState>,
    query: core::result::Result<Query<VerifyQuery>, QueryRejection>,
) -> Redirect {
    // A query string that fails to parse must still redirect, never answer
    // with axum's plain-text rejection.
    let Ok(Query(query)) = query else {
        return verified_redirect("invalid");
    };
    let token = query.token.unwrap_or_default();

    let pool = match state.ensure_ready().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "verify failed during startup");
            return verified_redirect("error");
        }
    };

    match AuthService::new(pool, state.config(), state.mailer())
        .verify_email(&token)
        .await
    {
        Ok(outcome) => verified_redirect(outcome_label(outcome)),
        Err(e) => {
            sentry::capture_error(&e);
            tracing::error!(error = %e, "verify failed");
            verified_redirect("error")
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Redirect to the auth landing page with a `verified` outcome.
fn verified_redirect(outcome: &str) -> Redirect {
    Redirect::to(&format!("/auth.html?mode=login&verified={outcome}"))
}

const fn outcome_label(outcome: VerifyOutcome) -> &'static str {
    match outcome {
        VerifyOutcome::Success => "success",
        VerifyOutcome::Invalid => "invalid",
        VerifyOutcome::Expired => "expired",
    }
}

/// Resolve the base URL used to build verification links.
///
/// Prefers the configured `APP_BASE_URL`; behind a proxy, falls back to the
/// forwarded headers, then the `Host` header, then localhost.
fn request_base_url(config: &StorefrontConfig, headers: &HeaderMap) -> String {
    if let Some(base) = &config.base_url {
        return base.clone();
    }

    let proto = header_first_value(headers, "x-forwarded-proto").unwrap_or_else(|| "http".to_string());

    let host = header_first_value(headers, "x-forwarded-host")
        .or_else(|| header_first_value(headers, header::HOST.as_str()));

    match host {
        Some(host) => format!("{proto}://{host}"),
        None => format!("http://localhost:{}", config.port),
    }
}

/// First comma-separated value of a header, trimmed; `None` if absent or empty.
fn header_first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{DbPoolConfig, StorefrontConfig};
    use secrecy::SecretString;
    use std::time::Duration;

    fn test_config(base_url: Option<&str>) -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: base_url.map(ToString::to_string),
            db: DbPoolConfig {
                max_connections: 10,
                acquire_timeout: Duration::from_secs(10),
            },
            smtp: None,
            email_verification_enabled: true,
            verify_ttl_minutes: 60,
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_base_url_prefers_config() {
        let config = test_config(Some("https://shop.example.com"));
        let mut headers = HeaderMap::new();
        headers.insert("host", "ignored.example.com".parse().unwrap());

        assert_eq!(
            request_base_url(&config, &headers),
            "https://shop.example.com"
        );
    }

    #[test]
    fn test_base_url_from_forwarded_headers() {
        let config = test_config(None);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", "https, http".parse().unwrap());
        headers.insert(
            "x-forwarded-host",
            "shop.example.com, internal".parse().unwrap(),
        );

        assert_eq!(
            request_base_url(&config, &headers),
            "https://shop.example.com"
        );
    }

    #[test]
    fn test_base_url_from_host_header() {
        let config = test_config(None);
        let mut headers = HeaderMap::new();
        headers.insert("host", "localhost:3000".parse().unwrap());

        assert_eq!(request_base_url(&config, &headers), "http://localhost:3000");
    }

    #[test]
    fn test_base_url_fallback_is_localhost() {
        let config = test_config(None);
        let headers = HeaderMap::new();

        assert_eq!(request_base_url(&config, &headers), "http://localhost:3000");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(VerifyOutcome::Success), "success");
        assert_eq!(outcome_label(VerifyOutcome::Invalid), "invalid");
        assert_eq!(outcome_label(VerifyOutcome::Expired), "expired");
    }

    #[tokio::test]
    async fn test_verify_unparseable_query_redirects_invalid() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let state = AppState::new(test_config(None)).unwrap();
        let app = router().with_state(state);

        // A duplicated parameter fails deserialization; the endpoint must
        // still answer with a redirect, never a plain-text 400.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/verify?token=a&token=b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/auth.html?mode=login&verified=invalid"
        );
    }
}
