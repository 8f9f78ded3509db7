//! Unified error handling with Sentry integration.
//!
//! Every JSON handler returns `Result<T, AppError>`. The `IntoResponse`
//! impl maps the error taxonomy onto status codes and a `{message, ...}`
//! JSON body whose `message` is safe to display directly; server-side
//! errors are captured to Sentry and never leak detail to the client.
//!
//! The verify endpoint is the one exception: it is reached from an emailed
//! link, so it answers with redirects, never JSON (see `routes::auth`).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::state::StartupError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Process initialization failed.
    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body: `message` plus the extra fields some failures carry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    requires_email_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_hint: Option<String>,
}

impl ErrorBody {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_email_verification: None,
            email_hint: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, body) = match &self {
            Self::Auth(err) => auth_response(err),
            Self::Database(_) | Self::Startup(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::message("Server error."),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// Whether this error is the server's fault (reported to Sentry).
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Startup(_) | Self::Internal(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::Repository(_) | AuthError::PasswordHash
            ),
        }
    }
}

/// Map an auth error to its status code and displayable body.
fn auth_response(err: &AuthError) -> (StatusCode, ErrorBody) {
    match err {
        AuthError::InvalidUsername(e) => (StatusCode::BAD_REQUEST, ErrorBody::message(e.to_string())),
        AuthError::InvalidEmail(e) => (StatusCode::BAD_REQUEST, ErrorBody::message(e.to_string())),
        AuthError::InvalidPassword(msg) => (StatusCode::BAD_REQUEST, ErrorBody::message(msg.clone())),
        AuthError::MalformedRequest => (
            StatusCode::BAD_REQUEST,
            ErrorBody::message("Invalid request body."),
        ),
        AuthError::UsernameTaken => (
            StatusCode::CONFLICT,
            ErrorBody::message("This username is already taken."),
        ),
        AuthError::EmailTaken => (
            StatusCode::CONFLICT,
            ErrorBody::message("This email address is already in use."),
        ),
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::message("Invalid username or password."),
        ),
        AuthError::VerificationRequired { email_hint } => (
            StatusCode::FORBIDDEN,
            ErrorBody {
                message: "Check your email inbox to verify your account.".to_string(),
                requires_email_verification: Some(true),
                email_hint: Some(email_hint.clone()),
            },
        ),
        AuthError::NotFound => (
            StatusCode::NOT_FOUND,
            ErrorBody::message("Account not found."),
        ),
        AuthError::AlreadyVerified => (
            StatusCode::BAD_REQUEST,
            ErrorBody::message("This account is already verified."),
        ),
        AuthError::VerificationDisabled => (
            StatusCode::BAD_REQUEST,
            ErrorBody::message("Email verification is not enabled."),
        ),
        AuthError::PasswordHash | AuthError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::message("Server error."),
        ),
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
