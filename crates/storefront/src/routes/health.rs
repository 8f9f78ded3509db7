//! Health check endpoint.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::state::AppState;

/// Health response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub smtp_configured: bool,
    pub email_verification_enabled: bool,
}

/// `GET /health`
///
/// Verifies the process is `Ready` and the database answers a round-trip
/// before reporting healthy. Reports the effective SMTP and verification
/// configuration so operators can confirm a deployment at a glance.
pub async fn health(State(state): State<AppState>) -> Response {
    let db_ok = match state.ensure_ready().await {
        Ok(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
        Err(_) => false,
    };

    if !db_ok {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "ok": false,
                "message": "Database connection failed."
            })),
        )
            .into_response();
    }

    Json(HealthResponse {
        ok: true,
        smtp_configured: state.mailer().is_smtp(),
        email_verification_enabled: state.config().email_verification_enabled,
    })
    .into_response()
}
