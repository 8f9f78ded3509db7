//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! POST /register             - Create an account (JSON)
//! POST /login                - Authenticate (JSON)
//! POST /resend-verification  - Reissue the verification token (JSON)
//! GET  /verify?token=        - Consume a verification link (redirects)
//! GET  /health               - Health check (JSON)
//! ```
//!
//! Every auth route is also mounted under `/auth` and `/api/auth`, and the
//! health check under `/api/health`, for compatibility with clients built
//! against earlier deployments. Static assets (the storefront pages and the
//! client-side cart) are served from `public/` as the router fallback.

pub mod auth;
pub mod health;

use axum::{Router, routing::get};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Build the storefront router.
pub fn routes() -> Router<AppState> {
    let auth_routes = auth::router();

    Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .merge(auth_routes.clone())
        .nest("/auth", auth_routes.clone())
        .nest("/api/auth", auth_routes)
        .fallback_service(ServeDir::new("public"))
}
