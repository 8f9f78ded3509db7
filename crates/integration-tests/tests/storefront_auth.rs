//! Integration tests for the storefront auth flows.
//!
//! These tests require a reachable `PostgreSQL` named by `TEST_DATABASE_URL`
//! (or `DATABASE_URL`); each test serves its own storefront instance on an
//! ephemeral port. Run with:
//!
//! ```bash
//! cargo test -p copperleaf-integration-tests -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use copperleaf_integration_tests::{TestApp, unique};

/// Register an account and return the parsed response body.
async fn register(app: &TestApp, username: &str, email: &str) -> (StatusCode, Value) {
    let resp = app
        .client
        .post(app.url("/register"))
        .json(&json!({
            "username": username,
            "password": "hunter22",
            "email": email,
        }))
        .send()
        .await
        .expect("register request failed");

    let status = resp.status();
    let body = resp.json().await.expect("register response was not JSON");
    (status, body)
}

/// Attempt a login and return status + body.
async fn login(app: &TestApp, username: &str, password: &str) -> (StatusCode, Value) {
    let resp = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("login request failed");

    let status = resp.status();
    let body = resp.json().await.expect("login response was not JSON");
    (status, body)
}

/// Follow a verification link (redirects disabled) and return the
/// `verified` outcome from the Location header.
async fn verify_outcome(app: &TestApp, link: &str) -> String {
    let resp = app
        .client
        .get(link)
        .send()
        .await
        .expect("verify request failed");

    assert!(
        resp.status().is_redirection(),
        "verify must redirect, got {}",
        resp.status()
    );
    let location = resp.headers()["location"].to_str().unwrap();
    let (path, outcome) = location.split_once("verified=").expect("outcome in location");
    assert!(path.starts_with("/auth.html?mode=login&"));
    outcome.to_string()
}

// ============================================================================
// Registration → login gating
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_pending_account_cannot_log_in_until_verified() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");
    let email = format!("{username}@example.com");

    let (status, body) = register(&app, &username, &email).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["requiresEmailVerification"], json!(true));
    // No SMTP configured: the link comes back in the response.
    assert_eq!(body["emailDelivery"], json!("fallback"));
    let link = body["devVerificationLink"].as_str().unwrap().to_string();
    assert!(link.contains("/verify?token="));

    // Correct password, but the account is still pending.
    let (status, body) = login(&app, &username, "hunter22").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requiresEmailVerification"], json!(true));
    let hint = body["emailHint"].as_str().unwrap();
    assert!(hint.starts_with(&username[..2]));
    assert!(hint.contains('*'));
    assert!(hint.ends_with("@example.com"));

    assert_eq!(verify_outcome(&app, &link).await, "success");

    let (status, body) = login(&app, &username, "hunter22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], json!(username));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_disabled_verification_allows_immediate_login() {
    let app = TestApp::spawn(false).await;
    let username = unique("user");
    let email = format!("{username}@example.com");

    let (status, body) = register(&app, &username, &email).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["requiresEmailVerification"], json!(false));
    assert!(body.get("devVerificationLink").is_none());

    let (status, _) = login(&app, &username, "hunter22").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::spawn(false).await;
    let username = unique("user");
    register(&app, &username, &format!("{username}@example.com")).await;

    let (status, body) = login(&app, &username, "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Same message an unknown username gets.
    assert_eq!(body["message"], json!("Invalid username or password."));
}

// ============================================================================
// Duplicate registration
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_duplicate_username_conflicts() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let (status, _) = register(&app, &username, &format!("{username}@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, &username, &format!("other_{username}@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], json!("This username is already taken."));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::spawn(true).await;
    let email = format!("{}@example.com", unique("shared"));

    let (status, _) = register(&app, &unique("user"), &email).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, &unique("user"), &email).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], json!("This email address is already in use."));
}

// ============================================================================
// Token lifecycle
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_verification_token_is_single_use() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let (_, body) = register(&app, &username, &format!("{username}@example.com")).await;
    let link = body["devVerificationLink"].as_str().unwrap().to_string();

    assert_eq!(verify_outcome(&app, &link).await, "success");
    // The consumed token never matches again.
    assert_eq!(verify_outcome(&app, &link).await, "expired");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_resend_supersedes_outstanding_token() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let (_, body) = register(&app, &username, &format!("{username}@example.com")).await;
    let first_link = body["devVerificationLink"].as_str().unwrap().to_string();

    let resp = app
        .client
        .post(app.url("/resend-verification"))
        .json(&json!({ "username": username }))
        .send()
        .await
        .expect("resend request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let second_link = body["devVerificationLink"].as_str().unwrap().to_string();
    assert_ne!(first_link, second_link);

    // The superseded token is permanently unusable; the fresh one works.
    assert_eq!(verify_outcome(&app, &first_link).await, "expired");
    assert_eq!(verify_outcome(&app, &second_link).await, "success");

    let (status, _) = login(&app, &username, "hunter22").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_elapsed_token_no_longer_verifies() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let (_, body) = register(&app, &username, &format!("{username}@example.com")).await;
    let link = body["devVerificationLink"].as_str().unwrap().to_string();

    // Push the expiry into the past; the strict > NOW() comparison must
    // reject the token even though its hash still matches.
    let pool = app.pool().await;
    sqlx::query(
        "UPDATE users SET verification_expires_at = NOW() - INTERVAL '1 minute' \
         WHERE username = $1",
    )
    .bind(&username)
    .execute(&pool)
    .await
    .expect("failed to age the token");

    assert_eq!(verify_outcome(&app, &link).await, "expired");

    let (status, _) = login(&app, &username, "hunter22").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_garbage_token_is_invalid() {
    let app = TestApp::spawn(true).await;

    let outcome = verify_outcome(&app, &app.url("/verify?token=short")).await;
    assert_eq!(outcome, "invalid");
}

// ============================================================================
// Resend edge cases
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_resend_for_verified_account_is_rejected() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let (_, body) = register(&app, &username, &format!("{username}@example.com")).await;
    let link = body["devVerificationLink"].as_str().unwrap().to_string();
    assert_eq!(verify_outcome(&app, &link).await, "success");

    let resp = app
        .client
        .post(app.url("/resend-verification"))
        .json(&json!({ "username": username }))
        .send()
        .await
        .expect("resend request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], json!("This account is already verified."));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_resend_for_unknown_account_is_not_found() {
    let app = TestApp::spawn(true).await;

    let resp = app
        .client
        .post(app.url("/resend-verification"))
        .json(&json!({ "username": unique("ghost") }))
        .send()
        .await
        .expect("resend request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Health & mounts
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_health_reports_configuration() {
    let app = TestApp::spawn(true).await;

    let resp = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("health request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["smtpConfigured"], json!(false));
    assert_eq!(body["emailVerificationEnabled"], json!(true));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_auth_routes_answer_on_alias_mounts() {
    let app = TestApp::spawn(true).await;
    let username = unique("user");

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "password": "hunter22",
            "email": format!("{username}@example.com"),
        }))
        .send()
        .await
        .expect("register request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "username": username, "password": "hunter22" }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
