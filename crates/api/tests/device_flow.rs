//! Integration tests for the single-active-device policy: device-aware
//! login, OTP step-up, and eviction.

mod common;

use axum::http::StatusCode;
use common::{assert_status, get_auth, post_json};
use sqlx::PgPool;

const PASSWORD: &str = "test_password_123!";

async fn register(app: axum::Router, email: &str) {
    let body = serde_json::json!({
        "email": email,
        "password": PASSWORD,
        "full_name": "Device Tester",
    });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_status(response, StatusCode::CREATED).await;
}

fn device(id: &str) -> serde_json::Value {
    serde_json::json!({
        "device_id": id,
        "device_name": format!("Phone {id}"),
        "device_type": "mobile",
    })
}

async fn login_device(app: axum::Router, email: &str, device_id: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "identifier": email,
        "password": PASSWORD,
        "device": device(device_id),
    });
    let response = post_json(app, "/api/v1/auth/login-device", body).await;
    assert_status(response, StatusCode::OK).await
}

/// Complete the step-up for a new device: login (gets the challenge), then
/// verify with the delivered code. Returns the auth payload.
async fn enroll_device(
    app: axum::Router,
    harness: &common::TestHarness,
    email: &str,
    device_id: &str,
) -> serde_json::Value {
    let before = harness.secret_count();
    let json = login_device(app.clone(), email, device_id).await;
    assert_eq!(json["step_up_required"], true);

    let code = harness.wait_for_secret_after(before).await;
    let body = serde_json::json!({
        "identifier": email,
        "password": PASSWORD,
        "code": code,
        "device": device(device_id),
    });
    let response = post_json(app, "/api/v1/auth/verify-device", body).await;
    assert_status(response, StatusCode::OK).await
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_device_requires_step_up(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    register(app.clone(), "stepup@test.com").await;

    let json = login_device(app.clone(), "stepup@test.com", "device-a").await;
    assert_eq!(json["step_up_required"], true);
    assert!(
        json.get("access_token").is_none(),
        "no tokens before the step-up completes"
    );

    // The challenge is delivered fire-and-forget; wait for it so the count
    // `enroll_device` captures reflects this login's delivery.
    harness.wait_for_secret().await;

    let auth = enroll_device(app, &harness, "stepup@test.com", "device-a").await;
    assert!(auth["access_token"].is_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wrong_step_up_code_is_rejected(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    register(app.clone(), "wrongcode@test.com").await;

    login_device(app.clone(), "wrongcode@test.com", "device-a").await;

    let body = serde_json::json!({
        "identifier": "wrongcode@test.com",
        "password": PASSWORD,
        "code": "000000",
        "device": device("device-a"),
    });
    let response = post_json(app, "/api/v1/auth/verify-device", body).await;
    let json = assert_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(json["code"], "INVALID_CODE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn recognized_device_logs_in_without_step_up(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    register(app.clone(), "repeat@test.com").await;
    enroll_device(app.clone(), &harness, "repeat@test.com", "device-a").await;

    let json = login_device(app, "repeat@test.com", "device-a").await;
    assert!(
        json["access_token"].is_string(),
        "recognized device gets tokens immediately"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn new_device_evicts_the_old_one(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    register(app.clone(), "evict@test.com").await;

    let auth_a = enroll_device(app.clone(), &harness, "evict@test.com", "device-a").await;
    let access_a = auth_a["access_token"].as_str().unwrap().to_string();

    // Device A works.
    let profile = get_auth(app.clone(), "/api/v1/auth/profile", &access_a).await;
    assert_eq!(profile.status(), StatusCode::OK);

    // Device B completes its step-up; the eviction happens before B's mint.
    let auth_b = enroll_device(app.clone(), &harness, "evict@test.com", "device-b").await;
    let access_b = auth_b["access_token"].as_str().unwrap().to_string();

    // A's token fails the live-record check even though its signature is valid.
    let profile_a = get_auth(app.clone(), "/api/v1/auth/profile", &access_a).await;
    assert_eq!(profile_a.status(), StatusCode::UNAUTHORIZED);

    let profile_b = get_auth(app.clone(), "/api/v1/auth/profile", &access_b).await;
    assert_eq!(profile_b.status(), StatusCode::OK);

    // Exactly one device remains active.
    let active = get_auth(app, "/api/v1/devices/active", &access_b).await;
    let json = assert_status(active, StatusCode::OK).await;
    let devices = json["data"].as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["device_id"], "device-b");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn returning_to_an_evicted_device_needs_no_step_up(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    register(app.clone(), "return@test.com").await;

    enroll_device(app.clone(), &harness, "return@test.com", "device-a").await;
    enroll_device(app.clone(), &harness, "return@test.com", "device-b").await;

    // Device A is still registered, just logged out: no new challenge.
    let json = login_device(app, "return@test.com", "device-a").await;
    assert!(json["access_token"].is_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn device_logout_revokes_tokens(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    register(app.clone(), "devlogout@test.com").await;
    let auth = enroll_device(app.clone(), &harness, "devlogout@test.com", "device-a").await;
    let access = auth["access_token"].as_str().unwrap().to_string();

    let response = common::post_auth(
        app.clone(),
        "/api/v1/devices/device-a/logout",
        &access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let profile = get_auth(app, "/api/v1/auth/profile", &access).await;
    assert_eq!(profile.status(), StatusCode::UNAUTHORIZED);
}
