//! Integration tests for the presence session lifecycle: the single-active
//! guard, heartbeat previews, the award-once close path, and the timeout
//! sweep.

mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;
use canopy_db::repositories::PointRepo;
use chrono::{Duration, Utc};
use common::{assert_status, get_auth, post_auth, post_json, post_json_auth};
use sqlx::PgPool;

const PASSWORD: &str = "test_password_123!";

/// Register + login, returning the access token.
async fn authed_user(app: axum::Router, email: &str) -> String {
    let body = serde_json::json!({
        "email": email,
        "password": PASSWORD,
        "full_name": "Presence Tester",
    });
    let response = post_json(app.clone(), "/api/v1/auth/register", body).await;
    assert_status(response, StatusCode::CREATED).await;

    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "identifier": email, "password": PASSWORD }),
    )
    .await;
    let json = assert_status(response, StatusCode::OK).await;
    json["access_token"].as_str().unwrap().to_string()
}

async fn start_session(app: axum::Router, token: &str) -> DbId {
    let response = post_auth(app, "/api/v1/presence/sessions", token).await;
    let json = assert_status(response, StatusCode::CREATED).await;
    assert_eq!(json["data"]["status"], "active");
    json["data"]["id"].as_i64().unwrap()
}

/// Backdate a session so elapsed time and heartbeat silence can be tested
/// without sleeping.
async fn backdate_session(
    pool: &PgPool,
    id: DbId,
    start_minutes_ago: i64,
    heartbeat_minutes_ago: i64,
) {
    let now = Utc::now();
    sqlx::query(
        "UPDATE presence_sessions SET start_time = $2, last_heartbeat = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(now - Duration::minutes(start_minutes_ago))
    .bind(now - Duration::minutes(heartbeat_minutes_ago))
    .execute(pool)
    .await
    .expect("backdating should succeed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn second_start_conflicts(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "conflict@test.com").await;

    start_session(app.clone(), &token).await;

    let response = post_auth(app, "/api/v1/presence/sessions", &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn concurrent_starts_have_one_winner(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "race@test.com").await;
    // Resolve the user id from the active profile.
    let profile = get_auth(app, "/api/v1/auth/profile", &token).await;
    let user_id = assert_status(profile, StatusCode::OK).await["data"]["id"]
        .as_i64()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let presence = std::sync::Arc::clone(&harness.state.presence);
        handles.push(tokio::spawn(async move {
            presence.start(user_id, None, None).await
        }));
    }

    let mut started = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => started += 1,
            Err(e) => {
                assert_matches!(e, CoreError::Conflict(_));
                conflicts += 1;
            }
        }
    }
    assert_eq!(started, 1, "exactly one start wins the marker claim");
    assert_eq!(conflicts, 4);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn heartbeat_previews_accrued_points(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "preview@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    backdate_session(&pool, session_id, 4, 4).await;

    let response = post_json_auth(
        app,
        "/api/v1/presence/sessions/heartbeat",
        &token,
        serde_json::json!({ "session_id": session_id }),
    )
    .await;
    let json = assert_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["acknowledged"], true);
    assert_eq!(json["data"]["session_id"], session_id);
    assert_eq!(json["data"]["session_status"], "active");
    assert_eq!(json["data"]["current_duration_minutes"], 4);
    assert_eq!(json["data"]["points_earned"], 4);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn heartbeat_on_an_unknown_session_is_404(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "nosession@test.com").await;

    let response = post_json_auth(
        app,
        "/api/v1/presence/sessions/heartbeat",
        &token,
        serde_json::json!({ "session_id": 9999 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn heartbeat_on_a_closed_session_conflicts(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "stale@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    let response = post_auth(
        app.clone(),
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(
        app,
        "/api/v1/presence/sessions/heartbeat",
        &token,
        serde_json::json!({ "session_id": session_id }),
    )
    .await;
    let json = assert_status(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "INVALID_STATE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn end_awards_points_and_updates_balance(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "earner@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    backdate_session(&pool, session_id, 10, 1).await;

    let response = post_auth(
        app.clone(),
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    let json = assert_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["duration_minutes"], 10);
    assert_eq!(json["data"]["points_earned"], 10);

    // Exactly one ledger entry, referencing the session.
    let entries = PointRepo::list_by_reference(&pool, session_id)
        .await
        .expect("ledger query should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 10);
    assert_eq!(entries[0].transaction_type, "presence");
    assert_eq!(entries[0].balance_after, 10);

    // The projection and the ledger agree.
    let balance = get_auth(app.clone(), "/api/v1/points/balance", &token).await;
    let json = assert_status(balance, StatusCode::OK).await;
    assert_eq!(json["data"]["available_points"], 10);
    assert_eq!(json["data"]["total_points"], 10);
    assert_eq!(json["data"]["ledger_balance"], 10);

    let history = get_auth(app, "/api/v1/points/history", &token).await;
    let json = assert_status(history, StatusCode::OK).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"][0]["reference_id"], session_id);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn zero_minute_session_earns_nothing(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "brief@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    let response = post_auth(
        app,
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    let json = assert_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["points_earned"], 0);

    let entries = PointRepo::list_by_reference(&pool, session_id)
        .await
        .expect("ledger query should succeed");
    assert!(entries.is_empty(), "no ledger entry for a zero-minute session");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn ending_twice_fails_cleanly(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "twice@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    let response = post_auth(
        app.clone(),
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The session still exists, so the second end is a state conflict, not
    // a missing resource.
    let response = post_auth(
        app,
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    let json = assert_status(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "INVALID_STATE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn ending_an_unknown_session_is_404(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool);
    let token = authed_user(app.clone(), "ghost@test.com").await;

    let response = post_auth(app, "/api/v1/presence/sessions/9999/end", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Start at T, heartbeat at T+4m, silence until the sweep at T+25m: the
/// session is credited 4 minutes and 4 points, bounded by the last
/// heartbeat rather than the sweep's run time.
#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_credits_up_to_the_last_heartbeat(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "sweep@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    // T = 25 minutes ago; last heartbeat at T+4m = 21 minutes ago.
    backdate_session(&pool, session_id, 25, 21).await;

    let closed = harness
        .state
        .presence
        .sweep_timed_out()
        .await
        .expect("sweep should succeed");
    assert_eq!(closed, 1);

    let session = get_auth(
        app.clone(),
        &format!("/api/v1/presence/sessions/{session_id}"),
        &token,
    )
    .await;
    let json = assert_status(session, StatusCode::OK).await;
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["duration_minutes"], 4);
    assert_eq!(json["data"]["points_earned"], 4);

    let entries = PointRepo::list_by_reference(&pool, session_id)
        .await
        .expect("ledger query should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 4);

    // The marker was cleared: a new session can start.
    let response = post_auth(app, "/api/v1/presence/sessions", &token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_ignores_sessions_with_recent_heartbeats(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "fresh@test.com").await;
    let session_id = start_session(app, &token).await;

    // Old session, but the heartbeat is only 5 minutes stale.
    backdate_session(&pool, session_id, 60, 5).await;

    let closed = harness
        .state
        .presence
        .sweep_timed_out()
        .await
        .expect("sweep should succeed");
    assert_eq!(closed, 0);
}

/// Whichever closer wins (client end vs sweep), the session is awarded
/// exactly once.
#[sqlx::test(migrations = "../db/migrations")]
async fn end_and_sweep_award_exactly_once(pool: PgPool) {
    let (app, harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "once@test.com").await;
    let session_id = start_session(app.clone(), &token).await;

    backdate_session(&pool, session_id, 30, 25).await;

    // The client end wins; the sweep then finds nothing to close.
    let response = post_auth(
        app,
        &format!("/api/v1/presence/sessions/{session_id}/end"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let closed = harness
        .state
        .presence
        .sweep_timed_out()
        .await
        .expect("sweep should succeed");
    assert_eq!(closed, 0);

    let entries = PointRepo::list_by_reference(&pool, session_id)
        .await
        .expect("ledger query should succeed");
    assert_eq!(entries.len(), 1, "one award despite two close attempts");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn session_history_paginates(pool: PgPool) {
    let (app, _harness) = common::build_test_app(pool.clone());
    let token = authed_user(app.clone(), "history@test.com").await;

    for _ in 0..3 {
        let session_id = start_session(app.clone(), &token).await;
        let response = post_auth(
            app.clone(),
            &format!("/api/v1/presence/sessions/{session_id}/end"),
            &token,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = get_auth(app, "/api/v1/presence/sessions?limit=2", &token).await;
    let json = assert_status(response, StatusCode::OK).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}
