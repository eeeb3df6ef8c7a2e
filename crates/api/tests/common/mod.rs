//! Shared harness for HTTP-level integration tests.
//!
//! Builds the full application router exactly as production does (same
//! middleware stack via `build_app_router`), over a per-test database pool,
//! a fresh in-memory ephemeral store, and a recording notifier so tests can
//! observe out-of-band codes.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use canopy_api::auth::jwt::JwtConfig;
use canopy_api::config::ServerConfig;
use canopy_api::mailer::{Notifier, NotifyError};
use canopy_api::router::build_app_router;
use canopy_api::state::AppState;
use canopy_cache::MemoryStore;

/// Notifier that records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    /// `(recipient, secret)` pairs in delivery order.
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// The most recently delivered secret, if any.
    pub fn last_secret(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .last()
            .map(|(_, secret)| secret.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        _context: &str,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((to.to_string(), code.to_string()));
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((to.to_string(), token.to_string()));
        Ok(())
    }
}

/// Everything a test needs besides the router itself.
pub struct TestHarness {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    /// Number of notifications delivered so far.
    pub fn secret_count(&self) -> usize {
        self.notifier
            .sent
            .lock()
            .expect("notifier mutex poisoned")
            .len()
    }

    /// Poll for an out-of-band secret delivered by a fire-and-forget task.
    pub async fn wait_for_secret(&self) -> String {
        self.wait_for_secret_after(0).await
    }

    /// Poll until more than `prior_count` notifications exist, then return
    /// the newest secret. Use with [`secret_count`](Self::secret_count) when
    /// several deliveries happen in one test.
    pub async fn wait_for_secret_after(&self, prior_count: usize) -> String {
        for _ in 0..50 {
            if self.secret_count() > prior_count {
                if let Some(secret) = self.notifier.last_secret() {
                    return secret;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no notification delivered within 1s");
    }
}

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough-for-hmac".to_string(),
            access_token_expiry_secs: 900,
            refresh_token_expiry_secs: 604_800,
        },
    }
}

/// Build the full application router plus a harness exposing the service
/// graph and the recording notifier.
pub fn build_test_app(pool: PgPool) -> (Router, TestHarness) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState::build(pool, config.clone(), store, Arc::clone(&notifier) as _);
    let app = build_app_router(state.clone(), &config);

    (app, TestHarness { state, notifier })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request build failed");
    app.oneshot(request).await.expect("request failed")
}

/// Send a GET request with a Bearer token.
pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request build failed");
    app.oneshot(request).await.expect("request failed")
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request build failed");
    app.oneshot(request).await.expect("request failed")
}

/// Send a POST request with a JSON body and a Bearer token.
pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .expect("request build failed");
    app.oneshot(request).await.expect("request failed")
}

/// Send an authenticated POST with an empty body.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request build failed");
    app.oneshot(request).await.expect("request failed")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body read failed")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body was not valid JSON")
}

/// Expect a status, panicking with the body text on mismatch.
pub async fn assert_status(response: Response<Body>, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let json = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {json}");
    json
}
