#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use triage_api::{AppState, DEFAULT_MAX_BODY_BYTES, Settings, router};
use triage_db::Database;
use triage_push::{Notifier, PushMessage};

pub const RESET_PASSWORD: &str = "reset-me-123";

/// One notifier call as seen by the recording notifier.
#[derive(Debug)]
pub struct Push {
    pub tokens: Vec<String>,
    pub message: PushMessage,
}

struct RecordingNotifier(mpsc::UnboundedSender<Push>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<()> {
        let _ = self.0.send(Push {
            tokens: tokens.to_vec(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// Always fails, like a delivery service that cannot be reached.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _tokens: &[String], _message: &PushMessage) -> Result<()> {
        anyhow::bail!("connection refused")
    }
}

pub struct TestApp {
    pub router: Router,
    pub pushes: mpsc::UnboundedReceiver<Push>,
}

/// Fresh in-memory app whose notifications are captured in `pushes`.
pub fn spawn_app() -> TestApp {
    let (tx, pushes) = mpsc::unbounded_channel();
    TestApp {
        router: app_with_notifier(Arc::new(RecordingNotifier(tx))),
        pushes,
    }
}

pub fn app_with_notifier(notifier: Arc<dyn Notifier>) -> Router {
    app_with_body_limit(notifier, DEFAULT_MAX_BODY_BYTES)
}

pub fn app_with_body_limit(notifier: Arc<dyn Notifier>, max_body_bytes: usize) -> Router {
    let db = Database::open_in_memory().expect("in-memory database");
    let settings = Settings {
        reset_password: RESET_PASSWORD.to_string(),
        max_body_bytes,
    };
    router(AppState::new(db, notifier, settings))
}

/// Notifier for tests that never look at notifications.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _tokens: &[String], _message: &PushMessage) -> Result<()> {
        Ok(())
    }
}

/// Issue one request and decode the JSON response body (Null if empty).
pub async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON response body")
    };
    (status, value)
}

/// POST a raw body with an explicit content type (or none).
pub async fn post_raw(
    router: &Router,
    uri: &str,
    content_type: Option<&str>,
    body: String,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Body::from(body)).expect("request");

    let response = router.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    call(router, Method::GET, uri, None).await
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(router, Method::POST, uri, Some(body)).await
}

pub async fn put(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(router, Method::PUT, uri, Some(body)).await
}

/// Register a user and return its profile.
pub async fn create_user(router: &Router, username: &str, role: &str) -> Value {
    let (status, body) = post(
        router,
        "/users",
        json!({
            "name": format!("{} name", username),
            "username": username,
            "password": format!("{}-pw", username),
            "role": role,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create user: {}", body);
    body
}

/// Register a user that has a push token of `tok-<username>`. Returns its id.
pub async fn create_user_with_token(router: &Router, username: &str, role: &str) -> String {
    let user = create_user(router, username, role).await;
    let id = user["id"].as_str().expect("user id").to_string();
    let (status, body) = post(
        router,
        "/users/fcm-token",
        json!({ "userId": id, "token": format!("tok-{}", username) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "fcm token: {}", body);
    id
}

pub async fn create_report(router: &Router, body: Value) -> Value {
    let (status, report) = post(router, "/reports", body).await;
    assert_eq!(status, StatusCode::CREATED, "create report: {}", report);
    report
}

/// Next notification, or None if nothing arrives within a second.
pub async fn next_push(pushes: &mut mpsc::UnboundedReceiver<Push>) -> Option<Push> {
    tokio::time::timeout(Duration::from_secs(1), pushes.recv())
        .await
        .ok()
        .flatten()
}

/// Asserts no further notification shows up.
pub async fn assert_no_push(pushes: &mut mpsc::UnboundedReceiver<Push>) {
    let extra = tokio::time::timeout(Duration::from_millis(200), pushes.recv()).await;
    if let Ok(Some(push)) = extra {
        panic!("unexpected notification: {:?}", push);
    }
}
