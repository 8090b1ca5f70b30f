mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{
    FailingNotifier, app_with_notifier, assert_no_push, create_report, create_user,
    create_user_with_token, next_push, post, put, spawn_app,
};
use triage_push::{FcmConfig, FcmNotifier, ServiceAccount};

#[tokio::test]
async fn new_report_fans_out_to_developers_with_tokens() {
    let mut app = spawn_app();
    create_user_with_token(&app.router, "dev1", "developer").await;
    create_user_with_token(&app.router, "dev2", "developer").await;
    create_user(&app.router, "dev3", "developer").await;
    create_user_with_token(&app.router, "customer", "user").await;

    let report = create_report(&app.router, json!({ "app": "X", "severity": "high" })).await;

    let push = next_push(&mut app.pushes).await.expect("developer fan-out");
    let mut tokens = push.tokens.clone();
    tokens.sort();
    assert_eq!(tokens, vec!["tok-dev1", "tok-dev2"]);
    assert_eq!(push.message.data["type"], "new_report");
    assert_eq!(push.message.data["reportId"], report["id"].as_str().unwrap());
    assert_no_push(&mut app.pushes).await;
}

#[tokio::test]
async fn no_developer_tokens_means_no_push() {
    let mut app = spawn_app();
    create_user(&app.router, "dev1", "developer").await;

    create_report(&app.router, json!({ "app": "X" })).await;
    assert_no_push(&mut app.pushes).await;
}

#[tokio::test]
async fn status_change_notifies_reporter() {
    let mut app = spawn_app();
    let reporter = create_user_with_token(&app.router, "rita", "user").await;

    let report = create_report(&app.router, json!({ "app": "X", "reporterId": reporter })).await;
    let (status, _) = put(
        &app.router,
        &format!("/reports/{}/status", report["id"].as_str().unwrap()),
        json!({ "status": "in_progress" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let push = next_push(&mut app.pushes).await.expect("reporter notified");
    assert_eq!(push.tokens, vec!["tok-rita"]);
    assert_eq!(push.message.data["type"], "status_changed");
    assert_eq!(push.message.data["status"], "in_progress");
    assert_no_push(&mut app.pushes).await;
}

#[tokio::test]
async fn assignment_notifies_assignee() {
    let mut app = spawn_app();
    let dev = create_user_with_token(&app.router, "dana", "user").await;

    let report = create_report(&app.router, json!({ "app": "X" })).await;
    let (status, _) = put(
        &app.router,
        &format!("/reports/{}/assign", report["id"].as_str().unwrap()),
        json!({ "assignedToId": dev, "assignedToName": "Dana" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let push = next_push(&mut app.pushes).await.expect("assignee notified");
    assert_eq!(push.tokens, vec!["tok-dana"]);
    assert_eq!(push.message.data["type"], "assigned");
    assert_no_push(&mut app.pushes).await;
}

#[tokio::test]
async fn comment_notifies_the_other_party() {
    let mut app = spawn_app();
    let reporter = create_user_with_token(&app.router, "rita", "user").await;
    let assignee = create_user_with_token(&app.router, "dana", "user").await;

    let report = create_report(&app.router, json!({ "app": "X", "reporterId": reporter })).await;
    let id = report["id"].as_str().unwrap();
    put(
        &app.router,
        &format!("/reports/{}/assign", id),
        json!({ "assignedToId": assignee, "assignedToName": "Dana" }),
    )
    .await;
    next_push(&mut app.pushes).await.expect("assignment push");

    let comments_uri = format!("/reports/{}/comments", id);

    post(
        &app.router,
        &comments_uri,
        json!({ "authorId": reporter, "authorName": "Rita", "message": "any news?" }),
    )
    .await;
    let push = next_push(&mut app.pushes).await.expect("assignee hears reporter");
    assert_eq!(push.tokens, vec!["tok-dana"]);
    assert_eq!(push.message.data["type"], "comment");
    assert_no_push(&mut app.pushes).await;

    post(
        &app.router,
        &comments_uri,
        json!({ "authorId": assignee, "authorName": "Dana", "message": "fixed" }),
    )
    .await;
    let push = next_push(&mut app.pushes).await.expect("reporter hears assignee");
    assert_eq!(push.tokens, vec!["tok-rita"]);
    assert_no_push(&mut app.pushes).await;
}

#[tokio::test]
async fn failing_notifier_does_not_change_statuses() {
    let app = app_with_notifier(Arc::new(FailingNotifier));
    let reporter = create_user_with_token(&app, "rita", "user").await;
    create_user_with_token(&app, "dev", "developer").await;

    let (status, report) = post(&app, "/reports", json!({ "app": "X", "reporterId": reporter })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = report["id"].as_str().unwrap();

    let (status, _) = put(&app, &format!("/reports/{}/status", id), json!({ "status": "closed" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/reports/{}/comments", id),
        json!({ "authorId": "someone", "authorName": "S", "message": "hello" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn unreachable_push_service_does_not_change_statuses() {
    let mut account = ServiceAccount::from_json(include_str!(
        "../../triage-push/tests/fixtures/service-account.json"
    ))
    .unwrap();
    account.token_uri = "http://127.0.0.1:9/token".into();
    let notifier = FcmNotifier::new(FcmConfig {
        endpoint: "http://127.0.0.1:9".into(),
        account,
        timeout: Duration::from_secs(2),
    })
    .unwrap();
    let app = app_with_notifier(Arc::new(notifier));
    create_user_with_token(&app, "dev", "developer").await;

    let (status, report) = post(&app, "/reports", json!({ "app": "X", "severity": "high" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "open");

    // give the background send time to fail
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn response_does_not_wait_for_delivery() {
    struct Stalled;

    #[async_trait::async_trait]
    impl triage_push::Notifier for Stalled {
        async fn send(&self, _: &[String], _: &triage_push::PushMessage) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    let app = app_with_notifier(Arc::new(Stalled));
    create_user_with_token(&app, "dev", "developer").await;

    let created = tokio::time::timeout(
        Duration::from_secs(5),
        post(&app, "/reports", json!({ "app": "X" })),
    )
    .await
    .expect("request should not block on push delivery");
    assert_eq!(created.0, StatusCode::CREATED);
}
