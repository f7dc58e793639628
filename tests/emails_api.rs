mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn send_request(api_key: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/emails/send")
        .header("x-api-key", api_key)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn send_endpoint_returns_tracking_and_provider_ids() {
    let app = TestApp::new().await;
    seed_user(app.pool(), "key-1", 10).await;

    let response = app
        .router()
        .oneshot(send_request(
            "key-1",
            serde_json::json!({
                "recipient": "ana@acme.test",
                "subject": "Hello",
                "content": "<p>Hi</p>",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["ok"], true);
    assert!(parsed["data"]["emailId"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(parsed["data"]["messageId"], "provider-1");

    // The unknown address was registered as an active recipient.
    let status: String =
        sqlx::query_scalar("SELECT status FROM recipients WHERE email = 'ana@acme.test'")
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(status, "active");
}

#[tokio::test]
async fn send_endpoint_validates_required_fields() {
    let app = TestApp::new().await;
    seed_user(app.pool(), "key-1", 10).await;

    let response = app
        .router()
        .oneshot(send_request(
            "key-1",
            serde_json::json!({ "recipient": "ana@acme.test" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"], "VALIDATION_ERROR");
    assert_eq!(app.mailer.sent_count().await, 0);
}

#[tokio::test]
async fn send_endpoint_reports_quota_exceeded() {
    let app = TestApp::new().await;
    seed_user(app.pool(), "key-1", 0).await;

    let response = app
        .router()
        .oneshot(send_request(
            "key-1",
            serde_json::json!({
                "recipient": "ana@acme.test",
                "subject": "Hello",
                "content": "<p>Hi</p>",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"], "QUOTA_EXCEEDED");
}

#[tokio::test]
async fn send_endpoint_scopes_campaigns_to_owner() {
    let app = TestApp::new().await;
    let stranger = seed_user(app.pool(), "key-2", 10).await;
    seed_user(app.pool(), "key-1", 10).await;
    let foreign_campaign = seed_campaign(app.pool(), stranger.id, "S", "B").await;

    let response = app
        .router()
        .oneshot(send_request(
            "key-1",
            serde_json::json!({
                "recipient": "ana@acme.test",
                "subject": "Hello",
                "content": "<p>Hi</p>",
                "campaignId": foreign_campaign.id,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.mailer.sent_count().await, 0);
}
