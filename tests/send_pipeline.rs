mod common;

use common::*;
use mailtrack::error::Error;
use mailtrack::models::message::{Message, MessageStatus};
use mailtrack::services::send_service;

#[tokio::test]
async fn successful_send_persists_message_and_increments_counters() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let recipient = seed_recipient_named(pool, user.id, "ana@acme.test", Some("Ana")).await;

    let outcome = send_service::send_email(
        pool,
        &app.state.config,
        app.state.mailer.as_ref(),
        &user,
        &recipient,
        "Hi {{name}}",
        "<p>Hello {{name}}, from {{company}}</p>",
        None,
    )
    .await
    .expect("send succeeds");

    assert!(!outcome.tracking_id.is_empty());
    assert_eq!(outcome.provider_message_id, "provider-1");

    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE tracking_id = ?")
        .bind(&outcome.tracking_id)
        .fetch_one(pool)
        .await
        .expect("message persisted");
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(message.subject, "Hi Ana");
    // Missing attribute stays verbatim; the pixel is embedded.
    assert!(message.body.contains("Hello Ana, from {{company}}"));
    assert!(message
        .body
        .contains(&format!("/track/open?emailId={}", outcome.tracking_id)));
    assert_eq!(message.open_count, 0);

    let (emails_sent,): (i64,) =
        sqlx::query_as("SELECT emails_sent FROM users WHERE id = ?")
            .bind(user.id)
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(emails_sent, 1);

    let recipient = fetch_recipient(pool, recipient.id).await;
    assert_eq!(recipient.total_emails_sent, 1);
    assert!(recipient.last_email_sent_at.is_some());

    // The mail actually handed to the transport carries the pixel too.
    let sent = app.mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@acme.test");
    assert_eq!(sent[0].subject, "Hi Ana");
}

#[tokio::test]
async fn quota_exceeded_fails_without_side_effects() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 0).await;
    let recipient = seed_recipient(pool, user.id, "ana@acme.test").await;

    let err = send_service::send_email(
        pool,
        &app.state.config,
        app.state.mailer.as_ref(),
        &user,
        &recipient,
        "Subject",
        "Body",
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::QuotaExceeded));
    assert_eq!(app.mailer.sent_count().await, 0);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn loopback_base_url_refuses_to_send() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let recipient = seed_recipient(pool, user.id, "ana@acme.test").await;

    let mut config = (*app.state.config).clone();
    config.base_url = "http://localhost:3000".into();

    let err = send_service::send_email(
        pool,
        &config,
        app.state.mailer.as_ref(),
        &user,
        &recipient,
        "Subject",
        "Body",
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(app.mailer.sent_count().await, 0);
}

#[tokio::test]
async fn transport_failure_persists_nothing() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let recipient = seed_recipient(pool, user.id, "bounce@acme.test").await;
    app.mailer.fail_address("bounce@acme.test").await;

    let err = send_service::send_email(
        pool,
        &app.state.config,
        app.state.mailer.as_ref(),
        &user,
        &recipient,
        "Subject",
        "Body",
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Delivery(_)));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    let (emails_sent,): (i64,) = sqlx::query_as("SELECT emails_sent FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(emails_sent, 0);
}

#[tokio::test]
async fn campaign_send_initializes_sending_state_once() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let recipient = seed_recipient(pool, user.id, "ana@acme.test").await;
    let campaign = seed_campaign(pool, user.id, "Subject", "Body").await;

    for _ in 0..2 {
        send_service::send_email(
            pool,
            &app.state.config,
            app.state.mailer.as_ref(),
            &user,
            &recipient,
            &campaign.subject,
            &campaign.body,
            Some(&campaign),
        )
        .await
        .expect("send succeeds");
    }

    let campaign = fetch_campaign(pool, campaign.id).await;
    assert_eq!(campaign.sent_count, 2);
    assert_eq!(campaign.status.as_str(), "sending");
    let first_sent_at = campaign.sent_at.expect("sent_at set on first send");
    assert!(first_sent_at > 0);
}
