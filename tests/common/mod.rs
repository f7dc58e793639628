#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use mailtrack::config::Config;
use mailtrack::db;
use mailtrack::error::Error;
use mailtrack::models::campaign::Campaign;
use mailtrack::models::recipient::Recipient;
use mailtrack::models::user::User;
use mailtrack::smtp::{MailTransport, OutgoingEmail, SmtpParams};
use mailtrack::{routes, AppState};

/// Transport double: records every delivered mail and fails on demand for
/// specific recipient addresses.
#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail_for: Mutex<HashSet<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn fail_address(&self, address: &str) {
        self.fail_for.lock().await.insert(address.to_string());
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn deliver(&self, _params: &SmtpParams, mail: &OutgoingEmail) -> Result<String, Error> {
        if self.fail_for.lock().await.contains(&mail.to) {
            return Err(Error::Delivery(format!("smtp rejected {}", mail.to)));
        }
        let mut sent = self.sent.lock().await;
        sent.push(mail.clone());
        Ok(format!("provider-{}", sent.len()))
    }
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config {
        database_url: "sqlite::memory:".into(),
        base_url: "https://mail.example.com".into(),
        port: 0,
        smtp_host: "smtp.example.com".into(),
        smtp_port: 587,
        smtp_username: String::new(),
        smtp_password: String::new(),
        from_email: "no-reply@example.com".into(),
        default_email_quota: 100,
        batch_pacing_ms: 0,
        smtp_timeout_secs: 5,
    })
}

/// In-memory database. A single connection keeps every query on the same
/// memory store.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    db::run_migrations(&pool).await.expect("migrations");
    pool
}

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<MockTransport>,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let mailer = MockTransport::new();
        let state = AppState {
            pool,
            config: test_config(),
            mailer: mailer.clone(),
        };
        TestApp { state, mailer }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::router())
            .with_state(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.pool
    }
}

pub async fn seed_user(pool: &SqlitePool, api_key: &str, quota: i64) -> User {
    let now = db::now_epoch();
    let id = sqlx::query(
        "INSERT INTO users (email, name, api_key, email_quota, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(format!("{api_key}@sender.test"))
    .bind("Test Sender")
    .bind(api_key)
    .bind(quota)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed user")
    .last_insert_rowid();

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch user")
}

pub async fn seed_recipient(pool: &SqlitePool, user_id: i64, email: &str) -> Recipient {
    seed_recipient_named(pool, user_id, email, None).await
}

pub async fn seed_recipient_named(
    pool: &SqlitePool,
    user_id: i64,
    email: &str,
    name: Option<&str>,
) -> Recipient {
    let now = db::now_epoch();
    let id = sqlx::query(
        "INSERT INTO recipients (user_id, email, name, status, created_at, updated_at) \
         VALUES (?, ?, ?, 'active', ?, ?)",
    )
    .bind(user_id)
    .bind(email)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed recipient")
    .last_insert_rowid();

    sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch recipient")
}

pub async fn seed_campaign(
    pool: &SqlitePool,
    user_id: i64,
    subject: &str,
    body: &str,
) -> Campaign {
    let now = db::now_epoch();
    let id = sqlx::query(
        "INSERT INTO campaigns (user_id, name, subject, body, status, created_at, updated_at) \
         VALUES (?, 'Test Campaign', ?, ?, 'draft', ?, ?)",
    )
    .bind(user_id)
    .bind(subject)
    .bind(body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed campaign")
    .last_insert_rowid();

    fetch_campaign(pool, id).await
}

pub async fn fetch_campaign(pool: &SqlitePool, id: i64) -> Campaign {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch campaign")
}

pub async fn fetch_recipient(pool: &SqlitePool, id: i64) -> Recipient {
    sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch recipient")
}
