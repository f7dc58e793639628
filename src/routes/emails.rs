use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::auth::AuthUser;
use crate::db;
use crate::error::{Error, Result};
use crate::models::message::Message;
use crate::models::recipient::Recipient;
use crate::services::{campaign_service, send_service};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailReq {
    recipient: Option<String>,
    subject: Option<String>,
    content: Option<String>,
    campaign_id: Option<i64>,
}

/// Direct single-message send. An unknown recipient address is registered as
/// an active recipient on the fly.
async fn send_email(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendEmailReq>,
) -> Result<impl IntoResponse> {
    let (Some(recipient_email), Some(subject), Some(content)) =
        (req.recipient, req.subject, req.content)
    else {
        return Err(Error::Validation(
            "please provide recipient, subject, and content".into(),
        ));
    };

    let campaign = match req.campaign_id {
        Some(id) => Some(campaign_service::get_campaign(&state.pool, user.id, id).await?),
        None => None,
    };

    let recipient = get_or_create_recipient(&state.pool, user.id, &recipient_email).await?;

    let outcome = send_service::send_email(
        &state.pool,
        &state.config,
        state.mailer.as_ref(),
        &user,
        &recipient,
        &subject,
        &content,
        campaign.as_ref(),
    )
    .await?;

    Ok(Json(json!({ "ok": true, "data": outcome })))
}

async fn get_or_create_recipient(
    pool: &SqlitePool,
    user_id: i64,
    email: &str,
) -> Result<Recipient> {
    let email = email.trim().to_ascii_lowercase();
    if let Some(existing) =
        sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE user_id = ? AND email = ?")
            .bind(user_id)
            .bind(&email)
            .fetch_optional(pool)
            .await?
    {
        return Ok(existing);
    }

    let now = db::now_epoch();
    sqlx::query(
        "INSERT INTO recipients (user_id, email, status, created_at, updated_at) \
         VALUES (?, ?, 'active', ?, ?)",
    )
    .bind(user_id)
    .bind(&email)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE user_id = ? AND email = ?")
        .bind(user_id)
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("recipient"))
}

async fn list_emails(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE user_id = ? ORDER BY sent_at DESC",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "ok": true, "count": messages.len(), "data": messages })))
}

async fn get_email(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(tracking_id): Path<String>,
) -> Result<impl IntoResponse> {
    let message = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE tracking_id = ? AND user_id = ?",
    )
    .bind(&tracking_id)
    .bind(user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(Error::NotFound("email"))?;
    Ok(Json(json!({ "ok": true, "data": message })))
}

async fn email_stats(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    let total_sent: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;
    let total_opened: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE user_id = ? AND status = 'opened'",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;
    let open_rate = if total_sent > 0 {
        total_opened as f64 / total_sent as f64 * 100.0
    } else {
        0.0
    };

    let devices: Vec<(String, i64)> = sqlx::query_as(
        "SELECT device, COUNT(*) FROM messages \
         WHERE user_id = ? AND device IS NOT NULL GROUP BY device",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;
    let devices: serde_json::Map<String, serde_json::Value> = devices
        .into_iter()
        .map(|(device, count)| (device, json!(count)))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "data": {
                "totalSent": total_sent,
                "totalOpened": total_opened,
                "openRate": format!("{open_rate:.2}"),
                "devices": devices,
            }
        })),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/emails/send", post(send_email))
        .route("/api/emails", get(list_emails))
        .route("/api/emails/stats", get(email_stats))
        .route("/api/emails/:tracking_id", get(get_email))
}
