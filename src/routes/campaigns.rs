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
use crate::models::campaign::{Campaign, CampaignStatus};
use crate::services::{campaign_service, maintenance_service};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCampaignReq {
    name: String,
    description: Option<String>,
    subject: String,
    body: String,
    scheduled_for: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCampaignReq {
    name: Option<String>,
    description: Option<String>,
    subject: Option<String>,
    body: Option<String>,
    scheduled_for: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCampaignReq {
    recipient_ids: Vec<i64>,
}

async fn create_campaign(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Json(req): Json<CreateCampaignReq>,
) -> Result<impl IntoResponse> {
    let status = if req.scheduled_for.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Draft
    };
    let now = db::now_epoch();
    let result = sqlx::query(
        "INSERT INTO campaigns (user_id, name, description, subject, body, status, \
         scheduled_for, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.subject)
    .bind(&req.body)
    .bind(status)
    .bind(req.scheduled_for)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let campaign =
        campaign_service::get_campaign(&pool, user.id, result.last_insert_rowid()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "data": campaign }))))
}

async fn list_campaigns(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    let campaigns = sqlx::query_as::<_, Campaign>(
        "SELECT * FROM campaigns WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "ok": true, "count": campaigns.len(), "data": campaigns })))
}

async fn get_campaign(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(campaign_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let campaign = campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    Ok(Json(json!({ "ok": true, "data": campaign })))
}

async fn update_campaign(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(campaign_id): Path<i64>,
    Json(req): Json<UpdateCampaignReq>,
) -> Result<impl IntoResponse> {
    campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    sqlx::query(
        "UPDATE campaigns SET name = COALESCE(?, name), description = COALESCE(?, description), \
         subject = COALESCE(?, subject), body = COALESCE(?, body), \
         scheduled_for = COALESCE(?, scheduled_for), updated_at = ? \
         WHERE id = ? AND user_id = ?",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.subject)
    .bind(&req.body)
    .bind(req.scheduled_for)
    .bind(db::now_epoch())
    .bind(campaign_id)
    .bind(user.id)
    .execute(&pool)
    .await?;

    let campaign = campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    Ok(Json(json!({ "ok": true, "data": campaign })))
}

async fn delete_campaign(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(campaign_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let campaign = campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    if matches!(
        campaign.status,
        CampaignStatus::Sending | CampaignStatus::Sent
    ) {
        return Err(Error::Validation(
            "cannot delete a campaign that has been sent".into(),
        ));
    }
    sqlx::query("DELETE FROM campaigns WHERE id = ? AND user_id = ?")
        .bind(campaign_id)
        .bind(user.id)
        .execute(&pool)
        .await?;
    Ok(Json(json!({ "ok": true, "data": {} })))
}

/// Kicks off the batch and acknowledges immediately; the batch runs on its
/// own task and the campaign id doubles as the handle callers poll for status.
async fn send_campaign(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(campaign_id): Path<i64>,
    Json(req): Json<SendCampaignReq>,
) -> Result<impl IntoResponse> {
    let batch =
        campaign_service::prepare_batch(&state.pool, &user, campaign_id, &req.recipient_ids)
            .await?;
    let campaign = batch.campaign.clone();

    tokio::spawn(campaign_service::run_batch(
        state.pool.clone(),
        state.config.clone(),
        state.mailer.clone(),
        batch,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "message": "campaign sending started", "data": campaign })),
    ))
}

async fn campaign_stats(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(campaign_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let campaign = campaign_service::get_campaign(&pool, user.id, campaign_id).await?;

    let total_sent: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE campaign_id = ?")
            .bind(campaign.id)
            .fetch_one(&pool)
            .await?;
    let total_opened: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE campaign_id = ? AND status = 'opened'",
    )
    .bind(campaign.id)
    .fetch_one(&pool)
    .await?;
    let open_rate = if total_sent > 0 {
        total_opened as f64 / total_sent as f64 * 100.0
    } else {
        0.0
    };

    let devices: Vec<(String, i64)> = sqlx::query_as(
        "SELECT device, COUNT(*) FROM messages \
         WHERE campaign_id = ? AND device IS NOT NULL GROUP BY device",
    )
    .bind(campaign.id)
    .fetch_all(&pool)
    .await?;
    let devices: serde_json::Map<String, serde_json::Value> = devices
        .into_iter()
        .map(|(device, count)| (device, json!(count)))
        .collect();

    Ok(Json(json!({
        "ok": true,
        "data": {
            "totalSent": total_sent,
            "totalOpened": total_opened,
            "openRate": format!("{open_rate:.2}"),
            "devices": devices,
        }
    })))
}

/// Recomputes this campaign's aggregates from message records, correcting any
/// drift left by partial persistence failures.
async fn reconcile_campaign(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(campaign_id): Path<i64>,
) -> Result<impl IntoResponse> {
    campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    maintenance_service::reconcile_campaign(&pool, campaign_id).await?;
    let campaign = campaign_service::get_campaign(&pool, user.id, campaign_id).await?;
    Ok(Json(json!({ "ok": true, "data": campaign })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/campaigns", post(create_campaign).get(list_campaigns))
        .route(
            "/api/campaigns/:id",
            get(get_campaign)
                .patch(update_campaign)
                .delete(delete_campaign),
        )
        .route("/api/campaigns/:id/send", post(send_campaign))
        .route("/api/campaigns/:id/stats", get(campaign_stats))
        .route("/api/campaigns/:id/reconcile", post(reconcile_campaign))
}
