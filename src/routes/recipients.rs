use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;

use crate::auth::AuthUser;
use crate::db;
use crate::error::{Error, Result};
use crate::models::recipient::Recipient;
use crate::models::FieldMap;
use crate::services::maintenance_service;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecipientReq {
    email: String,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    company: Option<String>,
    custom_fields: Option<FieldMap>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRecipientReq {
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    company: Option<String>,
    status: Option<String>,
    custom_fields: Option<FieldMap>,
}

async fn fetch_recipient(pool: &SqlitePool, user_id: i64, id: i64) -> Result<Recipient> {
    sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("recipient"))
}

async fn create_recipient(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Json(req): Json<CreateRecipientReq>,
) -> Result<impl IntoResponse> {
    let email = req.email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::Validation("please provide a valid email address".into()));
    }

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM recipients WHERE user_id = ? AND email = ?")
            .bind(user.id)
            .bind(&email)
            .fetch_optional(&pool)
            .await?;
    if existing.is_some() {
        return Err(Error::Validation(
            "recipient with this email already exists".into(),
        ));
    }

    let now = db::now_epoch();
    let result = sqlx::query(
        "INSERT INTO recipients (user_id, email, name, first_name, last_name, company, \
         status, custom_fields, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&email)
    .bind(&req.name)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.company)
    .bind(SqlJson(req.custom_fields.unwrap_or_default()))
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let recipient = fetch_recipient(&pool, user.id, result.last_insert_rowid()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "data": recipient }))))
}

async fn list_recipients(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    let recipients = sqlx::query_as::<_, Recipient>(
        "SELECT * FROM recipients WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "ok": true, "count": recipients.len(), "data": recipients })))
}

async fn get_recipient(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let recipient = fetch_recipient(&pool, user.id, id).await?;
    Ok(Json(json!({ "ok": true, "data": recipient })))
}

async fn update_recipient(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipientReq>,
) -> Result<impl IntoResponse> {
    fetch_recipient(&pool, user.id, id).await?;

    if let Some(status) = &req.status {
        if !["active", "unsubscribed", "bounced", "complained"].contains(&status.as_str()) {
            return Err(Error::Validation("invalid recipient status".into()));
        }
    }

    sqlx::query(
        "UPDATE recipients SET name = COALESCE(?, name), first_name = COALESCE(?, first_name), \
         last_name = COALESCE(?, last_name), company = COALESCE(?, company), \
         status = COALESCE(?, status), custom_fields = COALESCE(?, custom_fields), \
         updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&req.name)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.company)
    .bind(&req.status)
    .bind(req.custom_fields.map(SqlJson))
    .bind(db::now_epoch())
    .bind(id)
    .bind(user.id)
    .execute(&pool)
    .await?;

    let recipient = fetch_recipient(&pool, user.id, id).await?;
    Ok(Json(json!({ "ok": true, "data": recipient })))
}

async fn delete_recipient(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    fetch_recipient(&pool, user.id, id).await?;

    // Membership rows go first so list counts stay accurate.
    let removed: Vec<i64> =
        sqlx::query_scalar("SELECT list_id FROM list_members WHERE recipient_id = ?")
            .bind(id)
            .fetch_all(&pool)
            .await?;
    sqlx::query("DELETE FROM list_members WHERE recipient_id = ?")
        .bind(id)
        .execute(&pool)
        .await?;
    for list_id in removed {
        sqlx::query(
            "UPDATE lists SET recipient_count = MAX(recipient_count - 1, 0), updated_at = ? \
             WHERE id = ?",
        )
        .bind(db::now_epoch())
        .bind(list_id)
        .execute(&pool)
        .await?;
    }

    sqlx::query("DELETE FROM recipients WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user.id)
        .execute(&pool)
        .await?;
    Ok(Json(json!({ "ok": true, "data": {} })))
}

/// Recomputes this recipient's totals from message records.
async fn reconcile_recipient(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    fetch_recipient(&pool, user.id, id).await?;
    maintenance_service::reconcile_recipient(&pool, id).await?;
    let recipient = fetch_recipient(&pool, user.id, id).await?;
    Ok(Json(json!({ "ok": true, "data": recipient })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/recipients", post(create_recipient).get(list_recipients))
        .route(
            "/api/recipients/:id",
            get(get_recipient)
                .patch(update_recipient)
                .delete(delete_recipient),
        )
        .route("/api/recipients/:id/reconcile", post(reconcile_recipient))
}
