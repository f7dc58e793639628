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
use crate::models::list::List;
use crate::models::recipient::Recipient;
use crate::services::list_service;
use crate::AppState;

#[derive(Deserialize)]
struct CreateListReq {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipReq {
    recipient_ids: Vec<i64>,
}

async fn create_list(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Json(req): Json<CreateListReq>,
) -> Result<impl IntoResponse> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM lists WHERE user_id = ? AND name = ?")
            .bind(user.id)
            .bind(&req.name)
            .fetch_optional(&pool)
            .await?;
    if existing.is_some() {
        return Err(Error::Validation(
            "list with this name already exists".into(),
        ));
    }

    let now = db::now_epoch();
    let result = sqlx::query(
        "INSERT INTO lists (user_id, name, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let list = list_service::get_list(&pool, user.id, result.last_insert_rowid()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "data": list }))))
}

async fn list_lists(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    let lists = sqlx::query_as::<_, List>(
        "SELECT * FROM lists WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "ok": true, "count": lists.len(), "data": lists })))
}

async fn get_list(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let list = list_service::get_list(&pool, user.id, id).await?;
    Ok(Json(json!({ "ok": true, "data": list })))
}

async fn delete_list(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    list_service::delete_list(&pool, user.id, id).await?;
    Ok(Json(json!({ "ok": true, "data": {} })))
}

async fn list_members(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let list = list_service::get_list(&pool, user.id, id).await?;
    let recipients = sqlx::query_as::<_, Recipient>(
        "SELECT r.* FROM recipients r \
         JOIN list_members m ON m.recipient_id = r.id \
         WHERE m.list_id = ? ORDER BY r.created_at DESC",
    )
    .bind(list.id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "ok": true, "count": recipients.len(), "data": recipients })))
}

async fn add_members(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(req): Json<MembershipReq>,
) -> Result<impl IntoResponse> {
    let added = list_service::add_recipients(&pool, user.id, id, &req.recipient_ids).await?;
    Ok(Json(json!({ "ok": true, "data": { "added": added } })))
}

async fn remove_members(
    AuthUser(user): AuthUser,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(req): Json<MembershipReq>,
) -> Result<impl IntoResponse> {
    let removed = list_service::remove_recipients(&pool, user.id, id, &req.recipient_ids).await?;
    Ok(Json(json!({ "ok": true, "data": { "removed": removed } })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lists", post(create_list).get(list_lists))
        .route("/api/lists/:id", get(get_list).delete(delete_list))
        .route(
            "/api/lists/:id/recipients",
            get(list_members).post(add_members).delete(remove_members),
        )
}
