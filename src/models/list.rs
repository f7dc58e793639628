use serde::{Deserialize, Serialize};

/// Recipient list. `recipient_count` is a cache maintained incrementally on
/// every membership change; it is never recomputed by a full scan in the hot
/// path and never drops below zero.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct List {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub recipient_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
