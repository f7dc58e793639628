use sqlx::{QueryBuilder, SqlitePool};

use crate::db;
use crate::error::{Error, Result};
use crate::models::list::List;

pub async fn get_list(pool: &SqlitePool, user_id: i64, list_id: i64) -> Result<List> {
    sqlx::query_as::<_, List>("SELECT * FROM lists WHERE id = ? AND user_id = ?")
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("list"))
}

/// Adds recipients to a list and bumps the cached `recipient_count` by the
/// number of memberships actually created. Recipients already in the list, or
/// belonging to another user, do not move the count.
pub async fn add_recipients(
    pool: &SqlitePool,
    user_id: i64,
    list_id: i64,
    recipient_ids: &[i64],
) -> Result<u64> {
    if recipient_ids.is_empty() {
        return Err(Error::Validation(
            "please provide an array of recipient ids".into(),
        ));
    }
    let list = get_list(pool, user_id, list_id).await?;

    let mut qb = QueryBuilder::new(
        "INSERT OR IGNORE INTO list_members (list_id, recipient_id) SELECT ",
    );
    qb.push_bind(list.id);
    qb.push(", id FROM recipients WHERE user_id = ");
    qb.push_bind(user_id);
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in recipient_ids {
        separated.push_bind(*id);
    }
    qb.push(")");
    let added = qb.build().execute(pool).await?.rows_affected();

    if added > 0 {
        sqlx::query(
            "UPDATE lists SET recipient_count = recipient_count + ?, updated_at = ? WHERE id = ?",
        )
        .bind(added as i64)
        .bind(db::now_epoch())
        .bind(list.id)
        .execute(pool)
        .await?;
    }
    Ok(added)
}

/// Removes recipients from a list, decrementing the cached count by the
/// memberships actually deleted and clamping at zero.
pub async fn remove_recipients(
    pool: &SqlitePool,
    user_id: i64,
    list_id: i64,
    recipient_ids: &[i64],
) -> Result<u64> {
    if recipient_ids.is_empty() {
        return Err(Error::Validation(
            "please provide an array of recipient ids".into(),
        ));
    }
    let list = get_list(pool, user_id, list_id).await?;

    let mut qb = QueryBuilder::new("DELETE FROM list_members WHERE list_id = ");
    qb.push_bind(list.id);
    qb.push(" AND recipient_id IN (");
    let mut separated = qb.separated(", ");
    for id in recipient_ids {
        separated.push_bind(*id);
    }
    qb.push(")");
    let removed = qb.build().execute(pool).await?.rows_affected();

    if removed > 0 {
        sqlx::query(
            "UPDATE lists SET recipient_count = MAX(recipient_count - ?, 0), updated_at = ? \
             WHERE id = ?",
        )
        .bind(removed as i64)
        .bind(db::now_epoch())
        .bind(list.id)
        .execute(pool)
        .await?;
    }
    Ok(removed)
}

/// Deletes a list along with every membership referencing it.
pub async fn delete_list(pool: &SqlitePool, user_id: i64, list_id: i64) -> Result<()> {
    let list = get_list(pool, user_id, list_id).await?;
    sqlx::query("DELETE FROM list_members WHERE list_id = ?")
        .bind(list.id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM lists WHERE id = ?")
        .bind(list.id)
        .execute(pool)
        .await?;
    Ok(())
}
