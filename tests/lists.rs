mod common;

use common::*;
use mailtrack::error::Error;
use mailtrack::models::list::List;
use mailtrack::services::list_service;
use sqlx::SqlitePool;

async fn seed_list(pool: &SqlitePool, user_id: i64, name: &str) -> List {
    let now = mailtrack::db::now_epoch();
    let id = sqlx::query(
        "INSERT INTO lists (user_id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();
    list_service::get_list(pool, user_id, id).await.unwrap()
}

#[tokio::test]
async fn membership_changes_keep_count_exact() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let list = seed_list(pool, user.id, "Newsletter").await;

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(seed_recipient(pool, user.id, &format!("r{i}@acme.test")).await.id);
    }

    let added = list_service::add_recipients(pool, user.id, list.id, &ids)
        .await
        .unwrap();
    assert_eq!(added, 3);
    assert_eq!(
        list_service::get_list(pool, user.id, list.id).await.unwrap().recipient_count,
        3
    );

    // Re-adding the same members is a no-op for the count.
    let added = list_service::add_recipients(pool, user.id, list.id, &ids)
        .await
        .unwrap();
    assert_eq!(added, 0);
    assert_eq!(
        list_service::get_list(pool, user.id, list.id).await.unwrap().recipient_count,
        3
    );

    let removed = list_service::remove_recipients(pool, user.id, list.id, &ids[..2])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(
        list_service::get_list(pool, user.id, list.id).await.unwrap().recipient_count,
        1
    );

    // Removing members that are not in the list leaves the count alone and it
    // never goes negative.
    let removed = list_service::remove_recipients(pool, user.id, list.id, &ids)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let list = list_service::get_list(pool, user.id, list.id).await.unwrap();
    assert_eq!(list.recipient_count, 0);

    let removed = list_service::remove_recipients(pool, user.id, list.id, &ids)
        .await
        .unwrap();
    assert_eq!(removed, 0);
    let list = list_service::get_list(pool, user.id, list.id).await.unwrap();
    assert_eq!(list.recipient_count, 0);
}

#[tokio::test]
async fn other_users_recipients_never_join() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let owner = seed_user(pool, "key-1", 10).await;
    let stranger = seed_user(pool, "key-2", 10).await;
    let list = seed_list(pool, owner.id, "Newsletter").await;
    let foreign = seed_recipient(pool, stranger.id, "other@acme.test").await;

    let added = list_service::add_recipients(pool, owner.id, list.id, &[foreign.id])
        .await
        .unwrap();
    assert_eq!(added, 0);
    let list = list_service::get_list(pool, owner.id, list.id).await.unwrap();
    assert_eq!(list.recipient_count, 0);

    // Nor can the stranger touch the owner's list at all.
    let err = list_service::get_list(pool, stranger.id, list.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn deleting_a_list_removes_memberships() {
    let app = TestApp::new().await;
    let pool = app.pool();
    let user = seed_user(pool, "key-1", 10).await;
    let list = seed_list(pool, user.id, "Newsletter").await;
    let recipient = seed_recipient(pool, user.id, "ana@acme.test").await;
    list_service::add_recipients(pool, user.id, list.id, &[recipient.id])
        .await
        .unwrap();

    list_service::delete_list(pool, user.id, list.id).await.unwrap();

    let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM list_members WHERE list_id = ?")
        .bind(list.id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(members, 0);
    let err = list_service::get_list(pool, user.id, list.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
