use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::Result;

// Aggregate counters are updated independently of message records, so a
// partial persistence failure can leave them lagging. These recomputations are
// idempotent and keyed entirely off message rows, safe to run at any time.

/// Recomputes a campaign's sent/open counters from its message records.
pub async fn reconcile_campaign(pool: &SqlitePool, campaign_id: i64) -> Result<()> {
    let now = db::now_epoch();
    sqlx::query(
        r#"UPDATE campaigns SET
            sent_count = (SELECT COUNT(*) FROM messages WHERE campaign_id = ?),
            open_count = (SELECT COALESCE(SUM(open_count), 0) FROM messages WHERE campaign_id = ?),
            updated_at = ?
        WHERE id = ?"#,
    )
    .bind(campaign_id)
    .bind(campaign_id)
    .bind(now)
    .bind(campaign_id)
    .execute(pool)
    .await?;
    info!(campaign_id, "campaign counters reconciled from message records");
    Ok(())
}

/// Recomputes a recipient's send/open totals and last-activity timestamps
/// from its message records.
pub async fn reconcile_recipient(pool: &SqlitePool, recipient_id: i64) -> Result<()> {
    let now = db::now_epoch();
    sqlx::query(
        r#"UPDATE recipients SET
            total_emails_sent = (SELECT COUNT(*) FROM messages WHERE recipient_id = ?),
            total_emails_opened =
                (SELECT COALESCE(SUM(open_count), 0) FROM messages WHERE recipient_id = ?),
            last_email_sent_at = (SELECT MAX(sent_at) FROM messages WHERE recipient_id = ?),
            last_email_opened_at =
                (SELECT MAX(last_opened_at) FROM messages WHERE recipient_id = ?),
            updated_at = ?
        WHERE id = ?"#,
    )
    .bind(recipient_id)
    .bind(recipient_id)
    .bind(recipient_id)
    .bind(recipient_id)
    .bind(now)
    .bind(recipient_id)
    .execute(pool)
    .await?;
    info!(recipient_id, "recipient counters reconciled from message records");
    Ok(())
}
