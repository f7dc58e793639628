use sqlx::{QueryBuilder, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::models::campaign::{Campaign, CampaignStatus};
use crate::models::recipient::Recipient;
use crate::models::user::User;
use crate::services::send_service;
use crate::smtp::MailTransport;

/// A validated batch, ready to run. Produced by [`prepare_batch`]; the caller
/// decides whether to run it inline (tests) or on a background task (the send
/// endpoint, which acknowledges immediately with the campaign id).
#[derive(Debug)]
pub struct CampaignBatch {
    pub campaign: Campaign,
    pub user: User,
    pub recipients: Vec<Recipient>,
}

pub async fn get_campaign(pool: &SqlitePool, user_id: i64, campaign_id: i64) -> Result<Campaign> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ? AND user_id = ?")
        .bind(campaign_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("campaign"))
}

/// Validates a campaign send and durably transitions the campaign to
/// "sending" before any message goes out, so a crash mid-batch leaves an
/// observable "sending" campaign rather than a draft. Fails fast with no side
/// effects on quota shortfall or when no active recipient resolves.
pub async fn prepare_batch(
    pool: &SqlitePool,
    user: &User,
    campaign_id: i64,
    recipient_ids: &[i64],
) -> Result<CampaignBatch> {
    let campaign = get_campaign(pool, user.id, campaign_id).await?;

    if campaign.status == CampaignStatus::Sent {
        return Err(Error::Validation("campaign has already been sent".into()));
    }
    if recipient_ids.is_empty() {
        return Err(Error::Validation("no recipients specified".into()));
    }

    let mut qb = QueryBuilder::new("SELECT * FROM recipients WHERE user_id = ");
    qb.push_bind(user.id);
    qb.push(" AND status = 'active' AND id IN (");
    let mut separated = qb.separated(", ");
    for id in recipient_ids {
        separated.push_bind(*id);
    }
    qb.push(")");
    let recipients: Vec<Recipient> = qb.build_query_as().fetch_all(pool).await?;

    if recipients.is_empty() {
        return Err(Error::Validation("no active recipients found".into()));
    }

    let (emails_sent, email_quota) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT emails_sent, email_quota FROM users WHERE id = ?",
    )
    .bind(user.id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("user"))?;

    if emails_sent + recipients.len() as i64 > email_quota {
        return Err(Error::QuotaExceeded);
    }

    let now = db::now_epoch();
    sqlx::query(
        "UPDATE campaigns SET status = 'sending', sent_at = ?, total_recipients = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(recipients.len() as i64)
    .bind(now)
    .bind(campaign.id)
    .execute(pool)
    .await?;

    let campaign = get_campaign(pool, user.id, campaign_id).await?;
    info!(
        campaign_id = campaign.id,
        recipients = recipients.len(),
        "campaign batch prepared"
    );

    Ok(CampaignBatch {
        campaign,
        user: user.clone(),
        recipients,
    })
}

/// Drives the send pipeline across the batch, strictly sequentially with a
/// pacing delay between messages so the transport endpoint is never burst.
/// A failed recipient is logged and skipped, with no in-batch retry; only a
/// failure of the orchestrator's own bookkeeping marks the campaign "error".
pub async fn run_batch(
    pool: SqlitePool,
    config: Arc<Config>,
    mailer: Arc<dyn MailTransport>,
    batch: CampaignBatch,
) {
    let CampaignBatch {
        campaign,
        user,
        recipients,
    } = batch;
    let total = recipients.len();
    let mut delivered = 0usize;

    for (i, recipient) in recipients.iter().enumerate() {
        match send_service::send_email(
            &pool,
            &config,
            mailer.as_ref(),
            &user,
            recipient,
            &campaign.subject,
            &campaign.body,
            Some(&campaign),
        )
        .await
        {
            Ok(outcome) => {
                delivered += 1;
                tracing::debug!(
                    campaign_id = campaign.id,
                    tracking_id = %outcome.tracking_id,
                    "campaign message sent"
                );
            }
            Err(e) => {
                warn!(campaign_id = campaign.id, to = %recipient.email, error = %e,
                    "campaign message failed; continuing batch");
            }
        }

        if i + 1 < total && config.batch_pacing_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.batch_pacing_ms)).await;
        }
    }

    let now = db::now_epoch();
    let finish = sqlx::query(
        "UPDATE campaigns SET status = 'sent', completed_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(campaign.id)
    .execute(&pool)
    .await;

    match finish {
        Ok(_) => {
            info!(
                campaign_id = campaign.id,
                delivered, total, "campaign batch completed"
            );
        }
        Err(e) => {
            error!(campaign_id = campaign.id, error = %e, "campaign completion not persisted");
            if let Err(e2) = sqlx::query(
                "UPDATE campaigns SET status = 'error', updated_at = ? WHERE id = ?",
            )
            .bind(now)
            .bind(campaign.id)
            .execute(&pool)
            .await
            {
                error!(campaign_id = campaign.id, error = %e2,
                    "campaign error status not persisted");
            }
        }
    }
}
