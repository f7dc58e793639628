use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::models::campaign::Campaign;
use crate::models::recipient::Recipient;
use crate::models::user::User;
use crate::services::{personalize, tracking};
use crate::smtp::{MailTransport, OutgoingEmail};

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    #[serde(rename = "emailId")]
    pub tracking_id: String,
    #[serde(rename = "messageId")]
    pub provider_message_id: String,
}

/// Sends one tracked email: quota and base-URL preconditions, tracking id
/// issuance, personalization, pixel embedding, transport call, then message
/// persistence and counter increments. Nothing is persisted when the
/// preconditions or the transport fail.
pub async fn send_email(
    pool: &SqlitePool,
    config: &Config,
    mailer: &dyn MailTransport,
    user: &User,
    recipient: &Recipient,
    subject_template: &str,
    body_template: &str,
    campaign: Option<&Campaign>,
) -> Result<SendOutcome> {
    // Quota is re-read rather than taken from the caller's snapshot; during a
    // campaign batch the counter moves on every send.
    let (emails_sent, email_quota) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT emails_sent, email_quota FROM users WHERE id = ?",
    )
    .bind(user.id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("user"))?;

    if emails_sent >= email_quota {
        return Err(Error::QuotaExceeded);
    }

    config.ensure_public_base_url()?;

    let tracking_id = tracking::new_tracking_id();
    let attrs = recipient.personalization_attrs();
    let subject = personalize::personalize(subject_template, &attrs);
    let body = personalize::personalize(body_template, &attrs);
    let pixel_url = tracking::tracking_pixel_url(&config.base_url, &tracking_id);
    let html_body = tracking::embed_tracking_pixel(&body, &pixel_url);

    let mail = OutgoingEmail {
        from: user.from_address(config),
        to: recipient.email.clone(),
        subject: subject.clone(),
        html_body: html_body.clone(),
        headers: vec![
            ("X-Entity-Ref-ID".to_string(), tracking_id.clone()),
            (
                "List-Unsubscribe".to_string(),
                format!(
                    "<{}/unsubscribe?emailId={}>",
                    config.base_url.trim_end_matches('/'),
                    tracking_id
                ),
            ),
            ("Precedence".to_string(), "bulk".to_string()),
            (
                "X-Auto-Response-Suppress".to_string(),
                "OOF, AutoReply".to_string(),
            ),
        ],
    };

    let params = user.smtp_params(config);
    let provider_message_id = tokio::time::timeout(
        Duration::from_secs(config.smtp_timeout_secs),
        mailer.deliver(&params, &mail),
    )
    .await
    .map_err(|_| Error::Delivery("transport call timed out".into()))??;

    let now = db::now_epoch();
    let campaign_id = campaign.map(|c| c.id);

    // The message record is the source of truth for later reconciliation; if
    // it cannot be written the send is reported as a persistence failure even
    // though the transport accepted it.
    if let Err(e) = sqlx::query(
        r#"INSERT INTO messages
            (tracking_id, user_id, campaign_id, recipient_id, subject, body,
             status, sent_at, open_count, metadata)
        VALUES (?, ?, ?, ?, ?, ?, 'sent', ?, 0, ?)"#,
    )
    .bind(&tracking_id)
    .bind(user.id)
    .bind(campaign_id)
    .bind(recipient.id)
    .bind(&subject)
    .bind(&html_body)
    .bind(now)
    .bind(Json(HashMap::<String, crate::models::FieldValue>::new()))
    .execute(pool)
    .await
    {
        error!(tracking_id, to = %recipient.email, error = %e,
            "message delivered but not persisted; counters will lag until reconciled");
        return Err(e.into());
    }

    // Counter increments are atomic in-place updates. A failure here is
    // isolated and logged with the tracking id so aggregates can be
    // reconciled from message records.
    if let Err(e) = sqlx::query(
        "UPDATE users SET emails_sent = emails_sent + 1, last_email_sent_at = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    {
        warn!(tracking_id, user_id = user.id, error = %e, "sender counters not updated");
    }

    if let Err(e) = sqlx::query(
        "UPDATE recipients SET total_emails_sent = total_emails_sent + 1, \
         last_email_sent_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(recipient.id)
    .execute(pool)
    .await
    {
        warn!(tracking_id, recipient_id = recipient.id, error = %e,
            "recipient counters not updated");
    }

    if let Some(campaign_id) = campaign_id {
        if let Err(e) = sqlx::query(
            "UPDATE campaigns SET sent_count = sent_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(campaign_id)
        .execute(pool)
        .await
        {
            warn!(tracking_id, campaign_id, error = %e, "campaign counters not updated");
        }

        // First successful send flips the campaign into "sending" and stamps
        // sent_at, once.
        if let Err(e) = sqlx::query(
            "UPDATE campaigns SET sent_at = ?, status = 'sending', updated_at = ? \
             WHERE id = ? AND sent_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(campaign_id)
        .execute(pool)
        .await
        {
            warn!(tracking_id, campaign_id, error = %e, "campaign sent_at not initialized");
        }
    }

    info!(tracking_id, to = %recipient.email, "email sent");
    Ok(SendOutcome {
        tracking_id,
        provider_message_id,
    })
}
