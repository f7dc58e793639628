use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::models::message::{DeviceClass, Message};
use crate::models::FieldValue;

/// Fixed 1x1 transparent GIF returned for every tracking request.
pub const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Opens landing inside this window of the previous one are treated as
/// duplicate renders by the same client (image pre-fetch, proxy re-fetch) and
/// counted once.
pub const DEDUP_WINDOW_SECS: i64 = 60;

/// Unique opaque tracking token: 128 random bits, non-sequential so valid
/// tokens cannot be guessed to forge opens or scrape tracking data.
pub fn new_tracking_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn tracking_pixel_url(base_url: &str, tracking_id: &str) -> String {
    format!(
        "{}/track/open?emailId={}",
        base_url.trim_end_matches('/'),
        tracking_id
    )
}

/// Appends a zero-visible-area image reference to the HTML body. Wrapped in a
/// hidden container so the surrounding rendering is unchanged.
pub fn embed_tracking_pixel(html: &str, tracking_url: &str) -> String {
    format!(
        "{html}\n<div style=\"display:none;\">\
         <img src=\"{tracking_url}\" width=\"0\" height=\"0\" alt=\"\" \
         style=\"position:absolute;visibility:hidden;pointer-events:none;opacity:0;z-index:-1;\">\
         </div>"
    )
}

/// User-agent based device classification. Mobile patterns win over tablet
/// ones, so an Android tablet UA that also says "android" counts as mobile.
pub fn classify_device(user_agent: &str) -> DeviceClass {
    let ua = user_agent.to_ascii_lowercase();
    if ["mobile", "android", "iphone", "ipod"]
        .iter()
        .any(|p| ua.contains(p))
    {
        DeviceClass::Mobile
    } else if ua.contains("tablet") || ua.contains("ipad") {
        DeviceClass::Tablet
    } else {
        DeviceClass::Desktop
    }
}

/// Client-side metadata accompanying an open request.
#[derive(Debug, Default)]
pub struct OpenRequest {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// What `record_open` did with a request; the HTTP response is the pixel in
/// every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDisposition {
    /// Counters updated.
    Counted,
    /// Inside the de-dup window; nothing updated.
    Duplicate,
    /// Tracking id did not resolve to a message.
    Unknown,
}

/// Resolves a tracking id and applies the open-event rules: 60s rolling
/// de-duplication, first-open status transition, atomic counter increments,
/// and the recipient/campaign cascade. Failures in one cascade target never
/// block the others, and the caller returns the pixel regardless.
pub async fn record_open(
    pool: &SqlitePool,
    tracking_id: &str,
    request: OpenRequest,
) -> Result<OpenDisposition> {
    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE tracking_id = ?")
        .bind(tracking_id)
        .fetch_optional(pool)
        .await?;

    let Some(message) = message else {
        return Ok(OpenDisposition::Unknown);
    };

    let now = db::now_epoch();
    let window_start = now - DEDUP_WINDOW_SECS;

    let device = request.user_agent.as_deref().map(classify_device);
    let mut metadata = message.metadata.0.clone();
    metadata.insert(
        "referer".to_string(),
        FieldValue::Text(request.referer.unwrap_or_else(|| "direct".into())),
    );

    // The de-dup check is part of the WHERE clause so concurrent requests for
    // the same message race on a single conditional update instead of a
    // read-then-write. The status CASE and COALESCE make the first-open
    // transition idempotent: once opened, status and opened_at never regress.
    let updated = sqlx::query(
        r#"UPDATE messages SET
            status = CASE WHEN status = 'sent' THEN 'opened' ELSE status END,
            opened_at = COALESCE(opened_at, ?),
            open_count = open_count + 1,
            last_opened_at = ?,
            ip_address = ?,
            user_agent = ?,
            device = ?,
            metadata = ?
        WHERE id = ? AND (last_opened_at IS NULL OR last_opened_at <= ?)"#,
    )
    .bind(now)
    .bind(now)
    .bind(&request.ip_address)
    .bind(&request.user_agent)
    .bind(device)
    .bind(Json(metadata))
    .bind(message.id)
    .bind(window_start)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(OpenDisposition::Duplicate);
    }

    // Cascade to the recipient and campaign aggregates. Each is attempted
    // independently; a failed write is logged with enough context to reconcile
    // and never stops the rest.
    if let Err(e) = sqlx::query(
        "UPDATE recipients SET total_emails_opened = total_emails_opened + 1, \
         last_email_opened_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(message.recipient_id)
    .execute(pool)
    .await
    {
        warn!(tracking_id, recipient_id = message.recipient_id, error = %e,
            "open recorded but recipient counters not updated");
    }

    if let Some(campaign_id) = message.campaign_id {
        if let Err(e) = sqlx::query(
            "UPDATE campaigns SET open_count = open_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(campaign_id)
        .execute(pool)
        .await
        {
            warn!(tracking_id, campaign_id, error = %e,
                "open recorded but campaign counters not updated");
        }
    }

    Ok(OpenDisposition::Counted)
}

/// Convenience wrapper used by the pixel route: absorbs every error so the
/// handler has nothing left to surface.
pub async fn record_open_quietly(pool: &SqlitePool, tracking_id: &str, request: OpenRequest) {
    match record_open(pool, tracking_id, request).await {
        Ok(disposition) => {
            tracing::debug!(tracking_id, ?disposition, "open request processed");
        }
        Err(e) => {
            warn!(tracking_id, error = %e, "open request failed; pixel returned anyway");
        }
    }
}
