use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Opened,
    Clicked,
    Bounced,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

/// One record per send attempt. The tracking id is unique across the whole
/// store; subject and body are the post-personalization snapshot and never
/// change after the send. Open fields are mutated only by the tracking handler.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub tracking_id: String,
    pub user_id: i64,
    pub campaign_id: Option<i64>,
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    pub sent_at: i64,
    pub opened_at: Option<i64>,
    pub open_count: i64,
    pub last_opened_at: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<DeviceClass>,
    pub metadata: Json<FieldMap>,
}
