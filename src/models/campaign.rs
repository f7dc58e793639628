use serde::{Deserialize, Serialize};

/// Campaign lifecycle: draft -> scheduled (optional) -> sending -> sent, with
/// error reachable from sending and paused/cancelled as administrative states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Paused,
    Cancelled,
    Error,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub body: String,
    pub status: CampaignStatus,
    pub scheduled_for: Option<i64>,
    pub sent_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub open_count: i64,
    pub click_count: i64,
    pub bounce_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
