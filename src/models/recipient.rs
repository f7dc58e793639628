use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::BTreeMap;

use super::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecipientStatus {
    Active,
    Unsubscribed,
    Bounced,
    Complained,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub status: RecipientStatus,
    pub unsubscribed_at: Option<i64>,
    pub last_email_sent_at: Option<i64>,
    pub last_email_opened_at: Option<i64>,
    pub total_emails_sent: i64,
    pub total_emails_opened: i64,
    pub custom_fields: Json<FieldMap>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Recipient {
    /// Placeholder attributes for personalization. Only attributes that are
    /// actually present appear here; absent ones leave their placeholder
    /// verbatim in the output. Returned as a BTreeMap so substitution order
    /// (and therefore output) is deterministic.
    pub fn personalization_attrs(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        if let Some(name) = &self.name {
            attrs.insert("name".to_string(), name.clone());
        }
        if let Some(first) = &self.first_name {
            attrs.insert("firstName".to_string(), first.clone());
        }
        if let Some(last) = &self.last_name {
            attrs.insert("lastName".to_string(), last.clone());
        }
        attrs.insert("email".to_string(), self.email.clone());
        if let Some(company) = &self.company {
            attrs.insert("company".to_string(), company.clone());
        }
        for (key, value) in self.custom_fields.iter() {
            attrs.entry(key.clone()).or_insert_with(|| value.render());
        }
        attrs
    }
}
