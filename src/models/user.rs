use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::smtp::SmtpParams;

/// A sending user. Quota is a plain counter check: `emails_sent` must stay
/// below `email_quota` for a send to be admitted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub email_quota: i64,
    pub emails_sent: i64,
    pub last_email_sent_at: Option<i64>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i64>,
    #[serde(skip_serializing)]
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Per-user SMTP configuration, falling back to the system default.
    pub fn smtp_params(&self, config: &Config) -> SmtpParams {
        match &self.smtp_host {
            Some(host) if !host.is_empty() => SmtpParams {
                host: host.clone(),
                port: self.smtp_port.unwrap_or(587) as u16,
                username: self.smtp_username.clone().unwrap_or_default(),
                password: self.smtp_password.clone().unwrap_or_default(),
            },
            _ => SmtpParams {
                host: config.smtp_host.clone(),
                port: config.smtp_port,
                username: config.smtp_username.clone(),
                password: config.smtp_password.clone(),
            },
        }
    }

    pub fn from_address(&self, config: &Config) -> String {
        self.from_email
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| config.from_email.clone())
    }
}
