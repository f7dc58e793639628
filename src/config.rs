use anyhow::{Context, Result};
use std::env;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Externally reachable base URL embedded in tracking pixel links.
    pub base_url: String,
    pub port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub default_email_quota: i64,
    /// Delay between consecutive sends in a campaign batch.
    pub batch_pacing_ms: u64,
    /// Upper bound on a single transport call.
    pub smtp_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://mailtrack.db".into());
        let base_url = env::var("BASE_URL").context("BASE_URL must be set")?;
        let smtp_host = env::var("SMTP_HOST").context("SMTP_HOST must be set")?;
        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_email = env::var("EMAIL_FROM").context("EMAIL_FROM must be set")?;
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);
        let default_email_quota = env::var("DEFAULT_EMAIL_QUOTA")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let batch_pacing_ms = env::var("BATCH_PACING_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);
        let smtp_timeout_secs = env::var("SMTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Config {
            database_url,
            base_url,
            port,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_email,
            default_email_quota,
            batch_pacing_ms,
            smtp_timeout_secs,
        })
    }

    /// A pixel URL pointing at a loopback address is useless to a remote mail
    /// client, so sends are refused outright rather than emitting broken tracking.
    pub fn ensure_public_base_url(&self) -> Result<(), Error> {
        let base = self.base_url.to_ascii_lowercase();
        if base.contains("localhost") || base.contains("127.0.0.1") || base.contains("[::1]") {
            return Err(Error::Configuration(format!(
                "BASE_URL {} is a loopback address; set it to a public URL",
                self.base_url
            )));
        }
        Ok(())
    }
}
