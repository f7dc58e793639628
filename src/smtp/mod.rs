use async_trait::async_trait;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::error::Error;

/// Resolved SMTP connection parameters for one send. Comes from the user's
/// override when present, otherwise the system default.
#[derive(Debug, Clone)]
pub struct SmtpParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// Extra headers, e.g. the tracking reference and List-Unsubscribe.
    pub headers: Vec<(String, String)>,
}

/// Capability that accepts a resolved message and reports success or failure.
/// Returns the provider message id on success.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, params: &SmtpParams, mail: &OutgoingEmail) -> Result<String, Error>;
}

/// lettre-backed transport. A fresh relay is built per call because campaign
/// sends may switch between per-user SMTP settings mid-batch.
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        SmtpMailer { timeout }
    }

    fn build_message(mail: &OutgoingEmail) -> Result<Message, Error> {
        let from = mail
            .from
            .parse()
            .map_err(|e| Error::Delivery(format!("invalid from address {}: {e}", mail.from)))?;
        let to = mail
            .to
            .parse()
            .map_err(|e| Error::Delivery(format!("invalid recipient address {}: {e}", mail.to)))?;

        let mut message = Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .map_err(|e| Error::Delivery(e.to_string()))?;

        for (name, value) in &mail.headers {
            let header_name = HeaderName::new_from_ascii(name.clone())
                .map_err(|e| Error::Delivery(format!("invalid header {name}: {e}")))?;
            message
                .headers_mut()
                .insert_raw(HeaderValue::new(header_name, value.clone()));
        }
        Ok(message)
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, params: &SmtpParams, mail: &OutgoingEmail) -> Result<String, Error> {
        let message = Self::build_message(mail)?;

        let tls = TlsParameters::new(params.host.clone())
            .map_err(|e| Error::Delivery(e.to_string()))?;

        let mut builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(&params.host) {
            Ok(b) => b,
            Err(_) => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&params.host),
        };
        builder = builder.port(params.port).timeout(Some(self.timeout));

        // Port 465 expects implicit TLS, everything else STARTTLS.
        builder = if params.port == 465 {
            builder.tls(Tls::Wrapper(tls))
        } else {
            builder.tls(Tls::Required(tls))
        };

        if !params.username.is_empty() {
            // Strip whitespace that sneaks in from copied app passwords.
            let password: String = params
                .password
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            builder = builder
                .credentials(Credentials::new(params.username.clone(), password))
                .authentication(vec![Mechanism::Plain, Mechanism::Login]);
        }

        let mailer = builder.build();
        let response = mailer
            .send(message)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;

        let provider_id = response
            .message()
            .next()
            .map(|line| line.to_string())
            .unwrap_or_default();
        Ok(provider_id)
    }
}
