//! Email channel over SMTP with STARTTLS.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use swx_engine::{AlertEvent, NotifySettings};
use tracing::{debug, info};

use crate::error::ChannelError;
use crate::events::{alert_fields, severity};
use crate::NotifyChannel;

/// Default SMTP host.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

const ENV_SMTP_USERNAME: &str = "SMTP_USERNAME";
const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address (usually same as username).
    pub from: String,
}

/// Email notification channel.
pub struct EmailChannel {
    smtp: Option<SmtpConfig>,
    recipients: Vec<String>,
}

impl EmailChannel {
    /// Create a channel with explicit SMTP settings.
    #[must_use]
    pub fn new(smtp: SmtpConfig, recipients: Vec<String>) -> Self {
        Self {
            smtp: Some(smtp),
            recipients,
        }
    }

    /// Build from the `[notify]` settings, taking credentials from
    /// `SMTP_USERNAME` and `SMTP_PASSWORD`.
    #[must_use]
    pub fn from_settings(settings: &NotifySettings) -> Self {
        let username = std::env::var(ENV_SMTP_USERNAME).ok();
        let password = std::env::var(ENV_SMTP_PASSWORD).ok();

        let smtp = match (username, password) {
            (Some(username), Some(password)) => Some(SmtpConfig {
                host: settings
                    .smtp_host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: settings.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
                from: settings.email_from.clone().unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => {
                debug!("Email notifications disabled (SMTP credentials not set)");
                None
            }
        };

        Self {
            smtp,
            recipients: settings.email_recipients.clone(),
        }
    }

    /// Build the message for an alert.
    fn build_message(
        smtp: &SmtpConfig,
        recipients: &[String],
        event: &AlertEvent,
    ) -> Result<Message, ChannelError> {
        let from: Mailbox = smtp
            .from
            .parse()
            .map_err(|e| ChannelError::Email(format!("invalid from address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(format!("[{}] {}", severity(event).as_str(), event.title()));
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| ChannelError::Email(format!("invalid recipient {recipient}: {e}")))?;
            builder = builder.to(to);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(format_body(event))
            .map_err(|e| ChannelError::Email(format!("failed to build message: {e}")))
    }
}

fn format_body(event: &AlertEvent) -> String {
    let mut body = format!("{}\n\n", event.message);
    for (name, value) in alert_fields(event) {
        body.push_str(&format!("{name}: {value}\n"));
    }
    body.push_str("\n---\nSent by swx-monitor\n");
    body
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn enabled(&self) -> bool {
        self.smtp.is_some() && !self.recipients.is_empty()
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let smtp = self
            .smtp
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_SMTP_USERNAME.to_string()))?;
        if self.recipients.is_empty() {
            return Err(ChannelError::NotConfigured("email recipients".to_string()));
        }

        let message = Self::build_message(smtp, &self.recipients, event)?;

        let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                .map_err(|e| ChannelError::Email(format!("failed to create SMTP transport: {e}")))?
                .port(smtp.port)
                .credentials(creds)
                .build();

        mailer
            .send(message)
            .await
            .map_err(|e| ChannelError::Email(e.to_string()))?;

        info!(
            channel = "email",
            recipients = self.recipients.len(),
            title = %event.title(),
            "Email sent successfully"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use swx_engine::RiskLevel;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "monitor@example.com".to_string(),
            password: "secret".to_string(),
            from: "monitor@example.com".to_string(),
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            index_name: "Xray".to_string(),
            from_level: RiskLevel::Watch,
            to_level: RiskLevel::Warning,
            value: 2.3e-5,
            observed_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            label: None,
            message: "Xray reached Warning at M2.3, was Watch.".to_string(),
        }
    }

    #[test]
    fn test_build_message() {
        let recipients = vec!["ops@example.com".to_string(), "duty@example.com".to_string()];
        let message = EmailChannel::build_message(&smtp(), &recipients, &event()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: [Warning] Xray: Warning"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("duty@example.com"));
        assert!(raw.contains("Xray reached Warning at M2.3, was Watch."));
    }

    #[test]
    fn test_invalid_recipient() {
        let err = EmailChannel::build_message(&smtp(), &["not an address".to_string()], &event())
            .unwrap_err();
        assert!(matches!(err, ChannelError::Email(_)));
    }

    #[test]
    fn test_enabled_requires_recipients() {
        assert!(!EmailChannel::new(smtp(), vec![]).enabled());
        assert!(EmailChannel::new(smtp(), vec!["ops@example.com".to_string()]).enabled());
    }

    #[test]
    fn test_body_lists_fields() {
        let body = format_body(&event());
        assert!(body.contains("Level: Warning\n"));
        assert!(body.contains("Previous: Watch\n"));
    }
}
