//! Telegram Bot API notification channel.

use async_trait::async_trait;
use serde::Serialize;
use swx_engine::AlertEvent;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::severity;
use crate::NotifyChannel;

/// Environment variable for the bot token.
const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable for comma-separated chat ids.
const ENV_TELEGRAM_CHAT_IDS: &str = "TELEGRAM_CHAT_IDS";

/// Default Bot API endpoint.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel posting Markdown messages to one or more chats.
pub struct TelegramChannel {
    bot_token: Option<String>,
    chat_ids: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a channel for `chat_ids`, reading the bot token from the
    /// environment. Chat ids fall back to `TELEGRAM_CHAT_IDS` when none are
    /// given.
    #[must_use]
    pub fn from_env(chat_ids: &[String]) -> Self {
        let bot_token = std::env::var(ENV_TELEGRAM_BOT_TOKEN)
            .ok()
            .filter(|token| !token.is_empty());

        let chat_ids = if chat_ids.is_empty() {
            std::env::var(ENV_TELEGRAM_CHAT_IDS)
                .map(|ids| parse_chat_ids(&ids))
                .unwrap_or_default()
        } else {
            chat_ids.to_vec()
        };

        if bot_token.is_none() {
            debug!("Telegram notifications disabled (TELEGRAM_BOT_TOKEN not set)");
        } else if chat_ids.is_empty() {
            debug!("Telegram notifications disabled (no chat ids)");
        }

        Self {
            bot_token,
            chat_ids,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a channel with an explicit token and chats.
    #[must_use]
    pub fn new(bot_token: String, chat_ids: Vec<String>) -> Self {
        Self {
            bot_token: Some(bot_token),
            chat_ids,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Render an alert as Telegram legacy Markdown.
    fn format_text(event: &AlertEvent) -> String {
        let severity = severity(event);
        format!(
            "🚨 *Space Weather Alert ({level})*\n{marker} {message}\n📡 Observed: {time}",
            level = escape_markdown(&event.title()),
            marker = severity.marker(),
            message = escape_markdown(&event.message),
            time = event.observed_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }

    async fn send_to(
        &self,
        url: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self.client.post(url).json(&payload).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::from_response("Telegram", response).await)
        }
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.bot_token.is_some() && !self.chat_ids.is_empty()
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let token = self
            .bot_token
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_TELEGRAM_BOT_TOKEN.to_string()))?;
        if self.chat_ids.is_empty() {
            return Err(ChannelError::NotConfigured("telegram chat ids".to_string()));
        }

        let url = format!("{}/bot{token}/sendMessage", self.api_base);
        let text = Self::format_text(event);

        // Every chat is attempted. Delivery to any chat counts as sent, so
        // chats that already have the alert are not re-sent next cycle.
        let mut delivered = 0;
        let mut first_error = None;
        for chat_id in &self.chat_ids {
            debug!(channel = "telegram", chat_id = %chat_id, "Sending notification");
            match self.send_to(&url, chat_id, &text).await {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(
                        channel = "telegram",
                        chat_id = %chat_id,
                        error = %error,
                        "Telegram sendMessage failed"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) if delivered == 0 => Err(error),
            Some(_) => {
                warn!(
                    channel = "telegram",
                    delivered,
                    failed = self.chat_ids.len() - delivered,
                    "Notification reached only some chats"
                );
                Ok(())
            }
            None => {
                debug!(channel = "telegram", "Notification sent successfully");
                Ok(())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

fn parse_chat_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Escape the characters legacy Markdown treats as entity delimiters.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use swx_engine::RiskLevel;

    #[test]
    fn test_parse_chat_ids() {
        assert_eq!(parse_chat_ids("-100123, 42,,"), vec!["-100123", "42"]);
        assert!(parse_chat_ids("").is_empty());
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("bz_gsm *hot*"), r"bz\_gsm \*hot\*");
        assert_eq!(escape_markdown("S3 (Strong)"), "S3 (Strong)");
    }

    #[test]
    fn test_format_text() {
        let event = AlertEvent {
            index_name: "Proton_10MeV".to_string(),
            from_level: RiskLevel::Unknown,
            to_level: RiskLevel::Severe,
            value: 12_000.0,
            observed_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            label: Some("S4".to_string()),
            message: "Proton_10MeV reached Severe (S4).".to_string(),
        };

        let text = TelegramChannel::format_text(&event);
        assert!(text.starts_with("🚨 *Space Weather Alert (Proton\\_10MeV: Severe (S4))*"));
        assert!(text.contains("🔴 Proton\\_10MeV reached Severe (S4)."));
        assert!(text.ends_with("📡 Observed: 2025-05-01 12:00 UTC"));
    }

    #[test]
    fn test_enabled_requires_chats() {
        assert!(!TelegramChannel::new("token".to_string(), vec![]).enabled());
        assert!(TelegramChannel::new("token".to_string(), vec!["1".to_string()]).enabled());
    }
}
