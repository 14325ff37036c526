//! Alert delivery for the space-weather monitor.
//!
//! This crate delivers the risk engine's [`AlertEvent`]s to Slack, Telegram
//! and email, and plugs into the engine as its [`Dispatcher`].
//!
//! # Usage
//!
//! ```no_run
//! use notify::Notifier;
//! use swx_engine::NotifySettings;
//!
//! // Channels come from the [notify] settings plus environment secrets
//! let notifier = Notifier::from_settings(&NotifySettings::default());
//! assert!(notifier.channel_count() <= 3);
//! ```
//!
//! # Configuration
//!
//! Secrets are read from environment variables:
//!
//! - `SLACK_WEBHOOK_URL`: Slack webhook URL (enables Slack channel)
//! - `TELEGRAM_BOT_TOKEN`: Telegram bot token (enables Telegram with the configured chats)
//! - `SMTP_USERNAME` / `SMTP_PASSWORD`: SMTP credentials (enables email)
//! - `NOTIFY_DISABLED`: Set to "true" to disable all notifications
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`SlackChannel`], [`TelegramChannel`] and [`EmailChannel`] implement it
//! - [`Notifier`] fans an alert out to all enabled channels

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::email::{EmailChannel, SmtpConfig};
pub use channels::slack::SlackChannel;
pub use channels::telegram::TelegramChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::Severity;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use swx_engine::{AlertEvent, DispatchResult, Dispatcher, NotifySettings};
use tracing::{debug, error, info, warn};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Outcome of one channel for one alert.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: &'static str,
    pub result: Result<(), ChannelError>,
}

/// Central notification dispatcher.
///
/// The `Notifier` manages multiple notification channels and delivers each
/// alert to all enabled channels concurrently.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a notifier from the `[notify]` settings.
    ///
    /// Channels whose secrets are missing from the environment are left out.
    #[must_use]
    pub fn from_settings(settings: &NotifySettings) -> Self {
        if notifications_disabled() {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self::disabled();
        }

        let candidates: Vec<Arc<dyn NotifyChannel>> = vec![
            Arc::new(SlackChannel::from_env()),
            Arc::new(TelegramChannel::from_env(&settings.telegram_chat_ids)),
            Arc::new(EmailChannel::from_settings(settings)),
        ];

        let channels: Vec<_> = candidates
            .into_iter()
            .filter(|channel| {
                let enabled = channel.enabled();
                if enabled {
                    info!(channel = channel.name(), "Notification channel enabled");
                }
                enabled
            })
            .collect();

        if channels.is_empty() {
            warn!("No notification channels configured, alerts will only be logged");
        } else {
            info!(
                channel_count = channels.len(),
                "Notification system initialized"
            );
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a notifier from environment variables only.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_settings(&NotifySettings::default())
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Names of the enabled channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&'static str> {
        if self.disabled {
            return vec![];
        }
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Deliver an alert to every channel and wait for all of them.
    ///
    /// Returns one report per channel, in channel order. A disabled notifier
    /// returns no reports.
    pub async fn notify_and_wait(&self, event: &AlertEvent) -> Vec<ChannelReport> {
        if self.disabled {
            return vec![];
        }

        join_all(self.channels.iter().map(|channel| async move {
            let channel_name = channel.name();
            let result = if channel.enabled() {
                channel.send(event).await
            } else {
                Err(ChannelError::NotConfigured(channel_name.to_string()))
            };

            match &result {
                Ok(()) => debug!(channel = channel_name, "Notification sent"),
                Err(e) => error!(
                    channel = channel_name,
                    error = %e,
                    "Failed to send notification"
                ),
            }
            ChannelReport {
                channel: channel_name,
                result,
            }
        }))
        .await
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl Dispatcher for Notifier {
    /// `Sent` when at least one channel accepted the alert. A notifier with
    /// no channels, or a disabled one, only logs the alert.
    async fn dispatch(&self, event: &AlertEvent) -> DispatchResult {
        if !self.has_channels() {
            info!(
                index = %event.index_name,
                level = %event.to_level,
                message = %event.message,
                "Alert (no delivery channel)"
            );
            return DispatchResult::Sent;
        }

        let reports = self.notify_and_wait(event).await;
        if reports.iter().any(|report| report.result.is_ok()) {
            return DispatchResult::Sent;
        }

        let reasons: Vec<String> = reports
            .iter()
            .filter_map(|report| {
                report
                    .result
                    .as_ref()
                    .err()
                    .map(|e| format!("{}: {e}", report.channel))
            })
            .collect();
        DispatchResult::Failed(reasons.join("; "))
    }
}

fn notifications_disabled() -> bool {
    std::env::var(ENV_NOTIFY_DISABLED)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}
