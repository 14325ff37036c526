//! Notification channel implementations.

pub mod email;
pub mod slack;
pub mod telegram;

use async_trait::async_trait;
use swx_engine::AlertEvent;

use crate::error::ChannelError;

/// Trait for notification channels (Slack, Telegram, email).
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Deliver an alert to this channel.
    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError>;
}
