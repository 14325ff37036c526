//! Alert events and the notifier dispatcher boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::Observation;
use crate::level::RiskLevel;
use crate::registry::IndexDefinition;

/// An alert-worthy transition of one index, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Index that transitioned.
    pub index_name: String,
    /// Level before the transition. `Unknown` for a startup baseline.
    pub from_level: RiskLevel,
    /// Level that triggered the alert.
    pub to_level: RiskLevel,
    /// Value in the index's canonical unit.
    pub value: f64,
    /// Measurement time of the triggering observation.
    pub observed_at: DateTime<Utc>,
    /// Label of the breached band, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Human-readable summary.
    pub message: String,
}

impl AlertEvent {
    /// Build an event for `def`, composing the message from the observation.
    #[must_use]
    pub fn new(
        def: &IndexDefinition,
        from_level: RiskLevel,
        to_level: RiskLevel,
        observation: &Observation,
        label: Option<String>,
    ) -> Self {
        let message = compose_message(def, from_level, to_level, observation, label.as_deref());
        Self {
            index_name: def.name.clone(),
            from_level,
            to_level,
            value: observation.value,
            observed_at: observation.observed_at,
            label,
            message,
        }
    }

    /// Short title, e.g. `"Bz: Warning (G3)"`.
    #[must_use]
    pub fn title(&self) -> String {
        match &self.label {
            Some(label) => format!("{}: {} ({label})", self.index_name, self.to_level),
            None => format!("{}: {}", self.index_name, self.to_level),
        }
    }
}

fn compose_message(
    def: &IndexDefinition,
    from_level: RiskLevel,
    to_level: RiskLevel,
    observation: &Observation,
    label: Option<&str>,
) -> String {
    let value = def.render_value(observation.value);
    let band = label.map(|label| format!(" ({label})")).unwrap_or_default();
    let previous = match from_level {
        RiskLevel::Unknown => String::new(),
        level => format!(", was {level}"),
    };
    format!(
        "{name} reached {to_level}{band} at {value}{previous}. Observed {time}. {prompt}",
        name = def.name,
        time = observation.observed_at.format("%Y-%m-%d %H:%M UTC"),
        prompt = to_level.action_prompt(),
    )
}

/// Outcome of handing an alert to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DispatchResult {
    /// Delivered, or accepted for best-effort delivery.
    Sent,
    /// Not delivered; the alert will be retried on the next cycle.
    Failed(String),
}

impl DispatchResult {
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Trait for notifier dispatchers.
///
/// The engine only decides whether and what to send. Transport, formatting
/// and internal retries belong to the implementation.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver `event`, returning whether it was accepted.
    async fn dispatch(&self, event: &AlertEvent) -> DispatchResult;
}
