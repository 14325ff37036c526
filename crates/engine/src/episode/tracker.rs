//! Per-index episode state across polling cycles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::policy::{notification_action, transition, NotifyAction, Transition};
use crate::alert::{AlertEvent, DispatchResult};
use crate::classify::classify_missing;
use crate::ingest::Observation;
use crate::level::RiskLevel;
use crate::registry::IndexDefinition;

/// Risk episode of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Index this episode tracks.
    pub index_name: String,
    /// Level the index currently sits at.
    pub current_level: RiskLevel,
    /// Level held before `current_level` was entered.
    pub previous_level: Option<RiskLevel>,
    /// When `current_level` was entered.
    pub entered_at: DateTime<Utc>,
    /// Highest level notified since the last return to `Nominal`.
    /// Only advanced by a confirmed dispatch.
    pub last_notified_level: Option<RiskLevel>,
    /// Measurement time of the newest observation.
    pub last_observation_at: Option<DateTime<Utc>>,
    /// Value of the newest observation.
    pub last_value: Option<f64>,
    /// Label of the band the last fresh value fell in.
    pub label: Option<String>,
    /// Whether the newest observation is older than the index tolerance.
    pub stale: bool,
}

impl Episode {
    fn new(index_name: &str, level: RiskLevel, now: DateTime<Utc>) -> Self {
        Self {
            index_name: index_name.to_string(),
            current_level: level,
            previous_level: None,
            entered_at: now,
            last_notified_level: None,
            last_observation_at: None,
            last_value: None,
            label: None,
            stale: level == RiskLevel::Unknown,
        }
    }

    fn enter(&mut self, level: RiskLevel, now: DateTime<Utc>) {
        self.previous_level = Some(self.current_level);
        self.current_level = level;
        self.entered_at = now;
    }
}

/// Owner of every episode. One tracker per engine; never shared between
/// engines and never persisted.
#[derive(Debug, Default)]
pub struct EpisodeTracker {
    episodes: HashMap<String, Episode>,
}

impl EpisodeTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Episode of an index, if it has been observed at least once.
    #[must_use]
    pub fn get(&self, index_name: &str) -> Option<&Episode> {
        self.episodes.get(index_name)
    }

    /// Number of tracked episodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Whether no index has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Apply a fresh classification of `observation`.
    ///
    /// Returns the alert to dispatch when the notification table says so. The
    /// notified level is not advanced here; call [`record_dispatch`] with the
    /// outcome.
    ///
    /// An observation already older than the index tolerance is recorded but
    /// treated as missing data.
    ///
    /// [`record_dispatch`]: Self::record_dispatch
    pub fn observe(
        &mut self,
        def: &IndexDefinition,
        observation: &Observation,
        level: RiskLevel,
        label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        if observation.age_at(now) > def.stale_after {
            debug!(
                index = %def.name,
                observed_at = %observation.observed_at,
                "Observation already past its tolerance"
            );
            self.record_expired(def, observation, now);
            return None;
        }

        let change = transition(self.get(&def.name).map(|e| e.current_level), level);
        let episode = self
            .episodes
            .entry(def.name.clone())
            .or_insert_with(|| Episode::new(&def.name, level, now));

        match change {
            Transition::Seeded => {
                info!(index = %def.name, level = %level, "Episode seeded");
            }
            Transition::Unchanged => {}
            Transition::Escalated { from } | Transition::Deescalated { from } => {
                info!(index = %def.name, from = %from, to = %level, "Risk level changed");
                episode.enter(level, now);
            }
        }

        episode.last_observation_at = Some(observation.observed_at);
        episode.last_value = Some(observation.value);
        episode.label = label.map(str::to_string);
        episode.stale = false;

        match notification_action(level, episode.last_notified_level) {
            NotifyAction::Fire => {
                let from = episode.previous_level.unwrap_or(RiskLevel::Unknown);
                Some(AlertEvent::new(
                    def,
                    from,
                    level,
                    observation,
                    label.map(str::to_string),
                ))
            }
            NotifyAction::ReArm => {
                if let Some(notified) = episode.last_notified_level.take() {
                    debug!(index = %def.name, notified = %notified, "Episode re-armed");
                }
                None
            }
            NotifyAction::Suppress | NotifyAction::Hold => None,
        }
    }

    /// Apply the missing-data path for an index that produced no usable
    /// observation this cycle.
    ///
    /// Holds the last level within tolerance, otherwise moves the episode to
    /// `Unknown`. Never produces an alert. Returns the effective level, or
    /// `None` when the index has never been observed.
    pub fn mark_missing(&mut self, def: &IndexDefinition, now: DateTime<Utc>) -> Option<RiskLevel> {
        let episode = self.episodes.get_mut(&def.name)?;

        let level = match episode.last_observation_at {
            Some(at) => classify_missing(def, episode.current_level, now.signed_duration_since(at)),
            None => RiskLevel::Unknown,
        };

        if level != episode.current_level {
            warn!(
                index = %def.name,
                from = %episode.current_level,
                last_observation_at = ?episode.last_observation_at,
                "Index went stale"
            );
            episode.enter(level, now);
        }
        episode.stale = level == RiskLevel::Unknown;
        if episode.stale {
            episode.label = None;
        }

        Some(level)
    }

    /// Record the dispatcher's verdict for an alert produced by [`observe`].
    ///
    /// Only a sent alert advances the notified level. A failed one leaves the
    /// episode armed so the next cycle fires again.
    ///
    /// [`observe`]: Self::observe
    pub fn record_dispatch(&mut self, event: &AlertEvent, result: &DispatchResult) {
        let Some(episode) = self.episodes.get_mut(&event.index_name) else {
            return;
        };

        match result {
            DispatchResult::Sent => {
                if episode
                    .last_notified_level
                    .map_or(true, |notified| event.to_level > notified)
                {
                    episode.last_notified_level = Some(event.to_level);
                }
                info!(index = %event.index_name, level = %event.to_level, "Alert dispatched");
            }
            DispatchResult::Failed(reason) => {
                warn!(
                    index = %event.index_name,
                    level = %event.to_level,
                    reason = %reason,
                    "Alert dispatch failed, will retry next cycle"
                );
            }
        }
    }

    fn record_expired(&mut self, def: &IndexDefinition, observation: &Observation, now: DateTime<Utc>) {
        let episode = self
            .episodes
            .entry(def.name.clone())
            .or_insert_with(|| Episode::new(&def.name, RiskLevel::Unknown, now));

        let newer = episode
            .last_observation_at
            .map_or(true, |at| observation.observed_at >= at);
        if newer {
            episode.last_observation_at = Some(observation.observed_at);
            episode.last_value = Some(observation.value);
        }

        self.mark_missing(def, now);
    }
}
