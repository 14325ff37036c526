//! Read-only status snapshot for dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::classify_missing;
use crate::episode::EpisodeTracker;
use crate::level::RiskLevel;
use crate::registry::IndexRegistry;

/// Current state of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub index_name: String,
    pub unit: String,
    pub current_level: RiskLevel,
    pub value: Option<f64>,
    /// Value rendered with the index's display format.
    pub display_value: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub entered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub stale: bool,
    /// Tolerance of the index, so readers can re-check staleness later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_secs: Option<i64>,
}

impl IndexStatus {
    /// Re-evaluate staleness at `now`.
    ///
    /// A level whose observation has outlived the tolerance is reported as
    /// `Unknown` and stale. Never makes a stale entry fresh again.
    fn expire_at(&mut self, now: DateTime<Utc>) {
        let (Some(at), Some(secs)) = (self.observed_at, self.stale_after_secs) else {
            return;
        };
        if now.signed_duration_since(at).num_seconds() > secs {
            self.current_level = RiskLevel::Unknown;
            self.label = None;
            self.stale = true;
        }
    }
}

/// Status of every registered index at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub generated_at: DateTime<Utc>,
    pub indices: Vec<IndexStatus>,
}

impl StatusSnapshot {
    /// Build a snapshot in registry order.
    ///
    /// Indices that were never observed appear as `Unknown` and stale rather
    /// than being left out. Staleness is judged at `generated_at`, so an
    /// index whose last observation has outlived its tolerance shows as
    /// `Unknown` even if no cycle has run since.
    #[must_use]
    pub fn capture(
        registry: &IndexRegistry,
        tracker: &EpisodeTracker,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let indices = registry
            .all()
            .iter()
            .map(|def| match tracker.get(&def.name) {
                Some(episode) => {
                    let current_level = match episode.last_observation_at {
                        Some(at) => classify_missing(
                            def,
                            episode.current_level,
                            generated_at.signed_duration_since(at),
                        ),
                        None => RiskLevel::Unknown,
                    };
                    let expired = current_level == RiskLevel::Unknown;
                    IndexStatus {
                        index_name: def.name.clone(),
                        unit: def.unit.symbol().to_string(),
                        current_level,
                        value: episode.last_value,
                        display_value: episode.last_value.map(|value| def.render_value(value)),
                        observed_at: episode.last_observation_at,
                        entered_at: Some(episode.entered_at),
                        label: if expired { None } else { episode.label.clone() },
                        stale: episode.stale || expired,
                        stale_after_secs: Some(def.stale_after.num_seconds()),
                    }
                }
                None => IndexStatus {
                    index_name: def.name.clone(),
                    unit: def.unit.symbol().to_string(),
                    current_level: RiskLevel::Unknown,
                    value: None,
                    display_value: None,
                    observed_at: None,
                    entered_at: None,
                    label: None,
                    stale: true,
                    stale_after_secs: Some(def.stale_after.num_seconds()),
                },
            })
            .collect();

        Self {
            generated_at,
            indices,
        }
    }

    /// The same snapshot as it reads at `now`.
    ///
    /// Used for snapshots loaded from disk: a file left behind by a monitor
    /// that stopped polling must not present its last levels as current.
    #[must_use]
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        for status in &mut self.indices {
            status.expire_at(now);
        }
        self
    }

    /// Most severe level across all indices; `Unknown` when nothing is known.
    #[must_use]
    pub fn highest_level(&self) -> RiskLevel {
        self.indices
            .iter()
            .map(|status| status.current_level)
            .max()
            .unwrap_or(RiskLevel::Unknown)
    }

    /// Status of one index.
    #[must_use]
    pub fn get(&self, index_name: &str) -> Option<&IndexStatus> {
        self.indices
            .iter()
            .find(|status| status.index_name == index_name)
    }

    /// Number of indices currently stale.
    #[must_use]
    pub fn stale_count(&self) -> usize {
        self.indices.iter().filter(|status| status.stale).count()
    }
}
