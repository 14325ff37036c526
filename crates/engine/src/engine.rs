//! Polling-cycle orchestration.
//!
//! One [`Engine`] owns the episode state for its lifetime. A cycle fetches
//! every source concurrently (each under its own timeout, once per cycle even
//! when several indices read it), normalizes and classifies each index, updates the episodes, and dispatches whatever
//! alerts came out. Cycles never overlap: a second caller waits for the
//! running cycle to commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::alert::{AlertEvent, DispatchResult, Dispatcher};
use crate::classify::classify_band;
use crate::episode::{Episode, EpisodeTracker};
use crate::error::{FetchError, IngestError};
use crate::ingest::normalize;
use crate::level::RiskLevel;
use crate::registry::IndexRegistry;
use crate::source::{RawSample, SampleFetcher};
use crate::status::StatusSnapshot;

/// Default per-source fetch budget.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for handing one alert to the dispatcher.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub fetch_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

/// Why an index produced no observation this cycle.
#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// What happened to one index during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// A fresh observation was classified.
    Observed { level: RiskLevel, value: f64 },
    /// No usable observation; the missing-data path was applied.
    /// `level` is `None` when the index has never been observed.
    Missing {
        level: Option<RiskLevel>,
        reason: String,
    },
}

/// Per-index line of a [`CycleReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub index_name: String,
    #[serde(flatten)]
    pub outcome: IndexOutcome,
}

/// An alert and what the dispatcher said about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub event: AlertEvent,
    pub result: DispatchResult,
}

/// Summary of one polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub indices: Vec<IndexReport>,
    pub dispatches: Vec<DispatchRecord>,
}

impl CycleReport {
    /// Alerts the dispatcher accepted.
    pub fn sent(&self) -> impl Iterator<Item = &AlertEvent> {
        self.dispatches
            .iter()
            .filter(|record| record.result.is_sent())
            .map(|record| &record.event)
    }

    /// Number of indices that took the missing-data path.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.indices
            .iter()
            .filter(|report| matches!(report.outcome, IndexOutcome::Missing { .. }))
            .count()
    }

    /// Outcome for one index.
    #[must_use]
    pub fn outcome(&self, index_name: &str) -> Option<&IndexOutcome> {
        self.indices
            .iter()
            .find(|report| report.index_name == index_name)
            .map(|report| &report.outcome)
    }
}

/// Risk assessment engine.
pub struct Engine {
    registry: Arc<IndexRegistry>,
    fetcher: Arc<dyn SampleFetcher>,
    dispatcher: Arc<dyn Dispatcher>,
    options: EngineOptions,
    tracker: RwLock<EpisodeTracker>,
    cycle_gate: Mutex<()>,
}

impl Engine {
    /// Create an engine with an empty episode map.
    #[must_use]
    pub fn new(
        registry: impl Into<Arc<IndexRegistry>>,
        fetcher: Arc<dyn SampleFetcher>,
        dispatcher: Arc<dyn Dispatcher>,
        options: EngineOptions,
    ) -> Self {
        let registry = registry.into();
        info!(
            indices = registry.len(),
            fetcher = fetcher.name(),
            fetch_timeout_ms = options.fetch_timeout.as_millis() as u64,
            "Risk engine initialized"
        );
        Self {
            registry,
            fetcher,
            dispatcher,
            options,
            tracker: RwLock::new(EpisodeTracker::new()),
            cycle_gate: Mutex::new(()),
        }
    }

    /// Registry this engine was built with.
    #[must_use]
    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Run one polling cycle now.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one polling cycle, treating `now` as the cycle time.
    #[instrument(skip(self), fields(indices = self.registry.len()))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        let _gate = self.cycle_gate.lock().await;

        let mut source_ids: Vec<&str> = vec![];
        for def in self.registry.all() {
            if !source_ids.contains(&def.source.as_str()) {
                source_ids.push(&def.source);
            }
        }
        let fetched: HashMap<&str, Result<RawSample, FetchError>> = join_all(
            source_ids
                .into_iter()
                .map(|id| async move { (id, self.fetch(id).await) }),
        )
        .await
        .into_iter()
        .collect();

        let mut indices = Vec::with_capacity(self.registry.len());
        let mut alerts = vec![];
        {
            let mut tracker = self.tracker.write().await;
            for def in self.registry.all() {
                let sample = match fetched.get(def.source.as_str()) {
                    Some(Ok(raw)) => Ok(raw),
                    Some(Err(error)) => Err(PipelineError::from(error.clone())),
                    None => Err(PipelineError::from(FetchError::UnknownSource(def.source.clone()))),
                };
                let outcome = match sample
                    .and_then(|raw| normalize(raw, def).map_err(PipelineError::from))
                {
                    Ok(observation) => {
                        let band = classify_band(def, observation.value);
                        let level = band.map_or(RiskLevel::Nominal, |band| band.level);
                        let label = band.and_then(|band| band.label.as_deref());
                        debug!(
                            index = %def.name,
                            value = observation.value,
                            level = %level,
                            "Classified observation"
                        );
                        if let Some(alert) = tracker.observe(def, &observation, level, label, now) {
                            alerts.push(alert);
                        }
                        // An expired observation leaves the episode on the missing path.
                        let level = tracker.get(&def.name).map_or(level, |e| e.current_level);
                        IndexOutcome::Observed {
                            level,
                            value: observation.value,
                        }
                    }
                    Err(error) => {
                        warn!(index = %def.name, error = %error, "No usable sample this cycle");
                        IndexOutcome::Missing {
                            level: tracker.mark_missing(def, now),
                            reason: error.to_string(),
                        }
                    }
                };
                indices.push(IndexReport {
                    index_name: def.name.clone(),
                    outcome,
                });
            }
        }

        let dispatches = join_all(alerts.into_iter().map(|event| self.dispatch(event))).await;
        {
            let mut tracker = self.tracker.write().await;
            for record in &dispatches {
                tracker.record_dispatch(&record.event, &record.result);
            }
        }

        let report = CycleReport {
            started_at: now,
            indices,
            dispatches,
        };
        info!(
            missing = report.missing_count(),
            alerts = report.dispatches.len(),
            sent = report.sent().count(),
            "Cycle complete"
        );
        report
    }

    /// Snapshot of every index as of now. Never mutates engine state.
    pub async fn current_status(&self) -> StatusSnapshot {
        self.current_status_at(Utc::now()).await
    }

    /// Snapshot of every index, judging staleness at `now`.
    pub async fn current_status_at(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let tracker = self.tracker.read().await;
        StatusSnapshot::capture(&self.registry, &tracker, now)
    }

    /// Copy of one index's episode, if it has been observed.
    pub async fn episode(&self, index_name: &str) -> Option<Episode> {
        self.tracker.read().await.get(index_name).cloned()
    }

    async fn fetch(&self, source_id: &str) -> Result<RawSample, FetchError> {
        let source = self
            .registry
            .source(source_id)
            .ok_or_else(|| FetchError::UnknownSource(source_id.to_string()))?;

        match tokio::time::timeout(self.options.fetch_timeout, self.fetcher.fetch_latest(source))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: self.options.fetch_timeout.as_millis() as u64,
            }),
        }
    }

    async fn dispatch(&self, event: AlertEvent) -> DispatchRecord {
        let result =
            match tokio::time::timeout(self.options.dispatch_timeout, self.dispatcher.dispatch(&event))
                .await
            {
                Ok(result) => result,
                Err(_) => DispatchResult::Failed("timeout".to_string()),
            };
        DispatchRecord { event, result }
    }
}
