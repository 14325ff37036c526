//! Polling-cycle tests for the risk engine.
//!
//! The fetch and dispatch collaborators are scripted in-process so each test
//! controls exactly which payload every index sees in every cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use swx_engine::{
    AlertEvent, DispatchResult, Dispatcher, Engine, EngineOptions, FetchError, FieldSelector,
    IndexDefinition, IndexOutcome, IndexRegistry, RawSample, RiskLevel, SampleFetcher,
    SourceFormat, SourceSpec, Threshold, Unit,
};
use swx_engine::Direction::RisingBad;

// =============================================================================
// Test doubles
// =============================================================================

enum Script {
    Body(String),
    Fail(FetchError),
    Hang,
}

/// Fetcher that replays a queue of scripted responses per source.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<(Script, DateTime<Utc>)>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn push(&self, source: &str, script: Script, fetched_at: DateTime<Utc>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(source.to_string())
            .or_default()
            .push_back((script, fetched_at));
    }

    fn push_value(&self, source: &str, at: DateTime<Utc>, value: f64) {
        self.push(source, Script::Body(table(at, value)), at);
    }

    fn calls(&self, source: &str) -> usize {
        self.calls.lock().unwrap().get(source).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SampleFetcher for ScriptedFetcher {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_latest(&self, source: &SourceSpec) -> Result<RawSample, FetchError> {
        *self.calls.lock().unwrap().entry(source.id.clone()).or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&source.id)
            .and_then(VecDeque::pop_front);

        match next {
            Some((Script::Body(body), fetched_at)) => Ok(RawSample {
                source_id: source.id.clone(),
                format: source.format,
                body,
                fetched_at,
            }),
            Some((Script::Fail(error), _)) => Err(error),
            Some((Script::Hang, _)) => {
                tokio::time::sleep(StdDuration::from_secs(3600)).await;
                Err(FetchError::Transport("woke up".to_string()))
            }
            None => Err(FetchError::Transport("script exhausted".to_string())),
        }
    }
}

/// Dispatcher that records every event and fails while `failures` > 0.
#[derive(Default)]
struct RecordingDispatcher {
    events: Mutex<Vec<AlertEvent>>,
    failures: Mutex<usize>,
    delay: Option<StdDuration>,
}

impl RecordingDispatcher {
    fn failing(times: usize) -> Self {
        Self {
            failures: Mutex::new(times),
            ..Self::default()
        }
    }

    fn slow(delay: StdDuration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: &AlertEvent) -> DispatchResult {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.events.lock().unwrap().push(event.clone());

        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return DispatchResult::Failed("channel unavailable".to_string());
        }
        DispatchResult::Sent
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

fn cycle(n: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(n)
}

fn table(at: DateTime<Utc>, value: f64) -> String {
    format!(
        r#"[["time_tag","value"],["{}","{value}"]]"#,
        at.format("%Y-%m-%d %H:%M:%S%.3f")
    )
}

/// Solar wind speed style index: Watch 500, Warning 600, Severe 800 km/s.
fn speed(name: &str) -> IndexDefinition {
    IndexDefinition::new(
        name,
        Unit::KilometersPerSecond,
        format!("{name}-feed"),
        FieldSelector::field("value"),
        vec![
            Threshold::new(RiskLevel::Watch, 500.0, RisingBad),
            Threshold::new(RiskLevel::Warning, 600.0, RisingBad),
            Threshold::new(RiskLevel::Severe, 800.0, RisingBad).with_label("extreme"),
        ],
        Duration::minutes(10),
    )
}

fn registry(names: &[&str]) -> IndexRegistry {
    let sources = names
        .iter()
        .map(|name| SourceSpec {
            id: format!("{name}-feed"),
            format: SourceFormat::SwpcTable,
            url: format!("https://feeds.test/{name}.json"),
        })
        .collect();
    IndexRegistry::new(sources, names.iter().map(|name| speed(name)).collect()).unwrap()
}

fn engine(
    names: &[&str],
    fetcher: &Arc<ScriptedFetcher>,
    dispatcher: &Arc<RecordingDispatcher>,
) -> Engine {
    Engine::new(
        registry(names),
        fetcher.clone(),
        dispatcher.clone(),
        EngineOptions {
            fetch_timeout: StdDuration::from_secs(2),
            dispatch_timeout: StdDuration::from_secs(5),
        },
    )
}

/// Run one cycle per value and return the 1-based cycles that produced a
/// sent alert.
async fn replay(engine: &Engine, fetcher: &ScriptedFetcher, values: &[f64]) -> Vec<usize> {
    let mut fired = vec![];
    for (i, &value) in values.iter().enumerate() {
        let at = cycle(i as i64);
        fetcher.push_value("speed-feed", at, value);
        let report = engine.run_cycle_at(at).await;
        if report.sent().count() > 0 {
            fired.push(i + 1);
        }
    }
    fired
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_startup_in_severe_alerts_once() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    let fired = replay(&engine, &fetcher, &[850.0, 900.0, 870.0]).await;
    assert_eq!(fired, vec![1]);

    let events = dispatcher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_level, RiskLevel::Unknown);
    assert_eq!(events[0].to_level, RiskLevel::Severe);
    assert_eq!(events[0].label.as_deref(), Some("extreme"));
    assert!(events[0].message.contains("Activate operations now."));
}

#[tokio::test]
async fn test_flapping_does_not_realert() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    // Watch, Warning, Watch, Warning, Watch
    let fired = replay(&engine, &fetcher, &[550.0, 650.0, 550.0, 650.0, 550.0]).await;
    assert_eq!(fired, vec![1, 2]);

    let episode = engine.episode("speed").await.unwrap();
    assert_eq!(episode.current_level, RiskLevel::Watch);
    assert_eq!(episode.last_notified_level, Some(RiskLevel::Warning));
}

#[tokio::test]
async fn test_return_to_nominal_rearms() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    let fired = replay(&engine, &fetcher, &[650.0, 400.0, 650.0]).await;
    assert_eq!(fired, vec![1, 3]);

    let events = dispatcher.events();
    assert_eq!(events[1].from_level, RiskLevel::Nominal);
    assert_eq!(events[1].to_level, RiskLevel::Warning);
}

#[tokio::test]
async fn test_missing_data_holds_then_goes_unknown() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    fetcher.push_value("speed-feed", cycle(0), 650.0);
    engine.run_cycle_at(cycle(0)).await;

    // Inside the 10 minute tolerance the last level is held.
    let report = engine.run_cycle_at(cycle(5)).await;
    assert!(matches!(
        report.outcome("speed"),
        Some(IndexOutcome::Missing {
            level: Some(RiskLevel::Warning),
            ..
        })
    ));

    let report = engine.run_cycle_at(cycle(11)).await;
    assert!(matches!(
        report.outcome("speed"),
        Some(IndexOutcome::Missing {
            level: Some(RiskLevel::Unknown),
            ..
        })
    ));
    assert!(report.dispatches.is_empty());

    let status = engine.current_status().await;
    let speed = status.get("speed").unwrap();
    assert_eq!(speed.current_level, RiskLevel::Unknown);
    assert!(speed.stale);
    assert_eq!(speed.value, Some(650.0));

    // Recovery at the level already notified stays quiet.
    fetcher.push_value("speed-feed", cycle(12), 650.0);
    let report = engine.run_cycle_at(cycle(12)).await;
    assert!(report.dispatches.is_empty());
    assert!(!engine.episode("speed").await.unwrap().stale);

    assert_eq!(dispatcher.events().len(), 1);
}

#[tokio::test]
async fn test_expired_observation_is_not_alerted() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    // Measured 30 minutes before the cycle; tolerance is 10.
    fetcher.push("speed-feed", Script::Body(table(cycle(0), 900.0)), cycle(30));
    let report = engine.run_cycle_at(cycle(30)).await;

    assert!(report.dispatches.is_empty());
    assert!(matches!(
        report.outcome("speed"),
        Some(IndexOutcome::Observed {
            level: RiskLevel::Unknown,
            ..
        })
    ));
    let episode = engine.episode("speed").await.unwrap();
    assert_eq!(episode.current_level, RiskLevel::Unknown);
    assert!(episode.stale);
}

#[tokio::test]
async fn test_malformed_sample_is_isolated() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["alpha", "beta"], &fetcher, &dispatcher);

    fetcher.push(
        "alpha-feed",
        Script::Body(r#"[["time_tag","value"],["2025-05-01 12:00:00.000","NaN?"]]"#.to_string()),
        cycle(0),
    );
    fetcher.push_value("beta-feed", cycle(0), 650.0);

    let report = engine.run_cycle_at(cycle(0)).await;
    assert!(matches!(
        report.outcome("alpha"),
        Some(IndexOutcome::Missing { level: None, .. })
    ));
    assert_eq!(
        report.outcome("beta"),
        Some(&IndexOutcome::Observed {
            level: RiskLevel::Warning,
            value: 650.0,
        })
    );

    let events = dispatcher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].index_name, "beta");
    assert!(engine.episode("alpha").await.is_none());
}

#[tokio::test]
async fn test_failed_dispatch_is_retried() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::failing(1));
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    fetcher.push_value("speed-feed", cycle(0), 650.0);
    let report = engine.run_cycle_at(cycle(0)).await;
    assert_eq!(report.dispatches.len(), 1);
    assert_eq!(
        report.dispatches[0].result,
        DispatchResult::Failed("channel unavailable".to_string())
    );
    assert_eq!(engine.episode("speed").await.unwrap().last_notified_level, None);

    fetcher.push_value("speed-feed", cycle(1), 650.0);
    let report = engine.run_cycle_at(cycle(1)).await;
    assert_eq!(report.sent().count(), 1);

    fetcher.push_value("speed-feed", cycle(2), 650.0);
    let report = engine.run_cycle_at(cycle(2)).await;
    assert!(report.dispatches.is_empty());

    assert_eq!(dispatcher.events().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_is_missing_data() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["alpha", "beta"], &fetcher, &dispatcher);

    fetcher.push("alpha-feed", Script::Hang, cycle(0));
    fetcher.push_value("beta-feed", cycle(0), 400.0);

    let report = engine.run_cycle_at(cycle(0)).await;
    match report.outcome("alpha") {
        Some(IndexOutcome::Missing { level, reason }) => {
            assert_eq!(*level, None);
            assert!(reason.contains("timed out"), "unexpected reason: {reason}");
        }
        other => panic!("expected missing outcome, got {other:?}"),
    }
    assert!(matches!(
        report.outcome("beta"),
        Some(IndexOutcome::Observed {
            level: RiskLevel::Nominal,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_timeout_is_a_failure() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::slow(StdDuration::from_secs(60)));
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    fetcher.push_value("speed-feed", cycle(0), 900.0);
    let report = engine.run_cycle_at(cycle(0)).await;

    assert_eq!(
        report.dispatches[0].result,
        DispatchResult::Failed("timeout".to_string())
    );
    assert_eq!(engine.episode("speed").await.unwrap().last_notified_level, None);
}

#[tokio::test]
async fn test_status_lists_unobserved_indices() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["alpha", "beta"], &fetcher, &dispatcher);

    let before = engine.current_status_at(cycle(0)).await;
    assert_eq!(before.indices.len(), 2);
    assert_eq!(before.stale_count(), 2);
    assert_eq!(before.highest_level(), RiskLevel::Unknown);

    fetcher.push_value("alpha-feed", cycle(0), 550.0);
    fetcher.push(
        "beta-feed",
        Script::Fail(FetchError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }),
        cycle(0),
    );
    engine.run_cycle_at(cycle(0)).await;

    let status = engine.current_status_at(cycle(1)).await;
    assert_eq!(status.highest_level(), RiskLevel::Watch);
    let alpha = status.get("alpha").unwrap();
    assert_eq!(alpha.display_value.as_deref(), Some("550.0 km/s"));
    assert!(!alpha.stale);
    let beta = status.get("beta").unwrap();
    assert_eq!(beta.current_level, RiskLevel::Unknown);
    assert!(beta.stale);
    assert_eq!(beta.observed_at, None);

    // Reading status twice changes nothing.
    assert_eq!(engine.current_status_at(cycle(1)).await.indices, status.indices);
}

#[tokio::test]
async fn test_status_expires_without_a_cycle() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    fetcher.push_value("speed-feed", cycle(0), 650.0);
    engine.run_cycle_at(cycle(0)).await;

    let held = engine.current_status_at(cycle(10)).await;
    assert_eq!(held.get("speed").unwrap().current_level, RiskLevel::Warning);
    assert!(!held.get("speed").unwrap().stale);

    // The monitor stopped polling; the last Warning must not read as current.
    for status in [
        engine.current_status_at(cycle(11)).await,
        engine.current_status().await,
    ] {
        let speed = status.get("speed").unwrap();
        assert_eq!(speed.current_level, RiskLevel::Unknown);
        assert!(speed.stale);
        assert_eq!(speed.value, Some(650.0));
    }

    // The episode itself is untouched until the next cycle.
    let episode = engine.episode("speed").await.unwrap();
    assert_eq!(episode.current_level, RiskLevel::Warning);
    assert!(!episode.stale);
}

#[tokio::test]
async fn test_shared_source_is_fetched_once_per_cycle() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let backup = IndexDefinition {
        name: "speed-backup".to_string(),
        ..speed("speed")
    };
    let registry = IndexRegistry::new(
        vec![SourceSpec {
            id: "speed-feed".to_string(),
            format: SourceFormat::SwpcTable,
            url: "https://feeds.test/speed.json".to_string(),
        }],
        vec![speed("speed"), backup],
    )
    .unwrap();
    let engine = Engine::new(
        registry,
        fetcher.clone(),
        dispatcher.clone(),
        EngineOptions::default(),
    );

    // A single scripted response serves both indices.
    fetcher.push_value("speed-feed", cycle(0), 650.0);
    let report = engine.run_cycle_at(cycle(0)).await;

    assert_eq!(fetcher.calls("speed-feed"), 1);
    assert_eq!(report.missing_count(), 0);
    for name in ["speed", "speed-backup"] {
        assert_eq!(
            report.outcome(name),
            Some(&IndexOutcome::Observed {
                level: RiskLevel::Warning,
                value: 650.0,
            })
        );
    }
    assert_eq!(dispatcher.events().len(), 2);

    // A failed fetch degrades every index that reads the source.
    let report = engine.run_cycle_at(cycle(1)).await;
    assert_eq!(fetcher.calls("speed-feed"), 2);
    assert_eq!(report.missing_count(), 2);
}

#[tokio::test]
async fn test_engines_do_not_share_state() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let first_fetcher = Arc::new(ScriptedFetcher::default());
    let second_fetcher = Arc::new(ScriptedFetcher::default());
    let first = engine(&["speed"], &first_fetcher, &dispatcher);
    let second = engine(&["speed"], &second_fetcher, &dispatcher);

    assert_eq!(replay(&first, &first_fetcher, &[900.0]).await, vec![1]);
    assert_eq!(replay(&second, &second_fetcher, &[900.0]).await, vec![1]);
    assert_eq!(dispatcher.events().len(), 2);
}

#[tokio::test]
async fn test_concurrent_cycles_are_serialized() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(&["speed"], &fetcher, &dispatcher);

    fetcher.push_value("speed-feed", cycle(0), 900.0);
    fetcher.push_value("speed-feed", cycle(0), 900.0);

    let (a, b) = tokio::join!(engine.run_cycle_at(cycle(0)), engine.run_cycle_at(cycle(0)));
    assert_eq!(a.sent().count() + b.sent().count(), 1);
    assert_eq!(dispatcher.events().len(), 1);
}
