//! Operator-triggered test alerts.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use swx_engine::{AlertEvent, IndexRegistry, Observation, RiskLevel};

/// Build a clearly marked test alert for `index` at `level`.
///
/// The value is the level's band boundary when one is configured, so the
/// rendered message looks like a real escalation.
pub fn test_alert(
    registry: &IndexRegistry,
    index: Option<&str>,
    level: RiskLevel,
    now: DateTime<Utc>,
) -> Result<AlertEvent> {
    if !level.is_alert_worthy() {
        bail!("test alerts need an alert-worthy level (watch, warning or severe), got {level}");
    }

    let def = match index {
        Some(name) => registry.lookup(name)?,
        None => match registry.all().first() {
            Some(def) => def,
            None => bail!("no indices configured"),
        },
    };

    let band = def.thresholds.iter().find(|band| band.level == level);
    let observation = Observation {
        index_name: def.name.clone(),
        value: band.map_or(0.0, |band| band.boundary),
        observed_at: now,
        fetched_at: now,
    };

    let mut event = AlertEvent::new(
        def,
        RiskLevel::Unknown,
        level,
        &observation,
        band.and_then(|band| band.label.clone()),
    );
    event.message = format!("[TEST] {}", event.message);
    Ok(event)
}
