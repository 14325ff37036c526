//! Risk classifier.
//!
//! Pure functions mapping a value (or the absence of one) to a [`RiskLevel`].

use chrono::Duration;

use crate::level::RiskLevel;
use crate::registry::{IndexDefinition, Threshold};

/// Return the most severe band breached by `value`, if any.
///
/// Bands are ordered least severe first and validated to be monotonic, so the
/// last breached band is the most severe one.
#[must_use]
pub fn classify_band(def: &IndexDefinition, value: f64) -> Option<&Threshold> {
    def.thresholds
        .iter()
        .rev()
        .find(|band| band.is_breached_by(value))
}

/// Classify a fresh value. Values outside every band are `Nominal`.
#[must_use]
pub fn classify(def: &IndexDefinition, value: f64) -> RiskLevel {
    classify_band(def, value).map_or(RiskLevel::Nominal, |band| band.level)
}

/// Classify an index that produced no fresh observation this cycle.
///
/// The last known level is held while `staleness` stays within the index's
/// tolerance, so a momentary feed gap does not drop the index to `Nominal`.
/// Past the tolerance the index becomes `Unknown`.
#[must_use]
pub fn classify_missing(
    def: &IndexDefinition,
    last_known_level: RiskLevel,
    staleness: Duration,
) -> RiskLevel {
    if staleness <= def.stale_after {
        last_known_level
    } else {
        RiskLevel::Unknown
    }
}
