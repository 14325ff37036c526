//! Presentation helpers shared by the channels.

use serde::{Deserialize, Serialize};
use swx_engine::{AlertEvent, RiskLevel};

/// Severity levels for alerts and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get the attachment color for this severity.
    #[must_use]
    pub const fn color(&self) -> u32 {
        match self {
            Self::Info => 0x0034_98db,     // Blue
            Self::Warning => 0x00f3_9c12,  // Orange
            Self::Critical => 0x00e7_4c3c, // Red
        }
    }

    /// Color as a `#rrggbb` string.
    #[must_use]
    pub fn hex_color(&self) -> String {
        format!("#{:06x}", self.color())
    }

    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }

    /// Marker used in chat messages.
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::Info => "🟡",
            Self::Warning => "🟠",
            Self::Critical => "🔴",
        }
    }
}

impl From<RiskLevel> for Severity {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Unknown | RiskLevel::Nominal | RiskLevel::Watch => Self::Info,
            RiskLevel::Warning => Self::Warning,
            RiskLevel::Severe => Self::Critical,
        }
    }
}

/// Severity of an alert.
#[must_use]
pub fn severity(event: &AlertEvent) -> Severity {
    Severity::from(event.to_level)
}

/// Name/value pairs describing an alert, in display order.
#[must_use]
pub fn alert_fields(event: &AlertEvent) -> Vec<(String, String)> {
    let mut fields = vec![
        ("Index".to_string(), event.index_name.clone()),
        ("Level".to_string(), event.to_level.to_string()),
    ];
    if event.from_level != RiskLevel::Unknown {
        fields.push(("Previous".to_string(), event.from_level.to_string()));
    }
    if let Some(label) = &event.label {
        fields.push(("Band".to_string(), label.clone()));
    }
    fields.push((
        "Observed".to_string(),
        event.observed_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    ));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_event() -> AlertEvent {
        AlertEvent {
            index_name: "Bz".to_string(),
            from_level: RiskLevel::Watch,
            to_level: RiskLevel::Warning,
            value: -12.3,
            observed_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 34, 0).unwrap(),
            label: Some("G3".to_string()),
            message: "Bz reached Warning (G3) at -12.3 nT, was Watch.".to_string(),
        }
    }

    #[test]
    fn test_severity_from_level() {
        assert_eq!(Severity::from(RiskLevel::Watch), Severity::Info);
        assert_eq!(Severity::from(RiskLevel::Warning), Severity::Warning);
        assert_eq!(Severity::from(RiskLevel::Severe), Severity::Critical);
    }

    #[test]
    fn test_severity_colors() {
        assert_eq!(Severity::Info.color(), 0x0034_98db);
        assert_eq!(Severity::Warning.hex_color(), "#f39c12");
        assert_eq!(Severity::Critical.hex_color(), "#e74c3c");
    }

    #[test]
    fn test_alert_fields() {
        let fields = alert_fields(&sample_event());
        let names: Vec<_> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["Index", "Level", "Previous", "Band", "Observed"]);
        assert_eq!(fields[4].1, "2025-05-01 12:34 UTC");
    }

    #[test]
    fn test_baseline_alert_has_no_previous() {
        let mut event = sample_event();
        event.from_level = RiskLevel::Unknown;
        event.label = None;
        let fields = alert_fields(&event);
        assert!(fields.iter().all(|(name, _)| name != "Previous" && name != "Band"));
    }
}
