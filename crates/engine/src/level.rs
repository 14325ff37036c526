//! Risk levels.

use serde::{Deserialize, Serialize};

/// Ordered risk classification for a single index.
///
/// The derived ordering is the severity ordering:
/// `Unknown < Nominal < Watch < Warning < Severe`. `Unknown` is a pseudo-level
/// used only when an index has gone stale; the classifier never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No fresh data
    Unknown,
    /// Below every configured band
    Nominal,
    /// Elevated, worth watching
    Watch,
    /// Action likely required
    Warning,
    /// Immediate action required
    Severe,
}

impl RiskLevel {
    /// Levels that may appear in a threshold band, lowest first.
    pub const BANDS: [Self; 3] = [Self::Watch, Self::Warning, Self::Severe];

    /// Whether reaching this level warrants a notification.
    #[must_use]
    pub const fn is_alert_worthy(self) -> bool {
        matches!(self, Self::Watch | Self::Warning | Self::Severe)
    }

    /// Whether this level may be used as a threshold band.
    #[must_use]
    pub const fn is_band(self) -> bool {
        self.is_alert_worthy()
    }

    /// Get display name for this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Nominal => "Nominal",
            Self::Watch => "Watch",
            Self::Warning => "Warning",
            Self::Severe => "Severe",
        }
    }

    /// Operator prompt appended to alert messages.
    #[must_use]
    pub const fn action_prompt(self) -> &'static str {
        match self {
            Self::Unknown => "Data unavailable, check the upstream feeds.",
            Self::Nominal => "All clear for now.",
            Self::Watch => "Stand by and monitor conditions.",
            Self::Warning => "Stand by for potential ops activation.",
            Self::Severe => "Activate operations now.",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
