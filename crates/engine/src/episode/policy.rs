//! Episode transition and notification tables.
//!
//! Both tables are pure functions over levels so the hysteresis properties
//! can be checked without a tracker.

use crate::level::RiskLevel;

/// How the current level relates to the episode's previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First classification of the index.
    Seeded,
    /// Same level as the previous cycle.
    Unchanged,
    /// Moved to a more severe level.
    Escalated { from: RiskLevel },
    /// Moved to a less severe level.
    Deescalated { from: RiskLevel },
}

/// Transition table.
#[must_use]
pub fn transition(current: Option<RiskLevel>, new: RiskLevel) -> Transition {
    match current {
        None => Transition::Seeded,
        Some(from) if from == new => Transition::Unchanged,
        Some(from) if from < new => Transition::Escalated { from },
        Some(from) => Transition::Deescalated { from },
    }
}

/// What to do with an episode's notification state after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    /// Send an alert for the new level.
    Fire,
    /// Already notified at this level or above in this episode.
    Suppress,
    /// Back to baseline: clear the notified level.
    ReArm,
    /// Not alert-worthy and not a baseline: leave the notified level alone.
    Hold,
}

/// Notification table over `(new level, highest level notified since re-arm)`.
///
/// | new level        | last notified        | action   |
/// |------------------|----------------------|----------|
/// | `Unknown`        | any                  | Hold     |
/// | `Nominal`        | any                  | ReArm    |
/// | Watch..Severe    | none                 | Fire     |
/// | Watch..Severe    | lower than new       | Fire     |
/// | Watch..Severe    | equal or higher      | Suppress |
#[must_use]
pub fn notification_action(new: RiskLevel, last_notified: Option<RiskLevel>) -> NotifyAction {
    match (new, last_notified) {
        (RiskLevel::Unknown, _) => NotifyAction::Hold,
        (RiskLevel::Nominal, _) => NotifyAction::ReArm,
        (_, None) => NotifyAction::Fire,
        (level, Some(notified)) if level > notified => NotifyAction::Fire,
        (_, Some(_)) => NotifyAction::Suppress,
    }
}
