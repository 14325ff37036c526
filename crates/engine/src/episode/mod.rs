//! Episode tracker: the per-index risk state machine.
//!
//! An episode is the run of cycles during which an index sits at one level.
//! The tracker decides when a transition is worth an alert and makes sure
//! each alert-worthy level is delivered at most once per episode:
//!
//! - escalation notifies once per new level (Watch, then Warning, then Severe)
//! - de-escalation and re-escalation to an already notified level stay quiet
//! - a return to `Nominal` re-arms the episode
//! - a failed dispatch leaves the episode armed for the next cycle

mod policy;
mod tracker;

pub use policy::{notification_action, transition, NotifyAction, Transition};
pub use tracker::{Episode, EpisodeTracker};
