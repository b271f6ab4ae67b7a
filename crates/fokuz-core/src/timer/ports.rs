//! Collaborator interfaces invoked by the engine on transitions.
//!
//! Presentation concerns (notifications, sounds, haptics, UI refresh) live
//! behind these traits so the engine can be driven with fakes in tests.

use std::time::Duration;

use super::snapshot::Phase;
use crate::events::Event;

/// Push-notification side effects.
pub trait NotifierPort: Send + Sync {
    /// A phase began running.
    fn phase_started(&self, _phase: Phase, _duration: Duration) {}

    /// Arrange for a "phase over" notification after `delay`.
    fn schedule_phase_end(&self, _phase: Phase, _delay: Duration) {}

    /// Drop any pending "phase over" notification.
    fn cancel_pending(&self) {}

    /// Free-form reminder, e.g. hydration.
    fn reminder(&self, _message: &str) {}
}

/// Audible cues.
pub trait SoundPort: Send + Sync {
    fn play_transition(&self) {}
    fn play_finish(&self) {}
}

/// Subscriber to engine transitions. Callbacks fire synchronously, after
/// the snapshot has been updated.
pub trait TimerObserver: Send + Sync {
    fn on_event(&self, _event: &Event) {}
    fn on_phase_change(&self, _phase: Phase) {}
    fn on_finish(&self) {}
}

/// Port implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl NotifierPort for Silent {}
impl SoundPort for Silent {}
impl TimerObserver for Silent {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub(super) u64);
