use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerDisplay};

/// Every state change of the timer produces an Event.
/// Observers subscribe to them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_id: String,
        method_id: String,
        method_name: String,
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    /// Session reached its natural end; a completed record was written.
    TimerFinished {
        session_id: String,
        completed_cycles: u32,
        total_work_secs: u64,
        total_break_secs: u64,
        at: DateTime<Utc>,
    },
    /// Session abandoned by the user; an incomplete record was written.
    TimerTerminated {
        session_id: String,
        completed_cycles: u32,
        total_work_secs: u64,
        total_break_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        display: TimerDisplay,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::PhaseChanged {
            from: Phase::Work,
            to: Phase::Break,
            completed_cycles: 1,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["to"], "break");
    }
}
