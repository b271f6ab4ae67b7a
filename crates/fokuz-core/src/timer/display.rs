//! Read-only projection of the timer for presentation.
//!
//! The projection is a pure function of a snapshot and a point in time; it
//! never touches the engine, so any number of views can poll it without
//! running their own countdown.

use serde::{Deserialize, Serialize};

use super::snapshot::{Phase, TimerSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDisplay {
    pub phase: Option<Phase>,
    pub phase_label: String,
    pub remaining_seconds: u64,
    pub formatted_time: String,
    pub is_running: bool,
    pub is_active: bool,
    pub method_name: Option<String>,
    pub completed_cycles: u32,
}

impl TimerDisplay {
    /// What to show when no session exists.
    pub fn idle() -> Self {
        Self {
            phase: None,
            phase_label: String::new(),
            remaining_seconds: 0,
            formatted_time: format_mmss(0),
            is_running: false,
            is_active: false,
            method_name: None,
            completed_cycles: 0,
        }
    }

    pub fn project(snapshot: Option<&TimerSnapshot>, now_ms: i64) -> Self {
        let Some(snap) = snapshot else {
            return Self::idle();
        };

        let remaining = snap.remaining_seconds_at(now_ms);
        let is_active = snap.phase() != Phase::Finished
            && (snap.is_running() || snap.paused_remaining_seconds().unwrap_or(0) > 0);

        Self {
            phase: Some(snap.phase()),
            phase_label: snap.phase().label().to_string(),
            remaining_seconds: remaining,
            formatted_time: format_mmss(remaining),
            is_running: snap.is_running(),
            is_active,
            method_name: Some(snap.method_name().to_string()),
            completed_cycles: snap.completed_cycles(),
        }
    }
}

/// `MM:SS`, with minutes allowed to exceed 59 (a 90 minute phase is `90:00`).
pub fn format_mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Human duration for history views: `45min`, `2h`, `1h 30min`.
pub fn format_duration_minutes(minutes: u64) -> String {
    if minutes < 60 {
        return format!("{minutes}min");
    }
    let hours = minutes / 60;
    match minutes % 60 {
        0 => format!("{hours}h"),
        rest => format!("{hours}h {rest}min"),
    }
}
