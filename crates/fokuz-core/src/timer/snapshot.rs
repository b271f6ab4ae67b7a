//! Persisted state of the single in-progress timer.
//!
//! Remaining time is never stored while running; it is recomputed from
//! `phase_start_epoch_ms` so that a snapshot restored after the process was
//! suspended still reports the correct value.

use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, ValidationError};
use crate::methods::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Break,
    Finished,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::Break => "Break",
            Phase::Finished => "Finished",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Work => "work",
            Phase::Break => "break",
            Phase::Finished => "finished",
        })
    }
}

/// What to time: durations in whole seconds plus the method identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPlan {
    work_seconds: u64,
    break_seconds: Option<u64>,
    method_name: String,
    method_id: String,
}

impl TimerPlan {
    /// A zero break is treated as no break.
    pub fn new(
        work_seconds: u64,
        break_seconds: Option<u64>,
        method_name: impl Into<String>,
        method_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if work_seconds == 0 {
            return Err(ValidationError::InvalidValue {
                field: "work_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(Self {
            work_seconds,
            break_seconds: break_seconds.filter(|&s| s > 0),
            method_name: method_name.into(),
            method_id: method_id.into(),
        })
    }

    /// The one place where method minutes become engine seconds.
    pub fn from_method(method: &Method) -> Result<Self, ValidationError> {
        Self::new(
            u64::from(method.work_duration_minutes) * 60,
            method.break_duration_minutes.map(|m| u64::from(m) * 60),
            method.name.clone(),
            method.id.clone(),
        )
    }

    pub fn work_seconds(&self) -> u64 {
        self.work_seconds
    }

    pub fn break_seconds(&self) -> Option<u64> {
        self.break_seconds
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method_id(&self) -> &str {
        &self.method_id
    }
}

/// The in-progress timer. Only `TimerEngine` mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub(super) phase: Phase,
    pub(super) is_running: bool,
    pub(super) work_duration_seconds: u64,
    /// Zero when the method has no break.
    pub(super) break_duration_seconds: u64,
    pub(super) method_name: String,
    pub(super) method_id: String,
    pub(super) phase_start_epoch_ms: i64,
    #[serde(default)]
    pub(super) paused_remaining_seconds: Option<u64>,
    #[serde(default)]
    pub(super) accumulated_work_seconds: u64,
    #[serde(default)]
    pub(super) accumulated_break_seconds: u64,
    /// Seconds of the current phase already added to an accumulator.
    #[serde(default)]
    pub(super) phase_credited_seconds: u64,
    #[serde(default)]
    pub(super) completed_cycles: u32,
    pub(super) session_id: String,
    pub(super) session_start_epoch_ms: i64,
}

impl TimerSnapshot {
    pub(super) fn begin(plan: &TimerPlan, session_id: String, now_ms: i64) -> Self {
        Self {
            phase: Phase::Work,
            is_running: true,
            work_duration_seconds: plan.work_seconds,
            break_duration_seconds: plan.break_seconds.unwrap_or(0),
            method_name: plan.method_name.clone(),
            method_id: plan.method_id.clone(),
            phase_start_epoch_ms: now_ms,
            paused_remaining_seconds: None,
            accumulated_work_seconds: 0,
            accumulated_break_seconds: 0,
            phase_credited_seconds: 0,
            completed_cycles: 0,
            session_id,
            session_start_epoch_ms: now_ms,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn work_duration_seconds(&self) -> u64 {
        self.work_duration_seconds
    }

    pub fn break_duration_seconds(&self) -> Option<u64> {
        (self.break_duration_seconds > 0).then_some(self.break_duration_seconds)
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method_id(&self) -> &str {
        &self.method_id
    }

    pub fn phase_start_epoch_ms(&self) -> i64 {
        self.phase_start_epoch_ms
    }

    pub fn paused_remaining_seconds(&self) -> Option<u64> {
        self.paused_remaining_seconds
    }

    pub fn accumulated_work_seconds(&self) -> u64 {
        self.accumulated_work_seconds
    }

    pub fn accumulated_break_seconds(&self) -> u64 {
        self.accumulated_break_seconds
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_start_epoch_ms(&self) -> i64 {
        self.session_start_epoch_ms
    }

    /// Rebuild the plan this session was started with.
    pub fn plan(&self) -> TimerPlan {
        TimerPlan {
            work_seconds: self.work_duration_seconds,
            break_seconds: self.break_duration_seconds(),
            method_name: self.method_name.clone(),
            method_id: self.method_id.clone(),
        }
    }

    /// Configured length of the current phase.
    pub fn phase_duration_seconds(&self) -> u64 {
        match self.phase {
            Phase::Work => self.work_duration_seconds,
            Phase::Break => self.break_duration_seconds,
            Phase::Finished => 0,
        }
    }

    pub(super) fn phase_duration_ms(&self) -> i64 {
        i64::try_from(self.phase_duration_seconds().saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Milliseconds the current phase has been running, never negative.
    pub(super) fn running_elapsed_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.phase_start_epoch_ms).max(0)
    }

    /// Whole seconds left in the current phase, floor-rounded and clamped
    /// to `0..=phase_duration_seconds()`.
    pub fn remaining_seconds_at(&self, now_ms: i64) -> u64 {
        let duration = self.phase_duration_seconds();
        if self.phase == Phase::Finished {
            return 0;
        }
        if !self.is_running {
            return self.paused_remaining_seconds.unwrap_or(0).min(duration);
        }
        let remaining_ms = self
            .phase_duration_ms()
            .saturating_sub(self.running_elapsed_ms(now_ms))
            .max(0);
        (remaining_ms / 1000) as u64
    }

    /// Seconds of the current phase consumed so far.
    pub fn consumed_seconds_at(&self, now_ms: i64) -> u64 {
        self.phase_duration_seconds() - self.remaining_seconds_at(now_ms)
    }

    /// Check the invariants a restored snapshot must satisfy.
    pub fn validate(&self, now_ms: i64) -> Result<(), SnapshotError> {
        if self.work_duration_seconds == 0 {
            return Err(SnapshotError::ZeroWorkDuration);
        }
        if self.phase == Phase::Finished {
            return Err(SnapshotError::Finished);
        }
        if self.phase == Phase::Break && self.break_duration_seconds == 0 {
            return Err(SnapshotError::BreakWithoutDuration);
        }
        if self.phase_credited_seconds > self.phase_duration_seconds() {
            return Err(SnapshotError::CreditExceedsDuration {
                phase: self.phase,
                credited: self.phase_credited_seconds,
                duration: self.phase_duration_seconds(),
            });
        }
        if self.is_running {
            if self.paused_remaining_seconds.is_some() {
                return Err(SnapshotError::RunningWithPausedRemaining);
            }
            if self.phase_start_epoch_ms > now_ms {
                return Err(SnapshotError::PhaseStartInFuture {
                    phase_start: self.phase_start_epoch_ms,
                    now: now_ms,
                });
            }
        } else {
            let remaining = self
                .paused_remaining_seconds
                .ok_or(SnapshotError::PausedWithoutRemaining)?;
            let duration = self.phase_duration_seconds();
            if remaining > duration {
                return Err(SnapshotError::RemainingExceedsDuration {
                    phase: self.phase,
                    remaining,
                    duration,
                });
            }
        }
        Ok(())
    }
}
