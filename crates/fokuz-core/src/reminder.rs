//! Hydration reminders at randomized intervals.
//!
//! The reminder is polled rather than self-scheduling: callers pass the
//! current time and get told whether a reminder is due.

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use tracing::debug;

use crate::storage::WaterReminderConfig;

pub const REMINDER_MESSAGE: &str = "Time to drink some water";

pub struct WaterReminder {
    min_minutes: u32,
    max_minutes: u32,
    rng: Mcg128Xsl64,
    next_due_ms: Option<i64>,
}

impl WaterReminder {
    /// Bounds are inclusive minutes; they are swapped if reversed and a
    /// zero minimum is raised to one.
    pub fn new(min_minutes: u32, max_minutes: u32) -> Self {
        Self::with_rng(min_minutes, max_minutes, Mcg128Xsl64::from_entropy())
    }

    /// Deterministic reminder for reproducible runs.
    pub fn seeded(min_minutes: u32, max_minutes: u32, seed: u64) -> Self {
        Self::with_rng(min_minutes, max_minutes, Mcg128Xsl64::seed_from_u64(seed))
    }

    pub fn from_config(config: &WaterReminderConfig) -> Self {
        Self::new(config.min_minutes, config.max_minutes)
    }

    fn with_rng(min_minutes: u32, max_minutes: u32, rng: Mcg128Xsl64) -> Self {
        let lo = min_minutes.min(max_minutes).max(1);
        let hi = max_minutes.max(min_minutes).max(lo);
        Self {
            min_minutes: lo,
            max_minutes: hi,
            rng,
            next_due_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due_ms.is_some()
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.next_due_ms
    }

    /// Arm the reminder. No-op if already active.
    pub fn start(&mut self, now_ms: i64) {
        if self.next_due_ms.is_none() {
            self.schedule(now_ms);
        }
    }

    pub fn stop(&mut self) {
        self.next_due_ms = None;
    }

    /// True when a reminder is due; the next one is then scheduled from
    /// `now_ms`.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        match self.next_due_ms {
            Some(due) if now_ms >= due => {
                self.schedule(now_ms);
                true
            }
            _ => false,
        }
    }

    fn schedule(&mut self, now_ms: i64) {
        let minutes = self.rng.gen_range(self.min_minutes..=self.max_minutes);
        let due = now_ms + i64::from(minutes) * 60_000;
        debug!(minutes, "next water reminder scheduled");
        self.next_due_ms = Some(due);
    }
}
