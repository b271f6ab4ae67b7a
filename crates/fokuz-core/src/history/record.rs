use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::to_datetime;
use crate::error::ValidationError;
use crate::timer::TimerSnapshot;

/// One finished or abandoned session. Never mutated after creation.
///
/// All durations are whole seconds; minute values are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub method_name: String,
    pub method_id: String,
    pub work_duration_seconds: u64,
    pub break_duration_seconds: Option<u64>,
    pub completed_cycles: u32,
    pub total_work_seconds: u64,
    pub total_break_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// UTC calendar date of `start_time`, used for grouping.
    pub date: NaiveDate,
    pub is_completed: bool,
}

impl SessionRecord {
    /// Freeze a snapshot into a record. Accumulators must already include
    /// any time consumed in the current phase.
    pub fn from_snapshot(snapshot: &TimerSnapshot, end_ms: i64, is_completed: bool) -> Self {
        let start_time = to_datetime(snapshot.session_start_epoch_ms());
        let end_time = to_datetime(end_ms.max(snapshot.session_start_epoch_ms()));
        Self {
            id: snapshot.session_id().to_string(),
            method_name: snapshot.method_name().to_string(),
            method_id: snapshot.method_id().to_string(),
            work_duration_seconds: snapshot.work_duration_seconds(),
            break_duration_seconds: snapshot.break_duration_seconds(),
            completed_cycles: snapshot.completed_cycles(),
            total_work_seconds: snapshot.accumulated_work_seconds(),
            total_break_seconds: snapshot.accumulated_break_seconds(),
            start_time,
            end_time,
            date: start_time.date_naive(),
            is_completed,
        }
    }

    pub fn work_duration_minutes(&self) -> u64 {
        self.work_duration_seconds / 60
    }

    pub fn break_duration_minutes(&self) -> Option<u64> {
        self.break_duration_seconds.map(|s| s / 60)
    }

    pub fn total_work_minutes(&self) -> u64 {
        self.total_work_seconds / 60
    }

    pub fn total_break_minutes(&self) -> u64 {
        self.total_break_seconds / 60
    }

    /// Boundary check applied before a record enters the log.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end_time < self.start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.id.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.date != self.start_time.date_naive() {
            return Err(ValidationError::InvalidValue {
                field: "date".into(),
                message: format!("{} does not match start_time {}", self.date, self.start_time),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStats {
    pub count: u64,
    pub work_seconds: u64,
}

/// Per-date aggregate, always rebuildable from the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub total_work_seconds: u64,
    pub total_break_seconds: u64,
    pub methods: BTreeMap<String, MethodStats>,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_sessions: 0,
            completed_sessions: 0,
            total_work_seconds: 0,
            total_break_seconds: 0,
            methods: BTreeMap::new(),
        }
    }

    /// Aggregate the records dated `date`; others are ignored.
    pub fn from_records<'a>(
        date: NaiveDate,
        records: impl IntoIterator<Item = &'a SessionRecord>,
    ) -> Self {
        let mut stats = Self::empty(date);
        for record in records.into_iter().filter(|r| r.date == date) {
            stats.total_sessions += 1;
            stats.total_work_seconds += record.total_work_seconds;
            stats.total_break_seconds += record.total_break_seconds;
            if record.is_completed {
                stats.completed_sessions += 1;
            }
            let method = stats.methods.entry(record.method_name.clone()).or_default();
            method.count += 1;
            method.work_seconds += record.total_work_seconds;
        }
        stats
    }
}

/// All-time and today totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub completed_cycles: u64,
    pub total_work_seconds: u64,
    pub total_break_seconds: u64,
    pub today_sessions: u64,
    pub today_work_seconds: u64,
}

impl Stats {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a SessionRecord>,
        today: NaiveDate,
    ) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_sessions += 1;
            stats.completed_cycles += u64::from(record.completed_cycles);
            stats.total_work_seconds += record.total_work_seconds;
            stats.total_break_seconds += record.total_break_seconds;
            if record.is_completed {
                stats.completed_sessions += 1;
            }
            if record.date == today {
                stats.today_sessions += 1;
                stats.today_work_seconds += record.total_work_seconds;
            }
        }
        stats
    }
}
