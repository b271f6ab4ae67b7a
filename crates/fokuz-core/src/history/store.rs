//! Append-only session log with derived daily aggregates.
//!
//! The log is one JSON array under [`SESSIONS_KEY`], newest first, and is
//! rewritten as a whole on every save. Daily aggregates live under
//! [`DAILY_STATS_KEY`] as a map keyed by `YYYY-MM-DD`; the entry for a
//! record's date is recomputed from the log on save rather than
//! incremented, and the whole map is rebuilt whenever it is missing,
//! unreadable or does not account for every logged session. A save whose
//! aggregate update fails still keeps the record.
//!
//! The infallible methods (`save`, `get_all`, ...) log storage failures and
//! degrade to "nothing saved" or "no records" so callers on the timer path
//! never see an error. The `try_` variants surface the error instead.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, error, warn};

use super::record::{DailyStats, SessionRecord, Stats};
use crate::error::{CoreError, StorageError};
use crate::storage::{KvStore, DAILY_STATS_KEY, SESSIONS_KEY};

pub type DailyStatsMap = BTreeMap<String, DailyStats>;

pub struct SessionStore {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Append a record. Returns false only when the record was not logged;
    /// a failed aggregate update is logged and repaired on a later read.
    pub fn save(&self, record: SessionRecord) -> bool {
        let id = record.id.clone();
        match self.try_save(record) {
            Ok(()) => true,
            Err(e) => {
                error!(session_id = %id, "dropping session record: {e}");
                false
            }
        }
    }

    pub fn try_save(&self, record: SessionRecord) -> Result<(), CoreError> {
        record.validate()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::QueryFailed("session store lock poisoned".into()))?;

        let mut log = self.read_log()?;
        let date = record.date;
        log.retain(|r| r.id != record.id);
        log.insert(0, record);
        sort_newest_first(&mut log);
        self.store.set(SESSIONS_KEY, &serde_json::to_string(&log)?)?;

        // The record is durable from here on; aggregates are derived data.
        if let Err(e) = self.update_stats(date, &log) {
            warn!(%date, "session recorded, daily stats deferred: {e}");
            if let Err(e) = self.store.remove(DAILY_STATS_KEY) {
                warn!("failed to drop stale daily stats: {e}");
            }
            return Ok(());
        }

        debug!(%date, sessions = log.len(), "session recorded");
        Ok(())
    }

    fn update_stats(&self, date: NaiveDate, log: &[SessionRecord]) -> Result<(), CoreError> {
        let mut stats = match self.read_stats() {
            Ok(Some(stats)) if covers(&stats, log) => stats,
            Ok(_) => build_stats(log),
            Err(e) => {
                warn!("daily stats unreadable, rebuilding: {e}");
                build_stats(log)
            }
        };
        stats.insert(date.to_string(), DailyStats::from_records(date, log));
        self.store.set(DAILY_STATS_KEY, &serde_json::to_string(&stats)?)?;
        Ok(())
    }

    /// Erase the session log and the aggregates.
    pub fn clear_all(&self) -> bool {
        match self.try_clear_all() {
            Ok(()) => true,
            Err(e) => {
                error!("failed to clear history: {e}");
                false
            }
        }
    }

    pub fn try_clear_all(&self) -> Result<(), CoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::QueryFailed("session store lock poisoned".into()))?;
        self.store.remove(SESSIONS_KEY)?;
        self.store.remove(DAILY_STATS_KEY)?;
        Ok(())
    }

    /// Recompute every daily aggregate from the log and store the result.
    pub fn rebuild_daily_stats(&self) -> Result<DailyStatsMap, CoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::QueryFailed("session store lock poisoned".into()))?;
        let stats = build_stats(&self.read_log()?);
        self.store.set(DAILY_STATS_KEY, &serde_json::to_string(&stats)?)?;
        Ok(stats)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All records, newest first.
    pub fn get_all(&self) -> Vec<SessionRecord> {
        self.try_get_all().unwrap_or_else(|e| {
            error!("failed to read session log: {e}");
            Vec::new()
        })
    }

    pub fn try_get_all(&self) -> Result<Vec<SessionRecord>, CoreError> {
        let mut log = self.read_log()?;
        sort_newest_first(&mut log);
        Ok(log)
    }

    pub fn get_by_date(&self, date: NaiveDate) -> Vec<SessionRecord> {
        self.get_all()
            .into_iter()
            .filter(|r| r.date == date)
            .collect()
    }

    /// Records started within the last `days` days of `now`, inclusive.
    pub fn get_recent(&self, days: u32, now: DateTime<Utc>) -> Vec<SessionRecord> {
        let cutoff = now - Duration::seconds(i64::from(days) * 86_400);
        self.get_all()
            .into_iter()
            .filter(|r| r.start_time >= cutoff)
            .collect()
    }

    /// Daily aggregates keyed by date; recomputed from the log when the
    /// stored map is missing, unreadable or out of step with the log.
    pub fn daily_stats(&self) -> DailyStatsMap {
        let log = self.get_all();
        match self.read_stats() {
            Ok(Some(stats)) if covers(&stats, &log) => stats,
            Ok(Some(_)) => {
                debug!("daily stats behind the session log, recomputing");
                build_stats(&log)
            }
            Ok(None) => build_stats(&log),
            Err(e) => {
                warn!("daily stats unreadable, recomputing: {e}");
                build_stats(&log)
            }
        }
    }

    /// Aggregates for every date in `start..=end` that has sessions.
    pub fn stats_for_period(&self, start: NaiveDate, end: NaiveDate) -> Vec<DailyStats> {
        self.daily_stats()
            .into_values()
            .filter(|s| s.date >= start && s.date <= end)
            .collect()
    }

    pub fn summary(&self, today: NaiveDate) -> Stats {
        Stats::from_records(&self.get_all(), today)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn read_log(&self) -> Result<Vec<SessionRecord>, CoreError> {
        match self.store.get(SESSIONS_KEY)? {
            None => Ok(Vec::new()),
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                StorageError::Corrupted {
                    key: SESSIONS_KEY.into(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }

    fn read_stats(&self) -> Result<Option<DailyStatsMap>, CoreError> {
        match self.store.get(DAILY_STATS_KEY)? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                StorageError::Corrupted {
                    key: DAILY_STATS_KEY.into(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }
}

fn sort_newest_first(log: &mut [SessionRecord]) {
    log.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

/// Whether `stats` accounts for every record in `log`.
fn covers(stats: &DailyStatsMap, log: &[SessionRecord]) -> bool {
    stats.values().map(|s| s.total_sessions).sum::<u64>() == log.len() as u64
}

fn build_stats(log: &[SessionRecord]) -> DailyStatsMap {
    let mut dates: Vec<NaiveDate> = log.iter().map(|r| r.date).collect();
    dates.sort_unstable();
    dates.dedup();
    dates
        .into_iter()
        .map(|date| (date.to_string(), DailyStats::from_records(date, log)))
        .collect()
}
