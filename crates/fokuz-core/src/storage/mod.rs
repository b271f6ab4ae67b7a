mod config;
pub mod database;
mod memory;
mod write_behind;

pub use config::{
    Config, HistoryConfig, NotificationsConfig, TimerConfig, WaterReminderConfig,
};
pub use database::Database;
pub use memory::MemoryStore;
pub use write_behind::WriteBehind;

use std::path::PathBuf;

use crate::error::StorageError;

/// Key holding the in-progress timer snapshot.
pub const TIMER_SNAPSHOT_KEY: &str = "fokuz.timer_snapshot";
/// Key holding the JSON array of session records, newest first.
pub const SESSIONS_KEY: &str = "fokuz.sessions";
/// Key holding the JSON map of daily aggregates keyed by date.
pub const DAILY_STATS_KEY: &str = "fokuz.daily_stats";
/// Key holding the JSON array of user-defined methods.
pub const CUSTOM_METHODS_KEY: &str = "fokuz.custom_methods";

/// Durable string key-value store.
///
/// Values are whole JSON documents; a `set` replaces the previous value
/// atomically, so readers never observe a partial write. There are no
/// transactional guarantees beyond last-write-wins.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Returns the data directory for config and database files.
///
/// `FOKUZ_DATA_DIR` wins when set. Otherwise `~/.config/fokuz[-dev]/`,
/// where the `-dev` suffix is selected by `FOKUZ_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("FOKUZ_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOKUZ_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("fokuz-dev")
            } else {
                base_dir.join("fokuz")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
