//! # Fokuz Core Library
//!
//! Core logic for the Fokuz interval timer. The `fokuz` CLI binary is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. Remaining time is
//!   derived from the phase start timestamp, so the caller may invoke
//!   `tick()` as rarely as it likes without drift
//! - **Timer Service**: tokio driver that owns the engine and runs a single
//!   generation-tagged ticker task
//! - **Storage**: key-value persistence (SQLite or in-memory) and
//!   TOML-based configuration
//! - **History**: append-only session log with per-day aggregates
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`]: Async ticking driver
//! - [`SessionStore`]: Session history and statistics
//! - [`MethodRegistry`]: Built-in and custom timing methods
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod history;
pub mod methods;
pub mod reminder;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    ConfigError, CoreError, SnapshotError, StorageError, TimerError, ValidationError,
};
pub use events::Event;
pub use history::{DailyStats, SessionRecord, SessionStore, Stats};
pub use methods::{builtin_methods, Method, MethodDraft, MethodRegistry};
pub use reminder::WaterReminder;
pub use storage::{Config, Database, KvStore, MemoryStore, WriteBehind};
pub use timer::{
    NotifierPort, Phase, Silent, SoundPort, TimerDisplay, TimerEngine, TimerObserver, TimerPlan,
    TimerService, TimerSnapshot,
};
