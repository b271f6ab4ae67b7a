//! Timer state machine and its drivers.

mod display;
mod engine;
mod ports;
mod service;
mod snapshot;

pub use display::{format_duration_minutes, format_mmss, TimerDisplay};
pub use engine::TimerEngine;
pub use ports::{NotifierPort, ObserverId, Silent, SoundPort, TimerObserver};
pub use service::TimerService;
pub use snapshot::{Phase, TimerPlan, TimerSnapshot};
