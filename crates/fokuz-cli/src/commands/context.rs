//! Shared wiring for commands: storage, config, clock and terminal ports.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use fokuz_core::storage::NotificationsConfig;
use fokuz_core::timer::format_mmss;
use fokuz_core::{
    Clock, Config, Database, KvStore, MethodRegistry, NotifierPort, Phase, SessionStore,
    SoundPort, SystemClock, TimerEngine,
};
use tracing::debug;

pub struct Context {
    pub config: Config,
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load_or_default();
        let db = Arc::new(Database::open()?);
        Ok(Self {
            config,
            db,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn engine(&self) -> TimerEngine {
        self.engine_over(self.db.clone())
    }

    /// Engine persisting into `store` instead of the database directly.
    pub fn engine_over(&self, store: Arc<dyn KvStore>) -> TimerEngine {
        let ports = Arc::new(TerminalPorts::new(&self.config.notifications));
        TimerEngine::new(store, self.clock.clone())
            .with_notifier(ports.clone())
            .with_sound(ports)
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.db.clone())
    }

    pub fn methods(&self) -> MethodRegistry {
        MethodRegistry::new(self.db.clone(), self.clock.clone())
    }
}

/// Notifications on stderr and the terminal bell as the only sound.
pub struct TerminalPorts {
    enabled: bool,
    sound: bool,
}

impl TerminalPorts {
    pub fn new(config: &NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            sound: config.sound,
        }
    }

    fn bell(&self) {
        if self.sound {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }
}

impl NotifierPort for TerminalPorts {
    fn phase_started(&self, phase: Phase, duration: Duration) {
        if self.enabled {
            eprintln!("{} started ({})", phase.label(), format_mmss(duration.as_secs()));
        }
    }

    fn schedule_phase_end(&self, phase: Phase, delay: Duration) {
        debug!(%phase, secs = delay.as_secs(), "phase end due");
    }

    fn reminder(&self, message: &str) {
        if self.enabled {
            eprintln!("{message}");
        }
    }
}

impl SoundPort for TerminalPorts {
    fn play_transition(&self) {
        self.bell();
    }

    fn play_finish(&self) {
        self.bell();
    }
}
