//! Async driver around [`TimerEngine`].
//!
//! The service owns the engine behind a tokio mutex and keeps at most one
//! ticker task alive. After every command the ticker is reconciled with
//! the engine's scheduler generation: a new generation aborts the old task
//! and spawns a fresh one, no generation means no task. The ticker only
//! holds a weak reference, so dropping the service stops it.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::display::TimerDisplay;
use super::engine::TimerEngine;
use super::ports::TimerObserver;
use super::snapshot::{TimerPlan, TimerSnapshot};
use crate::error::TimerError;
use crate::events::Event;

const EVENT_CAPACITY: usize = 64;

struct Ticker {
    generation: u64,
    handle: JoinHandle<()>,
}

struct ServiceInner {
    engine: Mutex<TimerEngine>,
    ticker: StdMutex<Option<Ticker>>,
    events: broadcast::Sender<Event>,
    period: Duration,
}

impl ServiceInner {
    fn ticker_slot(&self) -> std::sync::MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Forget the ticker for `generation` if it is still the registered one.
    fn release_ticker(&self, generation: u64) {
        let mut slot = self.ticker_slot();
        if slot.as_ref().is_some_and(|t| t.generation == generation) {
            slot.take();
        }
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker_slot().take() {
            ticker.handle.abort();
        }
    }
}

/// Forwards every engine event onto the broadcast channel.
struct Broadcast(broadcast::Sender<Event>);

impl TimerObserver for Broadcast {
    fn on_event(&self, event: &Event) {
        // No receivers is fine.
        let _ = self.0.send(event.clone());
    }
}

/// Cloneable handle to a running timer.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<ServiceInner>,
}

impl TimerService {
    /// Wrap `engine`, ticking every `period` while a phase is running.
    ///
    /// Must be called from within a tokio runtime if the engine already
    /// has a running session.
    pub fn new(mut engine: TimerEngine, period: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        engine.subscribe(Arc::new(Broadcast(events.clone())));
        let generation = engine.scheduler_generation();

        let service = Self {
            inner: Arc::new(ServiceInner {
                engine: Mutex::new(engine),
                ticker: StdMutex::new(None),
                events,
                period,
            }),
        };
        service.sync_ticker(generation);
        service
    }

    /// Receive every event from now on, plus a `StateSnapshot` per tick.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub async fn restore(&self) -> Vec<Event> {
        self.command(TimerEngine::restore).await
    }

    pub async fn start(&self, plan: TimerPlan) -> Result<Event, TimerError> {
        self.command(|engine| engine.start(plan)).await
    }

    pub async fn pause(&self) -> Option<Event> {
        self.command(TimerEngine::pause).await
    }

    pub async fn resume(&self) -> Option<Event> {
        self.command(TimerEngine::resume).await
    }

    pub async fn toggle(&self) -> Option<Event> {
        self.command(TimerEngine::toggle).await
    }

    pub async fn terminate(&self) -> Option<Event> {
        self.command(TimerEngine::terminate).await
    }

    pub async fn reset(&self) -> Option<Event> {
        self.command(TimerEngine::reset).await
    }

    pub async fn restart(&self) -> Result<Event, TimerError> {
        self.command(TimerEngine::restart).await
    }

    pub async fn display(&self) -> TimerDisplay {
        self.inner.engine.lock().await.display()
    }

    pub async fn snapshot(&self) -> Option<TimerSnapshot> {
        self.inner.engine.lock().await.snapshot().cloned()
    }

    /// Read-only access to the engine.
    pub async fn read<T>(&self, f: impl FnOnce(&TimerEngine) -> T) -> T {
        f(&*self.inner.engine.lock().await)
    }

    /// Generation of the live ticker task, if one is running.
    pub fn ticker_generation(&self) -> Option<u64> {
        self.inner.ticker_slot().as_ref().map(|t| t.generation)
    }

    /// Stop the ticker without touching the session.
    pub fn shutdown(&self) {
        if let Some(ticker) = self.inner.ticker_slot().take() {
            ticker.handle.abort();
        }
    }

    async fn command<T>(&self, f: impl FnOnce(&mut TimerEngine) -> T) -> T {
        let mut engine = self.inner.engine.lock().await;
        let out = f(&mut engine);
        self.sync_ticker(engine.scheduler_generation());
        out
    }

    fn sync_ticker(&self, wanted: Option<u64>) {
        let mut slot = self.inner.ticker_slot();
        if slot.as_ref().map(|t| t.generation) == wanted {
            return;
        }
        if let Some(old) = slot.take() {
            debug!(generation = old.generation, "stopping ticker");
            old.handle.abort();
        }
        if let Some(generation) = wanted {
            debug!(generation, "starting ticker");
            let handle = spawn_ticker(Arc::downgrade(&self.inner), generation, self.inner.period);
            *slot = Some(Ticker { generation, handle });
        }
    }
}

fn spawn_ticker(inner: Weak<ServiceInner>, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else { break };

            let (events, state, live) = {
                let mut engine = inner.engine.lock().await;
                let Some(events) = engine.scheduled_tick(generation) else {
                    inner.release_ticker(generation);
                    break;
                };
                let live = engine.scheduler_generation() == Some(generation);
                (events, engine.state_event(), live)
            };

            let _ = inner.events.send(state);
            if !live {
                inner.release_ticker(generation);
                break;
            }
            if events.iter().any(|e| matches!(e, Event::PhaseChanged { .. })) {
                interval.reset();
            }
        }
    })
}
