//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (or [`TimerService`](super::TimerService))
//! is responsible for calling `tick()` periodically. Remaining time is
//! always derived from the phase start timestamp, so a tick that arrives
//! late (for example after the process was suspended) simply observes more
//! elapsed time and catches up in one step.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Work(running|paused) -> Break(running|paused) -> Finished -> Idle
//!                              \------------------------/
//!                                (no break configured)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store, Arc::new(SystemClock));
//! engine.restore();
//! engine.start(plan)?;
//! // In a loop:
//! engine.tick(); // Returns the transitions that happened, if any
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::display::TimerDisplay;
use super::ports::{NotifierPort, ObserverId, Silent, SoundPort, TimerObserver};
use super::snapshot::{Phase, TimerPlan, TimerSnapshot};
use crate::clock::{to_datetime, Clock};
use crate::error::TimerError;
use crate::events::Event;
use crate::history::{SessionRecord, SessionStore};
use crate::storage::{KvStore, TIMER_SNAPSHOT_KEY};

/// What a single reconciliation step did.
enum Step {
    EnteredBreak,
    Finished(SessionRecord),
}

/// Core timer engine. Sole writer of the [`TimerSnapshot`].
pub struct TimerEngine {
    store: Arc<dyn KvStore>,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotifierPort>,
    sound: Arc<dyn SoundPort>,
    observers: Vec<(ObserverId, Arc<dyn TimerObserver>)>,
    next_observer_id: u64,
    snapshot: Option<TimerSnapshot>,
    /// Last generation handed out to a running segment.
    generation: u64,
    /// Generation of the one tick scheduler that may drive the engine.
    scheduler: Option<u64>,
}

impl TimerEngine {
    /// Create an idle engine persisting into `store`.
    ///
    /// Call [`restore`](Self::restore) to pick up a session left behind by
    /// a previous process.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: SessionStore::new(store.clone()),
            store,
            clock,
            notifier: Arc::new(Silent),
            sound: Arc::new(Silent),
            observers: Vec::new(),
            next_observer_id: 0,
            snapshot: None,
            generation: 0,
            scheduler: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotifierPort>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_sound(mut self, sound: Arc<dyn SoundPort>) -> Self {
        self.sound = sound;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Option<&TimerSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.snapshot.as_ref().map(|s| s.phase())
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_running())
    }

    pub fn is_idle(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn remaining_seconds(&self) -> u64 {
        let now = self.clock.now_ms();
        self.snapshot
            .as_ref()
            .map(|s| s.remaining_seconds_at(now))
            .unwrap_or(0)
    }

    pub fn display(&self) -> TimerDisplay {
        TimerDisplay::project(self.snapshot.as_ref(), self.clock.now_ms())
    }

    /// Build a full state snapshot event.
    pub fn state_event(&self) -> Event {
        let now = self.clock.now_ms();
        Event::StateSnapshot {
            display: TimerDisplay::project(self.snapshot.as_ref(), now),
            at: to_datetime(now),
        }
    }

    /// Generation of the tick scheduler that should be running, if any.
    pub fn scheduler_generation(&self) -> Option<u64> {
        self.scheduler
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn notifier(&self) -> &Arc<dyn NotifierPort> {
        &self.notifier
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn subscribe(&mut self, observer: Arc<dyn TimerObserver>) -> ObserverId {
        self.next_observer_id += 1;
        let id = ObserverId(self.next_observer_id);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new session in the Work phase.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if a session is already active; the
    /// active session is left untouched.
    pub fn start(&mut self, plan: TimerPlan) -> Result<Event, TimerError> {
        if let Some(active) = &self.snapshot {
            return Err(TimerError::InvalidTransition {
                operation: "start",
                state: describe(active),
            });
        }

        let now = self.clock.now_ms();
        let snapshot = TimerSnapshot::begin(&plan, Uuid::new_v4().to_string(), now);
        let work = Duration::from_secs(snapshot.work_duration_seconds());
        let event = Event::TimerStarted {
            session_id: snapshot.session_id().to_string(),
            method_id: snapshot.method_id().to_string(),
            method_name: snapshot.method_name().to_string(),
            phase: Phase::Work,
            duration_secs: snapshot.work_duration_seconds(),
            at: to_datetime(now),
        };
        info!(
            session_id = snapshot.session_id(),
            method = snapshot.method_name(),
            "session started"
        );

        self.snapshot = Some(snapshot);
        self.arm_scheduler();
        self.persist();

        self.notifier.phase_started(Phase::Work, work);
        self.notifier.schedule_phase_end(Phase::Work, work);
        self.emit(&event);
        self.emit_phase_change(Phase::Work);
        Ok(event)
    }

    /// Freeze the countdown. No-op when idle or already paused.
    pub fn pause(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        self.reconcile(now);

        let snap = self.snapshot.as_mut().filter(|s| s.is_running)?;
        credit_consumed(snap, now);
        let remaining = snap.remaining_seconds_at(now);
        snap.paused_remaining_seconds = Some(remaining);
        snap.is_running = false;
        let event = Event::TimerPaused {
            phase: snap.phase,
            remaining_secs: remaining,
            at: to_datetime(now),
        };
        debug!(remaining, "timer paused");

        self.scheduler = None;
        self.notifier.cancel_pending();
        self.persist();
        self.emit(&event);
        Some(event)
    }

    /// Continue a paused countdown. No-op when idle or already running.
    pub fn resume(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let snap = self
            .snapshot
            .as_mut()
            .filter(|s| !s.is_running && s.phase != Phase::Finished)?;

        let duration = snap.phase_duration_seconds();
        let remaining = snap.paused_remaining_seconds.unwrap_or(0).min(duration);
        let consumed_ms = i64::try_from((duration - remaining).saturating_mul(1000)).unwrap_or(i64::MAX);
        snap.phase_start_epoch_ms = now.saturating_sub(consumed_ms);
        snap.paused_remaining_seconds = None;
        snap.is_running = true;
        let phase = snap.phase;
        let event = Event::TimerResumed {
            phase,
            remaining_secs: remaining,
            at: to_datetime(now),
        };
        debug!(remaining, "timer resumed");

        self.arm_scheduler();
        self.persist();
        self.notifier
            .schedule_phase_end(phase, Duration::from_secs(remaining));
        self.emit(&event);

        // A zero-remaining resume completes the phase right away.
        self.reconcile(now);
        Some(event)
    }

    /// Pause if running, resume if paused.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.is_running() {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Reconcile against the wall clock. Returns the transitions that
    /// happened (at most Work→Break and Break→Finished).
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        self.reconcile(now)
    }

    /// Tick on behalf of a scheduler. Returns `None` when `generation` is
    /// not the live scheduler, so a cancelled callback cannot touch state.
    pub fn scheduled_tick(&mut self, generation: u64) -> Option<Vec<Event>> {
        if self.scheduler != Some(generation) {
            debug!(generation, live = ?self.scheduler, "ignoring stale tick");
            return None;
        }
        Some(self.tick())
    }

    /// Abandon the active session, recording it as incomplete.
    ///
    /// The tick scheduler and any pending phase-end notification are
    /// cancelled before this returns.
    pub fn terminate(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        self.reconcile(now);

        let mut snap = self.snapshot.take()?;
        self.scheduler = None;
        self.notifier.cancel_pending();

        if snap.is_running {
            credit_consumed(&mut snap, now);
        }
        let record = SessionRecord::from_snapshot(&snap, now, false);
        let event = Event::TimerTerminated {
            session_id: record.id.clone(),
            completed_cycles: record.completed_cycles,
            total_work_secs: record.total_work_seconds,
            total_break_secs: record.total_break_seconds,
            at: to_datetime(now),
        };
        info!(
            session_id = %record.id,
            work_secs = record.total_work_seconds,
            "session terminated"
        );

        self.persist();
        self.sessions.save(record);
        self.emit(&event);
        Some(event)
    }

    /// Alias of [`terminate`](Self::terminate).
    pub fn reset(&mut self) -> Option<Event> {
        self.terminate()
    }

    /// Terminate the active session and start a fresh one with the same
    /// plan and a new session id.
    pub fn restart(&mut self) -> Result<Event, TimerError> {
        let plan = self
            .snapshot
            .as_ref()
            .map(|s| s.plan())
            .ok_or(TimerError::NoActiveSession)?;
        self.terminate();
        // The session may have finished naturally during reconciliation;
        // either way the engine is idle now.
        self.start(plan)
    }

    /// Load the persisted snapshot, discarding it if it is corrupted, and
    /// reconcile it against the current time.
    ///
    /// No-op if a session is already in memory.
    pub fn restore(&mut self) -> Vec<Event> {
        if self.snapshot.is_some() {
            return Vec::new();
        }

        let raw = match self.store.get(TIMER_SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("failed to read timer snapshot: {e}");
                return Vec::new();
            }
        };

        let now = self.clock.now_ms();
        let snapshot = match serde_json::from_str::<TimerSnapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("discarding unreadable timer snapshot: {e}");
                self.discard_persisted();
                return Vec::new();
            }
        };
        if let Err(e) = snapshot.validate(now) {
            warn!(session_id = snapshot.session_id(), "discarding corrupted timer snapshot: {e}");
            self.discard_persisted();
            return Vec::new();
        }

        debug!(session_id = snapshot.session_id(), "timer snapshot restored");
        let running = snapshot.is_running();
        self.snapshot = Some(snapshot);
        if running {
            self.arm_scheduler();
        }
        self.reconcile(now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm_scheduler(&mut self) {
        self.generation += 1;
        self.scheduler = Some(self.generation);
    }

    /// Advance through every phase that has fully elapsed by `now`.
    fn reconcile(&mut self, now: i64) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(step) = self.advance_phase(now) {
            match step {
                Step::EnteredBreak => {
                    let Some(snap) = self.snapshot.as_ref() else { break };
                    let remaining = snap.remaining_seconds_at(now);
                    let cycles = snap.completed_cycles();
                    let duration = Duration::from_secs(snap.phase_duration_seconds());
                    debug!(cycles, remaining, "work finished, break started");

                    let event = Event::PhaseChanged {
                        from: Phase::Work,
                        to: Phase::Break,
                        completed_cycles: cycles,
                        at: to_datetime(now),
                    };
                    self.persist();
                    self.sound.play_transition();
                    self.notifier.cancel_pending();
                    self.notifier.phase_started(Phase::Break, duration);
                    self.notifier
                        .schedule_phase_end(Phase::Break, Duration::from_secs(remaining));
                    self.emit(&event);
                    self.emit_phase_change(Phase::Break);
                    events.push(event);
                }
                Step::Finished(record) => {
                    let from = if record.break_duration_seconds.is_some() {
                        Phase::Break
                    } else {
                        Phase::Work
                    };
                    let at = to_datetime(now);
                    let changed = Event::PhaseChanged {
                        from,
                        to: Phase::Finished,
                        completed_cycles: record.completed_cycles,
                        at,
                    };
                    let finished = Event::TimerFinished {
                        session_id: record.id.clone(),
                        completed_cycles: record.completed_cycles,
                        total_work_secs: record.total_work_seconds,
                        total_break_secs: record.total_break_seconds,
                        at,
                    };
                    info!(session_id = %record.id, cycles = record.completed_cycles, "session finished");

                    self.scheduler = None;
                    self.notifier.cancel_pending();
                    self.persist();
                    self.sessions.save(record);
                    self.sound.play_finish();
                    self.emit(&changed);
                    self.emit_phase_change(Phase::Finished);
                    self.emit(&finished);
                    for (_, observer) in &self.observers {
                        observer.on_finish();
                    }
                    events.push(changed);
                    events.push(finished);
                    break;
                }
            }
        }
        events
    }

    /// One transition if the running phase has fully elapsed.
    ///
    /// Elapsed time past the end of Work is charged to the Break, so a
    /// single late tick walks Work→Break→Finished in order without ever
    /// skipping the Break.
    fn advance_phase(&mut self, now: i64) -> Option<Step> {
        let snap = self.snapshot.as_mut().filter(|s| s.is_running)?;
        let elapsed_ms = snap.running_elapsed_ms(now);
        let duration_ms = snap.phase_duration_ms();
        if elapsed_ms < duration_ms {
            return None;
        }
        let overflow_ms = elapsed_ms - duration_ms;
        let phase_end_ms = snap.phase_start_epoch_ms.saturating_add(duration_ms);

        match snap.phase {
            Phase::Work => {
                snap.accumulated_work_seconds +=
                    snap.work_duration_seconds.saturating_sub(snap.phase_credited_seconds);
                snap.phase_credited_seconds = 0;
                snap.completed_cycles += 1;

                if snap.break_duration_seconds > 0 {
                    snap.phase = Phase::Break;
                    snap.phase_start_epoch_ms = now - overflow_ms;
                    return Some(Step::EnteredBreak);
                }
            }
            Phase::Break => {
                snap.accumulated_break_seconds +=
                    snap.break_duration_seconds.saturating_sub(snap.phase_credited_seconds);
                snap.phase_credited_seconds = 0;
            }
            Phase::Finished => return None,
        }

        let mut done = self.snapshot.take()?;
        done.phase = Phase::Finished;
        done.is_running = false;
        Some(Step::Finished(SessionRecord::from_snapshot(&done, phase_end_ms, true)))
    }

    /// Best-effort write of the snapshot; failures are logged only.
    fn persist(&self) {
        let result = match &self.snapshot {
            Some(snap) => serde_json::to_string(snap)
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    self.store
                        .set(TIMER_SNAPSHOT_KEY, &json)
                        .map_err(|e| e.to_string())
                }),
            None => self
                .store
                .remove(TIMER_SNAPSHOT_KEY)
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            error!("failed to persist timer snapshot: {e}");
        }
    }

    fn discard_persisted(&self) {
        if let Err(e) = self.store.remove(TIMER_SNAPSHOT_KEY) {
            error!("failed to discard timer snapshot: {e}");
        }
    }

    fn emit(&self, event: &Event) {
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }

    fn emit_phase_change(&self, phase: Phase) {
        for (_, observer) in &self.observers {
            observer.on_phase_change(phase);
        }
    }
}

/// Add the part of the current phase consumed since the last credit to
/// the phase's accumulator.
fn credit_consumed(snap: &mut TimerSnapshot, now: i64) {
    let consumed = snap.consumed_seconds_at(now);
    let delta = consumed.saturating_sub(snap.phase_credited_seconds);
    match snap.phase {
        Phase::Work => snap.accumulated_work_seconds += delta,
        Phase::Break => snap.accumulated_break_seconds += delta,
        Phase::Finished => return,
    }
    snap.phase_credited_seconds = consumed.max(snap.phase_credited_seconds);
}

fn describe(snap: &TimerSnapshot) -> String {
    let mode = if snap.is_running() { "running" } else { "paused" };
    format!("{mode} in {} phase", snap.phase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::sync::Mutex;

    const T0: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        phases: Mutex<Vec<Phase>>,
        finished: Mutex<u32>,
    }

    impl TimerObserver for Recorder {
        fn on_event(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
        fn on_phase_change(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
        fn on_finish(&self) {
            *self.finished.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct Ports {
        calls: Mutex<Vec<String>>,
    }

    impl NotifierPort for Ports {
        fn phase_started(&self, phase: Phase, duration: Duration) {
            self.calls.lock().unwrap().push(format!("started:{phase}:{}", duration.as_secs()));
        }
        fn schedule_phase_end(&self, phase: Phase, delay: Duration) {
            self.calls.lock().unwrap().push(format!("schedule:{phase}:{}", delay.as_secs()));
        }
        fn cancel_pending(&self) {
            self.calls.lock().unwrap().push("cancel".into());
        }
    }

    impl SoundPort for Ports {
        fn play_transition(&self) {
            self.calls.lock().unwrap().push("sound:transition".into());
        }
        fn play_finish(&self) {
            self.calls.lock().unwrap().push("sound:finish".into());
        }
    }

    fn setup() -> (ManualClock, Arc<MemoryStore>, TimerEngine) {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryStore::new());
        let engine = TimerEngine::new(store.clone(), Arc::new(clock.clone()));
        (clock, store, engine)
    }

    fn plan(work: u64, brk: Option<u64>) -> TimerPlan {
        TimerPlan::new(work, brk, "Pomodoro", "1").unwrap()
    }

    #[test]
    fn start_pause_resume() {
        let (clock, _, mut engine) = setup();
        assert!(engine.is_idle());

        engine.start(plan(1500, Some(300))).unwrap();
        assert_eq!(engine.phase(), Some(Phase::Work));
        assert!(engine.is_running());

        clock.advance_secs(100);
        assert!(engine.pause().is_some());
        assert!(!engine.is_running());
        assert_eq!(engine.snapshot().unwrap().paused_remaining_seconds(), Some(1400));
        assert_eq!(engine.snapshot().unwrap().accumulated_work_seconds(), 100);

        clock.advance_secs(500);
        assert_eq!(engine.remaining_seconds(), 1400);

        assert!(engine.resume().is_some());
        assert!(engine.is_running());
        assert_eq!(engine.remaining_seconds(), 1400);
        assert_eq!(engine.snapshot().unwrap().paused_remaining_seconds(), None);
    }

    #[test]
    fn redundant_pause_and_resume_are_noops() {
        let (_, _, mut engine) = setup();
        assert!(engine.pause().is_none());
        assert!(engine.resume().is_none());
        assert!(engine.toggle().is_none());

        engine.start(plan(60, None)).unwrap();
        assert!(engine.resume().is_none());
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
    }

    #[test]
    fn toggle_flips_running_state() {
        let (_, _, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        assert!(matches!(engine.toggle(), Some(Event::TimerPaused { .. })));
        assert!(matches!(engine.toggle(), Some(Event::TimerResumed { .. })));
    }

    #[test]
    fn second_start_is_rejected() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        let id = engine.snapshot().unwrap().session_id().to_string();
        clock.advance_secs(10);

        let err = engine.start(plan(120, Some(30))).unwrap_err();
        assert!(matches!(err, TimerError::InvalidTransition { operation: "start", .. }));
        let snap = engine.snapshot().unwrap();
        assert_eq!(snap.session_id(), id);
        assert_eq!(snap.work_duration_seconds(), 60);
        assert_eq!(engine.remaining_seconds(), 50);
    }

    #[test]
    fn pause_resume_with_no_elapsed_time_keeps_remaining() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(1500, None)).unwrap();
        clock.advance_ms(42_000);
        let before = engine.remaining_seconds();
        engine.pause();
        engine.resume();
        assert_eq!(engine.remaining_seconds(), before);
    }

    #[test]
    fn late_tick_enters_break_with_overflow() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, Some(60))).unwrap();
        clock.advance_secs(90);

        let events = engine.tick();
        assert_eq!(events.len(), 1);
        assert_eq!(engine.phase(), Some(Phase::Break));
        assert_eq!(engine.remaining_seconds(), 30);
        assert_eq!(engine.snapshot().unwrap().completed_cycles(), 1);
        assert_eq!(engine.snapshot().unwrap().accumulated_work_seconds(), 60);
    }

    #[test]
    fn very_late_tick_walks_both_phases() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, Some(60))).unwrap();
        clock.advance_secs(500);

        let events = engine.tick();
        assert!(matches!(
            events.as_slice(),
            [
                Event::PhaseChanged { to: Phase::Break, .. },
                Event::PhaseChanged { to: Phase::Finished, .. },
                Event::TimerFinished { .. }
            ]
        ));
        assert!(engine.is_idle());

        let record = &engine.sessions().get_all()[0];
        assert!(record.is_completed);
        assert_eq!(record.total_work_seconds, 60);
        assert_eq!(record.total_break_seconds, 60);
        assert_eq!(record.end_time.timestamp_millis(), T0 + 120_000);
    }

    #[test]
    fn work_without_break_finishes() {
        let (clock, store, mut engine) = setup();
        engine.start(plan(90, None)).unwrap();
        clock.advance_secs(90);
        let events = engine.tick();
        assert!(events.iter().any(|e| matches!(e, Event::TimerFinished { completed_cycles: 1, .. })));
        assert!(engine.is_idle());
        assert!(store.get(TIMER_SNAPSHOT_KEY).unwrap().is_none());
    }

    /// Every completed Work phase counts as a cycle, whether or not a
    /// Break follows it.
    #[test]
    fn work_completion_counts_a_cycle_without_break() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        clock.advance_secs(60);
        let events = engine.tick();
        match events.last() {
            Some(Event::TimerFinished { completed_cycles, .. }) => assert_eq!(*completed_cycles, 1),
            other => panic!("Expected TimerFinished, got {other:?}"),
        }
        assert_eq!(engine.sessions().get_all()[0].completed_cycles, 1);

        let (clock, _, mut engine) = setup();
        engine.start(plan(60, Some(30))).unwrap();
        clock.advance_secs(60);
        engine.tick();
        assert_eq!(engine.snapshot().unwrap().completed_cycles(), 1);
        clock.advance_secs(30);
        engine.tick();
        assert!(engine.is_idle());
        assert_eq!(engine.sessions().get_all()[0].completed_cycles, 1);
    }

    #[test]
    fn paused_engine_does_not_advance() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, Some(60))).unwrap();
        clock.advance_secs(30);
        engine.pause();
        clock.advance_secs(3600);
        assert!(engine.tick().is_empty());
        assert_eq!(engine.phase(), Some(Phase::Work));
        assert_eq!(engine.remaining_seconds(), 30);
    }

    #[test]
    fn terminate_records_partial_time() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(1500, Some(300))).unwrap();
        clock.advance_secs(300);
        engine.pause();
        assert_eq!(engine.snapshot().unwrap().accumulated_work_seconds(), 300);
        clock.advance_secs(1000);
        engine.resume();
        clock.advance_secs(45);

        let event = engine.terminate().unwrap();
        assert!(matches!(event, Event::TimerTerminated { total_work_secs: 345, .. }));
        assert!(engine.is_idle());
        assert_eq!(engine.scheduler_generation(), None);

        let record = &engine.sessions().get_all()[0];
        assert!(!record.is_completed);
        assert_eq!(record.total_work_seconds, 345);
        assert_eq!(record.completed_cycles, 0);
    }

    #[test]
    fn terminate_when_idle_is_noop() {
        let (_, _, mut engine) = setup();
        assert!(engine.terminate().is_none());
        assert!(engine.reset().is_none());
        assert!(engine.sessions().get_all().is_empty());
    }

    #[test]
    fn restart_creates_new_session() {
        let (clock, _, mut engine) = setup();
        assert_eq!(engine.restart(), Err(TimerError::NoActiveSession));

        engine.start(plan(60, Some(30))).unwrap();
        let first = engine.snapshot().unwrap().session_id().to_string();
        clock.advance_secs(20);

        engine.restart().unwrap();
        let snap = engine.snapshot().unwrap();
        assert_ne!(snap.session_id(), first);
        assert_eq!(snap.break_duration_seconds(), Some(30));
        assert_eq!(engine.remaining_seconds(), 60);

        let records = engine.sessions().get_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, first);
        assert!(!records[0].is_completed);
    }

    #[test]
    fn scheduler_generation_tracks_running_segments() {
        let (_, _, mut engine) = setup();
        assert_eq!(engine.scheduler_generation(), None);

        engine.start(plan(60, None)).unwrap();
        let first = engine.scheduler_generation().unwrap();

        engine.pause();
        assert_eq!(engine.scheduler_generation(), None);
        assert!(engine.scheduled_tick(first).is_none());

        engine.resume();
        let second = engine.scheduler_generation().unwrap();
        assert_ne!(first, second);
        assert!(engine.scheduled_tick(first).is_none());
        assert!(engine.scheduled_tick(second).is_some());
    }

    #[test]
    fn stale_tick_cannot_revive_cleared_session() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        let generation = engine.scheduler_generation().unwrap();
        engine.terminate();
        clock.advance_secs(120);
        assert!(engine.scheduled_tick(generation).is_none());
        assert!(engine.is_idle());
        assert_eq!(engine.sessions().get_all().len(), 1);
    }

    #[test]
    fn observers_see_transitions() {
        let (clock, _, mut engine) = setup();
        let recorder = Arc::new(Recorder::default());
        let id = engine.subscribe(recorder.clone());

        engine.start(plan(5, Some(5))).unwrap();
        clock.advance_secs(5);
        engine.tick();
        clock.advance_secs(5);
        engine.tick();

        assert_eq!(
            *recorder.phases.lock().unwrap(),
            [Phase::Work, Phase::Break, Phase::Finished]
        );
        assert_eq!(*recorder.finished.lock().unwrap(), 1);
        assert!(matches!(
            recorder.events.lock().unwrap().last(),
            Some(Event::TimerFinished { .. })
        ));

        assert!(engine.unsubscribe(id));
        assert!(!engine.unsubscribe(id));
        engine.start(plan(5, None)).unwrap();
        assert_eq!(recorder.phases.lock().unwrap().len(), 3);
    }

    #[test]
    fn ports_are_driven_on_transitions() {
        let clock = ManualClock::new(T0);
        let ports = Arc::new(Ports::default());
        let mut engine = TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()))
            .with_notifier(ports.clone())
            .with_sound(ports.clone());

        engine.start(plan(10, Some(5))).unwrap();
        clock.advance_secs(4);
        engine.pause();
        engine.resume();
        clock.advance_secs(6);
        engine.tick();
        clock.advance_secs(5);
        engine.tick();

        assert_eq!(
            *ports.calls.lock().unwrap(),
            [
                "started:work:10",
                "schedule:work:10",
                "cancel",
                "schedule:work:6",
                "sound:transition",
                "cancel",
                "started:break:5",
                "schedule:break:5",
                "cancel",
                "sound:finish",
            ]
        );
    }

    #[test]
    fn snapshot_is_persisted_on_each_transition() {
        let (clock, store, mut engine) = setup();
        engine.start(plan(60, Some(60))).unwrap();
        let stored: TimerSnapshot =
            serde_json::from_str(&store.get(TIMER_SNAPSHOT_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.phase(), Phase::Work);

        clock.advance_secs(61);
        engine.tick();
        let stored: TimerSnapshot =
            serde_json::from_str(&store.get(TIMER_SNAPSHOT_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.phase(), Phase::Break);
    }

    #[test]
    fn persistence_failure_does_not_stop_the_timer() {
        let (clock, store, mut engine) = setup();
        store.fail_writes(true);
        engine.start(plan(5, None)).unwrap();
        assert!(engine.is_running());
        clock.advance_secs(5);
        let events = engine.tick();
        assert!(events.iter().any(|e| matches!(e, Event::TimerFinished { .. })));
        assert!(engine.is_idle());
        store.fail_writes(false);
        assert!(engine.sessions().get_all().is_empty());
    }

    #[test]
    fn restore_reconciles_elapsed_time() {
        let (clock, store, mut engine) = setup();
        engine.start(plan(1500, Some(300))).unwrap();
        drop(engine);

        clock.advance_secs(1500 + 120);
        let mut revived = TimerEngine::new(store.clone(), Arc::new(clock.clone()));
        let events = revived.restore();
        assert_eq!(events.len(), 1);
        assert_eq!(revived.phase(), Some(Phase::Break));
        assert_eq!(revived.remaining_seconds(), 180);
        assert!(revived.scheduler_generation().is_some());
    }

    #[test]
    fn restore_discards_corrupted_snapshot() {
        let (clock, store, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&store.get(TIMER_SNAPSHOT_KEY).unwrap().unwrap()).unwrap();
        json["phase"] = "finished".into();
        store.set(TIMER_SNAPSHOT_KEY, &json.to_string()).unwrap();

        let mut revived = TimerEngine::new(store.clone(), Arc::new(clock.clone()));
        assert!(revived.restore().is_empty());
        assert!(revived.is_idle());
        assert!(store.get(TIMER_SNAPSHOT_KEY).unwrap().is_none());

        store.set(TIMER_SNAPSHOT_KEY, "{oops").unwrap();
        assert!(revived.restore().is_empty());
        assert!(revived.is_idle());
        assert!(store.get(TIMER_SNAPSHOT_KEY).unwrap().is_none());
    }

    #[test]
    fn restore_discards_snapshot_with_excess_credit() {
        let (clock, store, mut engine) = setup();
        engine.start(plan(60, None)).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&store.get(TIMER_SNAPSHOT_KEY).unwrap().unwrap()).unwrap();
        json["phase_credited_seconds"] = 999.into();
        store.set(TIMER_SNAPSHOT_KEY, &json.to_string()).unwrap();
        drop(engine);

        clock.advance_secs(61);
        let mut revived = TimerEngine::new(store.clone(), Arc::new(clock.clone()));
        assert!(revived.restore().is_empty());
        assert!(revived.is_idle());
        assert!(store.get(TIMER_SNAPSHOT_KEY).unwrap().is_none());
        assert!(revived.sessions().get_all().is_empty());
    }

    #[test]
    fn state_event_wraps_display() {
        let (clock, _, mut engine) = setup();
        engine.start(plan(120, None)).unwrap();
        clock.advance_secs(15);
        match engine.state_event() {
            Event::StateSnapshot { display, .. } => {
                assert_eq!(display.remaining_seconds, 105);
                assert_eq!(display.formatted_time, "01:45");
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
