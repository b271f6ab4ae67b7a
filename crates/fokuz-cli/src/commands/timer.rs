use std::io::Write;
use std::sync::Arc;

use clap::Subcommand;
use fokuz_core::reminder::REMINDER_MESSAGE;
use fokuz_core::{
    Clock, Event, TimerDisplay, TimerEngine, TimerPlan, TimerService, WaterReminder, WriteBehind,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::context::Context;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session (defaults to the configured method)
    Start {
        /// Method ID, see `fokuz methods list`
        method_id: Option<String>,
    },
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// Pause if running, resume if paused
    Toggle,
    /// Abandon the current session
    Reset,
    /// Abandon the current session and start it again
    Restart,
    /// Print current timer state as JSON
    Status,
    /// Run the timer in the foreground until the session ends
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the event a command produced, or the current state if it was a no-op.
fn print_outcome(
    event: Option<Event>,
    engine: &TimerEngine,
) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&engine.state_event()),
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open()?;
    let mut engine = ctx.engine();
    for event in engine.restore() {
        print_json(&event)?;
    }

    match action {
        TimerAction::Start { method_id } => {
            let id = method_id.unwrap_or_else(|| ctx.config.timer.default_method_id.clone());
            let method = ctx
                .methods()
                .get(&id)?
                .ok_or_else(|| format!("unknown method: {id}"))?;
            let event = engine.start(TimerPlan::from_method(&method)?)?;
            print_json(&event)?;
        }
        TimerAction::Pause => print_outcome(engine.pause(), &engine)?,
        TimerAction::Resume => print_outcome(engine.resume(), &engine)?,
        TimerAction::Toggle => print_outcome(engine.toggle(), &engine)?,
        TimerAction::Reset => print_outcome(engine.reset(), &engine)?,
        TimerAction::Restart => print_json(&engine.restart()?)?,
        TimerAction::Status => {
            for event in engine.tick() {
                print_json(&event)?;
            }
            print_json(&engine.display())?;
        }
        TimerAction::Watch => {
            drop(engine);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(watch(ctx))?;
        }
    }
    Ok(())
}

fn render(display: &TimerDisplay) {
    let method = display.method_name.as_deref().unwrap_or("-");
    let state = if display.is_running { "" } else { " (paused)" };
    print!(
        "\r{} | {} {} | cycles {}{}   ",
        method, display.phase_label, display.formatted_time, display.completed_cycles, state
    );
    let _ = std::io::stdout().flush();
}

async fn watch(ctx: Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(WriteBehind::new(ctx.db.clone()));
    let mut engine = ctx.engine_over(store.clone());
    engine.restore();
    let notifier = engine.notifier().clone();
    let clock = engine.clock().clone();

    let service = TimerService::new(engine, ctx.config.tick_interval());
    let display = service.display().await;
    if !display.is_active {
        println!("no active session");
        store.flush().await?;
        return Ok(());
    }
    if !display.is_running {
        render(&display);
        println!();
        println!("timer is paused, run `fokuz timer resume` first");
        store.flush().await?;
        return Ok(());
    }

    let mut events = service.subscribe();
    let mut reminder = ctx
        .config
        .water_reminder
        .enabled
        .then(|| WaterReminder::from_config(&ctx.config.water_reminder));
    if let Some(reminder) = reminder.as_mut() {
        reminder.start(clock.now_ms());
    }

    render(&display);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!();
                info!("watch interrupted; session left running");
                break;
            }
            received = events.recv() => match received {
                Ok(Event::StateSnapshot { display, .. }) => {
                    render(&display);
                    if reminder.as_mut().is_some_and(|r| r.poll(clock.now_ms())) {
                        println!();
                        notifier.reminder(REMINDER_MESSAGE);
                    }
                }
                Ok(event @ (Event::TimerFinished { .. } | Event::TimerTerminated { .. })) => {
                    println!();
                    print_json(&event)?;
                    break;
                }
                Ok(Event::PhaseChanged { to, .. }) => {
                    println!();
                    info!(%to, "phase changed");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    service.shutdown();
    store.flush().await?;
    Ok(())
}
