use chrono::{Duration, NaiveDate, Utc};
use clap::Subcommand;
use serde_json::json;

use super::context::Context;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List sessions, newest first
    List {
        /// Only sessions started on this date (YYYY-MM-DD, UTC)
        #[arg(long, conflicts_with = "days")]
        date: Option<NaiveDate>,
        /// Sessions from the last N days (defaults to history.recent_days)
        #[arg(long)]
        days: Option<u32>,
        /// Every recorded session
        #[arg(long, conflicts_with_all = ["date", "days"])]
        all: bool,
    },
    /// Per-day statistics for a date range
    Stats {
        /// First date, inclusive
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date, inclusive (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// All-time and today totals
    Summary,
    /// Delete every recorded session
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open()?;
    let sessions = ctx.sessions();
    let now = Utc::now();
    let today = now.date_naive();

    match action {
        HistoryAction::List { date, days, all } => {
            let records = if all {
                sessions.try_get_all()?
            } else if let Some(date) = date {
                sessions.get_by_date(date)
            } else {
                let days = days.unwrap_or(ctx.config.history.recent_days);
                sessions.get_recent(days, now)
            };
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        HistoryAction::Stats { from, to } => {
            let to = to.unwrap_or(today);
            let span = i64::from(ctx.config.history.recent_days.max(1)) - 1;
            let from = from.unwrap_or(to - Duration::days(span));
            if from > to {
                return Err(format!("--from {from} is after --to {to}").into());
            }
            let stats = sessions.stats_for_period(from, to);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Summary => {
            let summary = sessions.summary(today);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear history without --yes".into());
            }
            sessions.try_clear_all()?;
            println!("{}", json!({ "type": "history_cleared" }));
        }
    }
    Ok(())
}
