mod record;
mod store;

pub use record::{DailyStats, MethodStats, SessionRecord, Stats};
pub use store::{DailyStatsMap, SessionStore};
