//! Lookback filter for time-bounded queries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 1440;

/// How far back a time-range query should look.
///
/// The fields are combined additively into a single window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTime {
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

impl LastTime {
    pub fn new(days: u32, hours: u32, minutes: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
        }
    }

    /// Total lookback window in minutes.
    pub fn window_minutes(&self) -> u64 {
        u64::from(self.minutes)
            + u64::from(self.hours) * MINUTES_PER_HOUR
            + u64::from(self.days) * MINUTES_PER_DAY
    }

    pub fn window(&self) -> Duration {
        Duration::minutes(self.window_minutes() as i64)
    }

    /// Oldest `sent_at` a query anchored at `now` should return.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
