use chrono::{DateTime, Utc};

pub const THIRTY_DAYS_SECS: i64 = 30 * 24 * 60 * 60;

/// Trailing thirty-day enrollment window in unix seconds, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThirtyDayWindow {
    pub start: i64,
    pub end: i64,
}

impl ThirtyDayWindow {
    pub fn ending_at(now: DateTime<Utc>) -> Self {
        let end = now.timestamp();
        Self {
            start: end - THIRTY_DAYS_SECS,
            end,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
