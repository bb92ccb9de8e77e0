//! Social-engagement retrieval and ranking.

mod ranker;
mod source;

pub use ranker::{EngagementRanker, EMPTY_SUMMARY};
pub use source::{EngagementSource, EngagementSourceConfig, RapidApiSource};

use chrono::{Days, NaiveDate};

/// One historical search window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Position in recency order; 0 is the most recent window
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// `count` consecutive windows of `days` each, ending at `anchor` and
    /// walking backwards.
    pub fn recent(anchor: NaiveDate, count: usize, days: u32) -> Vec<TimeWindow> {
        let span = Days::new(u64::from(days.max(1)));
        let mut windows = Vec::with_capacity(count);
        let mut end = anchor;
        for index in 0..count {
            let Some(start) = end.checked_sub_days(span) else {
                break;
            };
            windows.push(TimeWindow { index, start, end });
            end = start;
        }
        windows
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
