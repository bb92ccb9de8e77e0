//! Deterministic ranking and per-day aggregation of engagement records.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use hypecast_models::{DailyStats, EngagementRecord, EngagementSummary, RankKey};

/// Summary text used when no window produced any posts.
pub const EMPTY_SUMMARY: &str = "No posts found for analysis.";

/// Orders records by a rank key and condenses them into a summary.
#[derive(Debug, Clone, Copy)]
pub struct EngagementRanker {
    top_k: usize,
    key: RankKey,
}

impl Default for EngagementRanker {
    fn default() -> Self {
        Self::new(5)
    }
}

impl EngagementRanker {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            key: RankKey::Score,
        }
    }

    pub fn with_key(mut self, key: RankKey) -> Self {
        self.key = key;
        self
    }

    /// Sort descending by the rank key. Ties keep discovery order.
    pub fn rank(&self, mut records: Vec<EngagementRecord>) -> Vec<EngagementRecord> {
        records.sort_by(|a, b| {
            self.key
                .value(b)
                .cmp(&self.key.value(a))
                .then(a.discovery_index.cmp(&b.discovery_index))
        });
        records
    }

    /// The best `top_k` records.
    pub fn top(&self, records: Vec<EngagementRecord>) -> Vec<EngagementRecord> {
        let mut ranked = self.rank(records);
        ranked.truncate(self.top_k);
        ranked
    }

    /// Per-day totals, independent of ranking.
    pub fn daily_stats(records: &[EngagementRecord]) -> BTreeMap<NaiveDate, DailyStats> {
        let mut stats: BTreeMap<NaiveDate, DailyStats> = BTreeMap::new();
        for record in records {
            stats.entry(record.posted_on).or_default().add(record);
        }
        stats
    }

    /// Build the full summary for merged records.
    pub fn summarize(
        &self,
        records: Vec<EngagementRecord>,
        windows_total: usize,
        windows_failed: usize,
    ) -> EngagementSummary {
        let daily_stats = Self::daily_stats(&records);
        let total_posts = records.len();
        let total_engagement = records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.score()));
        let top_posts = self.top(records);

        let summary_text = if total_posts == 0 {
            EMPTY_SUMMARY.to_string()
        } else {
            let mut text = format!(
                "Found {} posts with total engagement of {} across {} days.",
                total_posts,
                total_engagement,
                daily_stats.len()
            );
            for (i, post) in top_posts.iter().enumerate() {
                let m = &post.metrics;
                let _ = write!(
                    text,
                    "\n{}. @{} ({} followers) on {}: {} [{} reposts, {} likes, {} views, {} quotes, {} bookmarks]",
                    i + 1,
                    post.author.handle,
                    post.author.followers,
                    post.posted_on,
                    post.text.replace('\n', " "),
                    m.reposts,
                    m.favorites,
                    m.views,
                    m.quotes,
                    m.bookmarks
                );
            }
            text
        };

        EngagementSummary {
            windows_total,
            windows_failed,
            total_posts,
            total_engagement,
            daily_stats,
            top_posts,
            summary_text,
        }
    }
}
