//! Social-engagement records and aggregate views over them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw engagement counters for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub reposts: u64,
    pub favorites: u64,
    pub quotes: u64,
    pub bookmarks: u64,
    pub replies: u64,
    pub views: u64,
}

impl EngagementMetrics {
    /// Composite score: reposts + favorites + quotes + bookmarks.
    ///
    /// Views and replies are tracked but not scored.
    pub fn composite_score(&self) -> u64 {
        self.reposts
            .saturating_add(self.favorites)
            .saturating_add(self.quotes)
            .saturating_add(self.bookmarks)
    }
}

/// Author of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub handle: String,
    pub display_name: String,
    pub followers: u64,
    pub verified: bool,
}

/// One social post with its engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub post_id: String,
    pub author: PostAuthor,
    pub text: String,
    /// Calendar day used for daily bucketing
    pub posted_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    pub metrics: EngagementMetrics,
    /// Position in the merged discovery sequence; breaks score ties
    pub discovery_index: usize,
}

impl EngagementRecord {
    pub fn score(&self) -> u64 {
        self.metrics.composite_score()
    }
}

/// Sort key for ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    /// Composite engagement score
    #[default]
    Score,
    Views,
}

impl RankKey {
    pub fn value(&self, record: &EngagementRecord) -> u64 {
        match self {
            RankKey::Score => record.score(),
            RankKey::Views => record.metrics.views,
        }
    }
}

/// Per-day aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub posts: u64,
    /// Sum of composite scores
    pub engagement: u64,
    pub views: u64,
    pub replies: u64,
    pub quotes: u64,
    pub bookmarks: u64,
}

impl DailyStats {
    pub fn add(&mut self, record: &EngagementRecord) {
        self.posts += 1;
        self.engagement = self.engagement.saturating_add(record.score());
        self.views = self.views.saturating_add(record.metrics.views);
        self.replies = self.replies.saturating_add(record.metrics.replies);
        self.quotes = self.quotes.saturating_add(record.metrics.quotes);
        self.bookmarks = self.bookmarks.saturating_add(record.metrics.bookmarks);
    }

    pub fn avg_engagement(&self) -> f64 {
        average(self.engagement, self.posts)
    }

    pub fn avg_views(&self) -> f64 {
        average(self.views, self.posts)
    }

    pub fn avg_replies(&self) -> f64 {
        average(self.replies, self.posts)
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Merged engagement data for one analysis request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub windows_total: usize,
    pub windows_failed: usize,
    pub total_posts: usize,
    pub total_engagement: u64,
    pub daily_stats: BTreeMap<NaiveDate, DailyStats>,
    /// Highest-ranked posts, best first
    pub top_posts: Vec<EngagementRecord>,
    /// Plain-text rendering used as prompt context
    pub summary_text: String,
}

impl EngagementSummary {
    pub fn days_covered(&self) -> usize {
        self.daily_stats.len()
    }

    pub fn all_windows_failed(&self) -> bool {
        self.windows_total > 0 && self.windows_failed == self.windows_total
    }
}
