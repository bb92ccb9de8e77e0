//! Post search backend queried once per time window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use hypecast_models::{EngagementMetrics, EngagementRecord, PostAuthor};
use hypecast_render_client::{RateLimiter, RenderError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::TimeWindow;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig};

const LEGACY_TIMESTAMP: &str = "%a %b %d %H:%M:%S +0000 %Y";
const BLUE_VERIFIED_POINTER: &str = "/additional_media_info/source_user/user_results/result/is_blue_verified";

/// Source of engagement records for one subject and window.
#[async_trait]
pub trait EngagementSource: Send + Sync {
    /// Records found in `window`, in the order the backend returned them.
    ///
    /// `discovery_index` is the position within this window.
    async fn fetch_window(
        &self,
        subject: &str,
        window: &TimeWindow,
    ) -> WorkerResult<Vec<EngagementRecord>>;
}

/// RapidAPI search configuration.
#[derive(Debug, Clone)]
pub struct EngagementSourceConfig {
    pub api_url: String,
    pub api_host: String,
    pub api_key: String,
    /// Minimum spacing between requests
    pub min_interval: Duration,
    /// One limiter for every window instead of one per window
    pub shared_pacing: bool,
    /// Keep only posts from verified authors
    pub verified_only: bool,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for EngagementSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://twitter-api45.p.rapidapi.com".to_string(),
            api_host: "twitter-api45.p.rapidapi.com".to_string(),
            api_key: String::new(),
            min_interval: Duration::from_millis(2000),
            shared_pacing: false,
            verified_only: false,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EngagementSourceConfig {
    /// Create config from environment variables.
    ///
    /// `RAPID_API_KEY` is required.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let api_key = std::env::var("RAPID_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| WorkerError::dependency("RAPID_API_KEY not set"))?;

        Ok(Self {
            api_url: std::env::var("ENGAGEMENT_API_URL").unwrap_or(defaults.api_url),
            api_host: std::env::var("ENGAGEMENT_API_HOST").unwrap_or(defaults.api_host),
            api_key,
            min_interval: Duration::from_millis(
                std::env::var("ENGAGEMENT_MIN_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            shared_pacing: std::env::var("ENGAGEMENT_SHARED_PACING")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.shared_pacing),
            verified_only: std::env::var("ENGAGEMENT_VERIFIED_ONLY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.verified_only),
            max_retries: std::env::var("ENGAGEMENT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: Duration::from_millis(
                std::env::var("ENGAGEMENT_RETRY_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            timeout: defaults.timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    tweet_id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    retweets: Option<Count>,
    #[serde(default)]
    favorites: Option<Count>,
    #[serde(default)]
    quotes: Option<Count>,
    #[serde(default)]
    bookmarks: Option<Count>,
    #[serde(default)]
    replies: Option<Count>,
    #[serde(default)]
    views: Option<Count>,
    #[serde(default)]
    user_info: Option<UserInfo>,
    #[serde(default)]
    entities: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    screen_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    followers_count: Option<Count>,
    #[serde(default)]
    verified: bool,
}

/// Counters arrive as numbers or comma-grouped strings ("12,345").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Count {
    fn value(&self) -> u64 {
        match self {
            Count::Int(n) => *n,
            Count::Float(f) if *f > 0.0 => *f as u64,
            Count::Float(_) => 0,
            Count::Text(s) => s.replace(',', "").trim().parse().unwrap_or(0),
        }
    }
}

fn count(value: &Option<Count>) -> u64 {
    value.as_ref().map(Count::value).unwrap_or(0)
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_blue_verified(entities: Option<&Value>) -> bool {
    entities
        .and_then(|e| e.get("media"))
        .and_then(Value::as_array)
        .is_some_and(|media| {
            media
                .iter()
                .any(|m| m.pointer(BLUE_VERIFIED_POINTER).and_then(Value::as_bool) == Some(true))
        })
}

fn to_record(entry: TimelineEntry, fallback_day: NaiveDate, discovery_index: usize) -> EngagementRecord {
    let posted_at = entry.created_at.as_deref().and_then(parse_created_at);
    let user = entry.user_info;
    let blue = is_blue_verified(entry.entities.as_ref());

    let author = match user {
        Some(u) => PostAuthor {
            handle: u.screen_name.unwrap_or_else(|| "unknown".to_string()),
            display_name: u.name.unwrap_or_else(|| "Unknown".to_string()),
            followers: count(&u.followers_count),
            verified: u.verified || blue,
        },
        None => PostAuthor {
            handle: "unknown".to_string(),
            display_name: "Unknown".to_string(),
            followers: 0,
            verified: blue,
        },
    };

    EngagementRecord {
        post_id: entry.tweet_id.unwrap_or_default(),
        author,
        text: entry.text,
        posted_on: posted_at.map(|dt| dt.date_naive()).unwrap_or(fallback_day),
        posted_at,
        metrics: EngagementMetrics {
            reposts: count(&entry.retweets),
            favorites: count(&entry.favorites),
            quotes: count(&entry.quotes),
            bookmarks: count(&entry.bookmarks),
            replies: count(&entry.replies),
            views: count(&entry.views),
        },
        discovery_index,
    }
}

/// Search client for the RapidAPI post-search endpoint.
pub struct RapidApiSource {
    http: Client,
    config: EngagementSourceConfig,
    shared_limiter: Option<Arc<RateLimiter>>,
}

impl RapidApiSource {
    pub fn new(config: EngagementSourceConfig) -> WorkerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(WorkerError::dependency("engagement API key is empty"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RenderError::Network)?;
        let shared_limiter = config
            .shared_pacing
            .then(|| Arc::new(RateLimiter::new(config.min_interval)));

        Ok(Self {
            http,
            config,
            shared_limiter,
        })
    }

    pub fn from_env() -> WorkerResult<Self> {
        Self::new(EngagementSourceConfig::from_env()?)
    }

    pub fn config(&self) -> &EngagementSourceConfig {
        &self.config
    }

    fn query_for(subject: &str, window: &TimeWindow) -> String {
        format!(
            "{} until:{} since:{}",
            subject,
            window.end.format("%Y-%m-%d"),
            window.start.format("%Y-%m-%d")
        )
    }

    async fn search_once(
        &self,
        limiter: &RateLimiter,
        subject: &str,
        window: &TimeWindow,
    ) -> WorkerResult<Vec<EngagementRecord>> {
        let url = format!("{}/search.php", self.config.api_url);
        let query = Self::query_for(subject, window);

        limiter.wait().await;
        let response = self
            .http
            .get(&url)
            .query(&[("query", query.as_str()), ("search_type", "Top")])
            .header("x-rapidapi-key", &self.config.api_key)
            .header("x-rapidapi-host", &self.config.api_host)
            .send()
            .await
            .map_err(RenderError::Network)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::transport(status, body).into());
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            WorkerError::engagement_failed(format!("invalid search response: {}", e))
        })?;

        if let Some(status) = parsed.status.as_deref() {
            if status != "ok" {
                return Err(WorkerError::engagement_failed(format!(
                    "search returned status '{}'",
                    status
                )));
            }
        }

        let records: Vec<EngagementRecord> = parsed
            .timeline
            .into_iter()
            .filter(|entry| entry.kind.as_deref() == Some("tweet"))
            .enumerate()
            .map(|(i, entry)| to_record(entry, window.start, i))
            .filter(|record| !self.config.verified_only || record.author.verified)
            .collect();

        // Keep indices dense after filtering
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.discovery_index = i;
                record
            })
            .collect())
    }
}

#[async_trait]
impl EngagementSource for RapidApiSource {
    async fn fetch_window(
        &self,
        subject: &str,
        window: &TimeWindow,
    ) -> WorkerResult<Vec<EngagementRecord>> {
        let own_limiter;
        let limiter = match &self.shared_limiter {
            Some(shared) => shared.as_ref(),
            None => {
                own_limiter = RateLimiter::new(self.config.min_interval);
                &own_limiter
            }
        };

        let retry = RetryConfig::new(format!("engagement window {}", window))
            .with_max_retries(self.config.max_retries)
            .with_base_delay(self.config.retry_base_delay);

        debug!(window = window.index, range = %window, subject, "Searching posts");
        let records = retry_async(&retry, WorkerError::is_retryable, || {
            self.search_once(limiter, subject, window)
        })
        .await?;

        info!(
            window = window.index,
            range = %window,
            posts = records.len(),
            "Engagement window fetched"
        );
        Ok(records)
    }
}
