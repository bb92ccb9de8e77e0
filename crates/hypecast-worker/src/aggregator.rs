//! Concurrent engagement fan-out joined into one generative analysis.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use hypecast_models::{classify, AnalysisRequest, AnalysisResult, EngagementRecord, EngagementSummary, RankKey};
use metrics::counter;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

use crate::engagement::{EngagementRanker, EngagementSource, TimeWindow};
use crate::error::{WorkerError, WorkerResult};
use crate::generative::{GenerativeModel, Prompt};
use crate::logging::StageLogger;

const ANALYST_SYSTEM_PROMPT: &str = "You are a blunt market analyst reviewing a newly pitched token. \
Weigh the pitch, the attached image if any, and the social engagement data. \
Be specific about strengths and risks. \
End with a final line containing exactly one of: INVEST or DO NOT INVEST.";

/// Window layout and ranking for one aggregation.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub windows: usize,
    pub window_days: u32,
    pub top_k: usize,
    pub rank_key: RankKey,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            windows: 5,
            window_days: 1,
            top_k: 5,
            rank_key: RankKey::Score,
        }
    }
}

/// Fans engagement retrieval out over time windows, joins, ranks, then runs
/// the dependent generative analysis.
pub struct AnalysisAggregator {
    source: Arc<dyn EngagementSource>,
    model: Arc<dyn GenerativeModel>,
    config: AggregatorConfig,
}

impl AnalysisAggregator {
    pub fn new(
        source: Arc<dyn EngagementSource>,
        model: Arc<dyn GenerativeModel>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            source,
            model,
            config,
        }
    }

    /// Analyze `request` with windows ending today (UTC).
    pub async fn run(&self, request: &AnalysisRequest) -> WorkerResult<AnalysisResult> {
        self.run_at(request, Utc::now().date_naive()).await
    }

    /// Analyze `request` with windows ending at `anchor`.
    pub async fn run_at(
        &self,
        request: &AnalysisRequest,
        anchor: NaiveDate,
    ) -> WorkerResult<AnalysisResult> {
        let request_key = request.request_key();
        let logger = StageLogger::new(&request_key, "aggregate");
        let windows = TimeWindow::recent(anchor, self.config.windows, self.config.window_days);
        logger.log_start(&format!("{} engagement windows", windows.len()));

        let engagement = self.gather(&request_key, &windows).await;
        if engagement.all_windows_failed() {
            logger.log_warning("every engagement window failed; continuing without posts");
        }
        logger.log_progress(&format!(
            "{} posts from {}/{} windows",
            engagement.total_posts,
            engagement.windows_total - engagement.windows_failed,
            engagement.windows_total
        ));

        let prompt = Prompt::new(ANALYST_SYSTEM_PROMPT, analysis_prompt(request, &engagement))
            .with_image(request.image_url.clone());
        let analysis_text = self.model.complete(&prompt).await.map_err(|e| {
            logger.log_error(&e.to_string());
            match e {
                WorkerError::AnalysisFailed(_) => e,
                other => WorkerError::analysis_failed(other.to_string()),
            }
        })?;

        let recommendation = classify(&analysis_text);
        logger.log_completion(&format!("recommendation {}", recommendation));

        Ok(AnalysisResult {
            request_key,
            engagement,
            analysis_text,
            recommendation,
        })
    }

    /// One task per window; failures are logged and excluded. Records are
    /// merged in window order regardless of completion order.
    async fn gather(&self, subject: &str, windows: &[TimeWindow]) -> EngagementSummary {
        let mut tasks = JoinSet::new();
        for window in windows.iter().copied() {
            let source = Arc::clone(&self.source);
            let subject = subject.to_string();
            let span = tracing::info_span!("window", window = window.index);
            tasks.spawn(
                async move {
                    let result = source.fetch_window(&subject, &window).await;
                    (window, result)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<Vec<EngagementRecord>>> = vec![None; windows.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((window, Ok(records))) => {
                    if let Some(slot) = slots.get_mut(window.index) {
                        *slot = Some(records);
                    }
                }
                Ok((window, Err(e))) => {
                    counter!("hypecast_engagement_windows_failed_total").increment(1);
                    warn!(window = window.index, range = %window, error = %e, "Engagement window failed");
                }
                Err(e) => {
                    counter!("hypecast_engagement_windows_failed_total").increment(1);
                    warn!(error = %e, "Engagement window task aborted");
                }
            }
        }

        let windows_failed = slots.iter().filter(|s| s.is_none()).count();
        let merged: Vec<EngagementRecord> = slots
            .into_iter()
            .flatten()
            .flatten()
            .enumerate()
            .map(|(i, mut record)| {
                record.discovery_index = i;
                record
            })
            .collect();

        info!(
            subject,
            windows = windows.len(),
            windows_failed,
            posts = merged.len(),
            "Engagement windows joined"
        );

        EngagementRanker::new(self.config.top_k)
            .with_key(self.config.rank_key)
            .summarize(merged, windows.len(), windows_failed)
    }
}

fn analysis_prompt(request: &AnalysisRequest, engagement: &EngagementSummary) -> String {
    let image_note = if request.image_url.is_some() {
        "\nThe token's logo is attached; check that it fits the pitch."
    } else {
        ""
    };
    format!(
        "Token: {}\n\nPitch:\n{}\n\nSocial engagement:\n{}{}\n\nShould someone invest?",
        request.subject.trim(),
        request.pitch.trim(),
        engagement.summary_text,
        image_note
    )
}
