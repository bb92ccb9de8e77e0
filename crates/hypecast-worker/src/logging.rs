//! Structured logging for pipeline stages.
//!
//! Every stage of one invocation logs with the same `request_key` and
//! `stage` fields so a single request can be followed through the output.

use tracing::{error, info, warn, Span};

/// Logger bound to one request and one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageLogger {
    request_key: String,
    stage: String,
}

impl StageLogger {
    /// Create a logger for `stage` (e.g. "aggregate", "narrate") of a request.
    pub fn new(request_key: &str, stage: &str) -> Self {
        Self {
            request_key: request_key.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_key = %self.request_key,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            request_key = %self.request_key,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_key = %self.request_key,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            request_key = %self.request_key,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_key = %self.request_key,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn request_key(&self) -> &str {
        &self.request_key
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span carrying the request and stage, for instrumenting futures.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "stage",
            request_key = %self.request_key,
            stage = %self.stage
        )
    }
}
