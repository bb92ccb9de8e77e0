//! Worker error types.

use hypecast_media::MediaError;
use hypecast_models::{PersonaError, RequestError};
use hypecast_render_client::RenderError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Missing dependency: {0}")]
    Dependency(String),

    #[error("Engagement fetch failed: {0}")]
    EngagementFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    pub fn engagement_failed(msg: impl Into<String>) -> Self {
        Self::EngagementFailed(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    /// Transient upstream failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Render(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<RequestError> for WorkerError {
    fn from(err: RequestError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PersonaError> for WorkerError {
    fn from(err: PersonaError) -> Self {
        Self::Dependency(err.to_string())
    }
}
