//! Render client error types.

use hypecast_models::{JobId, JobTransitionError};
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Backend returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Deadline exceeded while {0}")]
    Timeout(String),

    #[error("Cancelled while {0}")]
    Cancelled(String),

    #[error("Missing dependency: {0}")]
    Dependency(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn transport(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Transport {
            status: status.as_u16(),
            body: body.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn job_failed(job_id: &JobId, reason: impl Into<String>) -> Self {
        Self::JobFailed {
            job_id: job_id.clone(),
            reason: reason.into(),
        }
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    /// Transport-level failures: bad HTTP status or no response at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, RenderError::Transport { .. } | RenderError::Network(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RenderError::Transport { status, .. } => *status == 429 || *status >= 500,
            RenderError::Network(_) => true,
            _ => false,
        }
    }
}

impl From<JobTransitionError> for RenderError {
    fn from(err: JobTransitionError) -> Self {
        RenderError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err = RenderError::transport(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.is_retryable());
        assert!(err.is_transport());

        let err = RenderError::transport(reqwest::StatusCode::BAD_REQUEST, "bad token");
        assert!(!err.is_retryable());

        assert!(!RenderError::protocol("success=false").is_retryable());
        assert!(!RenderError::job_failed(&JobId::from_string("j"), "dead").is_retryable());
    }

    #[test]
    fn test_job_failed_message() {
        let err = RenderError::job_failed(&JobId::from_string("tok_9"), "complete_failure");
        assert_eq!(err.to_string(), "Job tok_9 failed: complete_failure");
    }
}
