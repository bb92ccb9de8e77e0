//! Backend-neutral job status types.

use hypecast_models::JobState;
use serde::{Deserialize, Serialize};

/// Where a finished job's payload can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocation {
    pub url: String,
    /// Tried once when the primary URL answers 403
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_url: Option<String>,
}

impl ResultLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alternate_url: None,
        }
    }

    pub fn with_alternate(mut self, url: impl Into<String>) -> Self {
        self.alternate_url = Some(url.into());
        self
    }
}

/// Normalized status returned by `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    /// Set once the job has succeeded
    pub location: Option<ResultLocation>,
    /// Backend's failure reason, when it reports one
    pub failure_reason: Option<String>,
    /// Raw backend status string, kept for logging
    pub raw_status: String,
}

impl JobStatus {
    pub fn new(state: JobState, raw_status: impl Into<String>) -> Self {
        Self {
            state,
            location: None,
            failure_reason: None,
            raw_status: raw_status.into(),
        }
    }

    pub fn with_location(mut self, location: ResultLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_failure(mut self, reason: Option<String>) -> Self {
        self.failure_reason = reason;
        self
    }
}
