//! Remote rendering jobs and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque job token assigned by a rendering backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from a backend-issued token.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which backend a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Text-to-speech synthesis
    Speech,
    /// Lip-sync video generation
    LipSync,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Speech => "speech",
            JobKind::LipSync => "lipsync",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized job state.
///
/// `Submitted → {Pending, Running}* → {Succeeded, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Creation request accepted, no status observed yet
    #[default]
    Submitted,
    /// Queued on the backend
    Pending,
    /// Backend is rendering
    Running,
    /// Result is ready for download
    Succeeded,
    /// Backend gave up on the job
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Backends may bounce between pending and running (e.g. a failed attempt
    /// that gets re-queued), so both directions are allowed there.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (s, n) if s.is_terminal() => *s == n,
            (_, JobState::Submitted) => *self == JobState::Submitted,
            _ => true,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub job_id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// Reference to a submitted job, returned by `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub kind: JobKind,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            submitted_at: Utc::now(),
        }
    }
}

/// A tracked remote job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    /// Short human-readable description of what was submitted
    pub input: String,
    pub state: JobState,
    /// Backend failure reason, set when the job fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Number of status observations so far
    #[serde(default)]
    pub polls: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Start tracking a freshly submitted job.
    pub fn new(handle: &JobHandle, input: impl Into<String>) -> Self {
        Self {
            id: handle.id.clone(),
            kind: handle.kind,
            input: input.into(),
            state: JobState::Submitted,
            failure_reason: None,
            polls: 0,
            submitted_at: handle.submitted_at,
            updated_at: handle.submitted_at,
        }
    }

    /// Record a status observation.
    ///
    /// Returns `Ok(true)` when the state changed.
    pub fn observe(&mut self, next: JobState) -> Result<bool, JobTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(JobTransitionError {
                job_id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.polls += 1;
        self.updated_at = Utc::now();
        let changed = self.state != next;
        self.state = next;
        Ok(changed)
    }

    /// Record a terminal failure with the backend's reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), JobTransitionError> {
        self.observe(JobState::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
