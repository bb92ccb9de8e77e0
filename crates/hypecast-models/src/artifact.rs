//! Downloaded results of completed jobs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{JobId, JobKind};

/// Payload type of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Audio,
    Video,
}

impl ArtifactKind {
    /// File extension used when the artifact is written to disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Audio => "wav",
            ArtifactKind::Video => "mp4",
        }
    }
}

impl From<JobKind> for ArtifactKind {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Speech => ArtifactKind::Audio,
            JobKind::LipSync => ArtifactKind::Video,
        }
    }
}

/// A file on disk bound to exactly one completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub job_id: JobId,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// URL the payload was actually downloaded from
    pub source_url: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_job_kind() {
        assert_eq!(ArtifactKind::from(JobKind::Speech), ArtifactKind::Audio);
        assert_eq!(ArtifactKind::from(JobKind::LipSync).extension(), "mp4");
    }
}
