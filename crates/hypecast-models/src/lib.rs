//! Shared data models for the hypecast workspace.
//!
//! This crate provides Serde-serializable types for:
//! - Remote rendering jobs and their state machine
//! - Text segments and downloaded artifacts
//! - Engagement records, daily stats and summaries
//! - Analysis requests, results and the persisted summary document
//! - Persona configuration and the recommendation classifier

pub mod analysis;
pub mod artifact;
pub mod engagement;
pub mod job;
pub mod persona;
pub mod recommendation;
pub mod segment;

// Re-export common types
pub use analysis::{
    AnalysisRequest, AnalysisResult, LipSyncRequest, RequestError, SummaryDocument,
};
pub use artifact::{Artifact, ArtifactKind};
pub use engagement::{
    DailyStats, EngagementMetrics, EngagementRecord, EngagementSummary, PostAuthor, RankKey,
};
pub use job::{Job, JobHandle, JobId, JobKind, JobState, JobTransitionError};
pub use persona::{PersonaCatalog, PersonaCommentary, PersonaError, PersonaProfile};
pub use recommendation::{classify, Recommendation, Sentiment};
pub use segment::{word_count, Segment};
