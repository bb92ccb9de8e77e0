//! Analysis and narration pipeline.
//!
//! This crate provides:
//! - Concurrent engagement retrieval joined into a generative analysis
//! - Deterministic engagement ranking and per-day stats
//! - Persona commentary with template fallback
//! - Sequential segment rendering folded into one composite
//! - The top-level orchestrator that persists the summary document

pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod engagement;
pub mod error;
pub mod generative;
pub mod logging;
pub mod orchestrator;
pub mod persona;
pub mod retry;

pub use aggregator::{AggregatorConfig, AnalysisAggregator};
pub use assembler::MediaAssembler;
pub use config::WorkerConfig;
pub use engagement::{
    EngagementRanker, EngagementSource, EngagementSourceConfig, RapidApiSource, TimeWindow,
};
pub use error::{WorkerError, WorkerResult};
pub use generative::{GenerativeConfig, GenerativeModel, Prompt, XaiClient};
pub use logging::StageLogger;
pub use orchestrator::Orchestrator;
pub use persona::{load_catalog, strip_emoji, CommentaryWriter};
pub use retry::{retry_async, RetryConfig};
