//! Clients for remote rendering backends.
//!
//! Every backend follows the same submit → poll → fetch contract
//! ([`JobClient`]). Calls to one backend are paced by a per-instance
//! [`RateLimiter`], and waiting on a job always requires a caller-supplied
//! [`Deadline`].

pub mod client;
pub mod error;
pub mod lipsync;
pub mod rate_limit;
pub mod speech;
pub mod types;

mod download;

pub use client::{Deadline, JobClient};
pub use error::{RenderError, RenderResult};
pub use lipsync::{LipSyncClient, LipSyncClientConfig, LipSyncInput};
pub use rate_limit::RateLimiter;
pub use speech::{SpeechClient, SpeechClientConfig, SpeechInput, VoiceModel};
pub use types::{JobStatus, ResultLocation};
