//! Text segmentation and media export for narration rendering.
//!
//! This crate provides:
//! - English sentence splitting and word-budget segment packing
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Ordered audio concatenation with inter-clip pauses
//! - Best-effort cleanup and atomic file helpers

pub mod command;
pub mod error;
pub mod export;
pub mod fs_utils;
pub mod segmenter;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use export::{concat_filter, AudioExporter, FfmpegAudioExporter};
pub use fs_utils::{remove_dir_best_effort, remove_files_best_effort, write_atomic};
pub use segmenter::{split_sentences, SentenceParser, TextSegmenter, DEFAULT_MAX_WORDS};
