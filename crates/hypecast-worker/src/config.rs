//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch space for per-invocation artifacts
    pub work_dir: PathBuf,
    /// Where composites and summary documents land
    pub output_dir: PathBuf,
    /// Number of historical engagement windows, most recent first
    pub windows: usize,
    /// Length of each window in days
    pub window_days: u32,
    /// Posts kept in the ranked summary
    pub top_k: usize,
    /// Word budget per narration segment
    pub segment_max_words: usize,
    /// Silence inserted between narration segments
    pub pause: Duration,
    /// Deadline for each remote render job
    pub job_deadline: Duration,
    /// Render narration audio for the lead persona
    pub narrate: bool,
    /// Persona catalog override; the bundled catalog is used otherwise
    pub personas_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("hypecast"),
            output_dir: PathBuf::from("output"),
            windows: 5,
            window_days: 1,
            top_k: 5,
            segment_max_words: 20,
            pause: Duration::from_millis(100),
            job_deadline: Duration::from_secs(600),
            narrate: true,
            personas_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("HYPECAST_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("HYPECAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            windows: env_or("HYPECAST_WINDOWS", defaults.windows).max(1),
            window_days: env_or("HYPECAST_WINDOW_DAYS", defaults.window_days).max(1),
            top_k: env_or("HYPECAST_TOP_K", defaults.top_k),
            segment_max_words: env_or("HYPECAST_SEGMENT_MAX_WORDS", defaults.segment_max_words)
                .max(1),
            pause: Duration::from_millis(env_or("HYPECAST_PAUSE_MS", 100)),
            job_deadline: Duration::from_secs(env_or("HYPECAST_JOB_DEADLINE_SECS", 600)),
            narrate: env_or("HYPECAST_NARRATE", defaults.narrate),
            personas_path: std::env::var("HYPECAST_PERSONAS_PATH").ok().map(PathBuf::from),
        }
    }
}
