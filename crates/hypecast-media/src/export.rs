//! Ordered audio concatenation into one composite file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Sample rate every input is normalized to before concatenation.
const SAMPLE_RATE: u32 = 44_100;

/// Capability that turns ordered audio files into one composite.
#[async_trait]
pub trait AudioExporter: Send + Sync {
    /// Concatenate `inputs` in order, inserting `pause` of silence between
    /// consecutive inputs, and write the result to `output`.
    async fn export(&self, inputs: &[PathBuf], pause: Duration, output: &Path) -> MediaResult<()>;
}

/// Build the `-filter_complex` graph for `count` inputs.
///
/// Every input is resampled to a common format; all but the last get
/// `pause` of trailing silence.
pub fn concat_filter(count: usize, pause: Duration) -> String {
    let pad_secs = pause.as_secs_f64();
    let mut graph = String::new();

    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:a]aformat=sample_rates={SAMPLE_RATE}:channel_layouts=mono"
        ));
        if i + 1 < count && pad_secs > 0.0 {
            graph.push_str(&format!(",apad=pad_dur={pad_secs:.3}"));
        }
        graph.push_str(&format!("[a{i}];"));
    }

    for i in 0..count {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={count}:v=0:a=1[out]"));
    graph
}

/// [`AudioExporter`] backed by the FFmpeg CLI.
#[derive(Debug, Default)]
pub struct FfmpegAudioExporter {
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegAudioExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }
}

/// Build the export command after validating inputs.
pub(crate) fn build_concat_command(
    inputs: &[PathBuf],
    pause: Duration,
    output: &Path,
) -> MediaResult<FfmpegCommand> {
    if inputs.is_empty() {
        return Err(MediaError::validation("no audio inputs to concatenate"));
    }
    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(MediaError::FileNotFound(missing.clone()));
    }

    Ok(FfmpegCommand::new(output)
        .inputs(inputs)
        .filter_complex(concat_filter(inputs.len(), pause))
        .map("[out]")
        .audio_codec("pcm_s16le"))
}

#[async_trait]
impl AudioExporter for FfmpegAudioExporter {
    async fn export(&self, inputs: &[PathBuf], pause: Duration, output: &Path) -> MediaResult<()> {
        let cmd = build_concat_command(inputs, pause, output)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            inputs = inputs.len(),
            pause_ms = pause.as_millis() as u64,
            output = %output.display(),
            "Exporting composite audio"
        );
        self.runner().run(&cmd).await
    }
}
