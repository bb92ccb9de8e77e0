//! Sequential per-segment rendering folded into one composite.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hypecast_media::{remove_dir_best_effort, remove_files_best_effort, AudioExporter};
use hypecast_models::{ArtifactKind, Segment};
use hypecast_render_client::{Deadline, JobClient};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};

/// Renders segments one at a time and exports the ordered composite.
///
/// Each invocation works in its own scratch directory under `scratch_root`.
/// Intermediate artifacts never outlive the call: they are removed once the
/// composite exists, or as soon as anything fails.
pub struct MediaAssembler {
    exporter: Arc<dyn AudioExporter>,
    scratch_root: PathBuf,
    pause: Duration,
}

impl MediaAssembler {
    pub fn new(exporter: Arc<dyn AudioExporter>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            exporter,
            scratch_root: scratch_root.into(),
            pause: Duration::from_millis(100),
        }
    }

    /// Silence inserted between consecutive artifacts.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Render every segment in order through `client` and write the
    /// composite to `output`.
    ///
    /// A segment is submitted only after the previous one has been fetched.
    /// On error, everything produced so far is deleted and the original
    /// error is returned. An `output` that existed before the call is left
    /// in place.
    pub async fn assemble<C, F>(
        &self,
        client: &C,
        segments: &[Segment],
        to_input: F,
        output: &Path,
        deadline: &Deadline,
    ) -> WorkerResult<PathBuf>
    where
        C: JobClient + ?Sized,
        F: Fn(&Segment) -> C::Input,
    {
        if segments.is_empty() {
            return Err(WorkerError::validation("no segments to assemble"));
        }

        let output_existed = tokio::fs::try_exists(output).await.unwrap_or(false);
        let scratch = self.scratch_root.join(format!("assemble-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch).await?;
        let extension = ArtifactKind::from(client.kind()).extension();

        let mut produced: Vec<PathBuf> = Vec::with_capacity(segments.len());
        let outcome = async {
            for segment in segments {
                let dest = scratch.join(format!("segment_{:03}.{}", segment.index, extension));
                produced.push(dest.clone());
                info!(
                    segment = segment.index,
                    total = segments.len(),
                    words = segment.word_count,
                    "Rendering segment"
                );
                client.render(&to_input(segment), &dest, deadline).await?;
            }
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.exporter.export(&produced, self.pause, output).await?;
            Ok::<(), WorkerError>(())
        }
        .await;

        let leftover = remove_files_best_effort(&produced).await;
        if outcome.is_err() && !output_existed {
            remove_files_best_effort(&[output]).await;
        }
        if !remove_dir_best_effort(&scratch).await || leftover > 0 {
            warn!(
                scratch = %scratch.display(),
                leftover,
                "Scratch cleanup incomplete"
            );
        }

        outcome?;
        info!(
            output = %output.display(),
            segments = segments.len(),
            "Composite assembled"
        );
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hypecast_media::{MediaError, MediaResult};
    use hypecast_models::{Artifact, JobHandle, JobId, JobKind, JobState};
    use hypecast_render_client::{JobStatus, RenderError, RenderResult, ResultLocation};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Completes every job immediately; fails the submit numbered `fail_at`.
    struct FakeClient {
        submits: AtomicUsize,
        fail_at: Option<usize>,
        order: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                submits: AtomicUsize::new(0),
                fail_at,
                order: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobClient for FakeClient {
        type Input = String;

        fn kind(&self) -> JobKind {
            JobKind::Speech
        }

        fn poll_interval(&self) -> Duration {
            Duration::ZERO
        }

        fn describe(&self, input: &String) -> String {
            input.clone()
        }

        async fn submit(&self, input: &String) -> RenderResult<JobHandle> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            if Some(n) == self.fail_at {
                return Err(RenderError::protocol("backend said no"));
            }
            self.order.lock().unwrap().push(format!("submit:{input}"));
            Ok(JobHandle::new(JobId::from_string(format!("job{n}")), JobKind::Speech))
        }

        async fn poll(&self, _handle: &JobHandle) -> RenderResult<JobStatus> {
            Ok(JobStatus::new(JobState::Succeeded, "complete_success")
                .with_location(ResultLocation::new("https://cdn.example.com/x.wav")))
        }

        async fn fetch(
            &self,
            handle: &JobHandle,
            location: &ResultLocation,
            dest: &Path,
        ) -> RenderResult<Artifact> {
            tokio::fs::write(dest, handle.id.as_str()).await?;
            self.order.lock().unwrap().push(format!("fetch:{}", handle.id));
            Ok(Artifact {
                job_id: handle.id.clone(),
                kind: ArtifactKind::Audio,
                path: dest.to_path_buf(),
                source_url: location.url.clone(),
                size_bytes: 4,
            })
        }
    }

    /// Concatenates inputs with a marker per pause.
    struct ConcatExporter {
        fail: bool,
    }

    #[async_trait]
    impl AudioExporter for ConcatExporter {
        async fn export(&self, inputs: &[PathBuf], pause: Duration, output: &Path) -> MediaResult<()> {
            if self.fail {
                tokio::fs::write(output, b"partial").await?;
                return Err(MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
            }
            let mut parts = Vec::new();
            for input in inputs {
                parts.push(tokio::fs::read_to_string(input).await?);
            }
            let joined = parts.join(&format!("|{}ms|", pause.as_millis()));
            tokio::fs::write(output, joined).await?;
            Ok(())
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n).map(|i| Segment::new(i, format!("Sentence {i}."))).collect()
    }

    fn files_under(dir: &Path) -> usize {
        let mut count = 0;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    count += 1;
                }
            }
        }
        count
    }

    #[tokio::test]
    async fn test_success_leaves_only_composite() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("final.wav");
        let assembler = MediaAssembler::new(Arc::new(ConcatExporter { fail: false }), scratch.path());
        let client = FakeClient::new(None);

        let path = assembler
            .assemble(&client, &segments(3), |s| s.text.clone(), &output, &Deadline::unbounded())
            .await
            .unwrap();

        assert_eq!(path, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "job0|100ms|job1|100ms|job2");
        assert_eq!(files_under(scratch.path()), 0);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        let order = client.order.lock().unwrap().clone();
        assert_eq!(
            order,
            vec![
                "submit:Sentence 0.",
                "fetch:job0",
                "submit:Sentence 1.",
                "fetch:job1",
                "submit:Sentence 2.",
                "fetch:job2"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_after_two_of_five_leaves_nothing() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("final.wav");
        let assembler = MediaAssembler::new(Arc::new(ConcatExporter { fail: false }), scratch.path());
        let client = FakeClient::new(Some(2));

        let err = assembler
            .assemble(&client, &segments(5), |s| s.text.clone(), &output, &Deadline::unbounded())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Render(RenderError::Protocol(_))));
        assert_eq!(client.submits.load(Ordering::SeqCst), 3);
        assert_eq!(files_under(scratch.path()), 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_failure_keeps_existing_output() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("final.wav");
        std::fs::write(&output, "earlier take").unwrap();
        let assembler = MediaAssembler::new(Arc::new(ConcatExporter { fail: false }), scratch.path());

        let err = assembler
            .assemble(&FakeClient::new(Some(1)), &segments(3), |s| s.text.clone(), &output, &Deadline::unbounded())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Render(_)));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "earlier take");
        assert_eq!(files_under(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_export_failure_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("final.wav");
        let assembler = MediaAssembler::new(Arc::new(ConcatExporter { fail: true }), scratch.path());

        let err = assembler
            .assemble(&FakeClient::new(None), &segments(2), |s| s.text.clone(), &output, &Deadline::unbounded())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Media(MediaError::FfmpegFailed { .. })));
        assert_eq!(files_under(scratch.path()), 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_empty_segments_rejected() {
        let scratch = TempDir::new().unwrap();
        let assembler = MediaAssembler::new(Arc::new(ConcatExporter { fail: false }), scratch.path());

        let err = assembler
            .assemble(
                &FakeClient::new(None),
                &[],
                |s| s.text.clone(),
                &scratch.path().join("out.wav"),
                &Deadline::unbounded(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
    }
}
