//! The submit/poll/fetch contract shared by all rendering backends.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use hypecast_models::{Artifact, Job, JobHandle, JobKind, JobState};
use metrics::counter;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};
use crate::types::{JobStatus, ResultLocation};

/// Caller-supplied bound on how long a job may take.
///
/// There is no implicit default: callers pick an instant, a duration or
/// explicitly opt into [`Deadline::unbounded`]. An optional watch channel
/// cancels the wait when it flips to `true`.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Option<Instant>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            cancel_rx: None,
        }
    }

    pub fn after(duration: Duration) -> Self {
        Self::at(Instant::now() + duration)
    }

    /// Wait forever. Only use when an outer layer bounds the call.
    pub fn unbounded() -> Self {
        Self {
            at: None,
            cancel_rx: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `fut` unless the deadline passes or cancellation fires first.
    ///
    /// `activity` describes what was in flight, for the error message.
    pub async fn guard<T, F>(&self, activity: &str, fut: F) -> RenderResult<T>
    where
        F: Future<Output = RenderResult<T>>,
    {
        if self.is_cancelled() {
            return Err(RenderError::Cancelled(activity.to_string()));
        }
        if self.is_expired() {
            return Err(RenderError::Timeout(activity.to_string()));
        }

        let expiry = async {
            match self.at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let mut cancel_rx = self.cancel_rx.clone();
        let cancelled = async move {
            match cancel_rx.as_mut() {
                Some(rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // Sender dropped without cancelling
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = expiry => Err(RenderError::Timeout(activity.to_string())),
            _ = cancelled => Err(RenderError::Cancelled(activity.to_string())),
        }
    }

    /// Sleep for `interval`, cut short by expiry or cancellation.
    pub async fn sleep(&self, activity: &str, interval: Duration) -> RenderResult<()> {
        self.guard(activity, async {
            tokio::time::sleep(interval).await;
            Ok(())
        })
        .await
    }
}

/// A remote rendering backend.
///
/// Implementors provide `submit`, `poll` and `fetch`; the poll loop and the
/// full round trip come for free.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Backend-specific job input.
    type Input: Send + Sync;

    fn kind(&self) -> JobKind;

    /// Fixed sleep between polls of a non-terminal job.
    fn poll_interval(&self) -> Duration;

    /// Short description of an input, used in logs.
    fn describe(&self, input: &Self::Input) -> String;

    /// Create a job. Each call carries a fresh idempotency token.
    async fn submit(&self, input: &Self::Input) -> RenderResult<JobHandle>;

    /// Fetch the normalized status of a job.
    async fn poll(&self, handle: &JobHandle) -> RenderResult<JobStatus>;

    /// Download a finished job's payload to `dest`.
    async fn fetch(
        &self,
        handle: &JobHandle,
        location: &ResultLocation,
        dest: &Path,
    ) -> RenderResult<Artifact>;

    /// Start tracking a submitted job under the description of its input.
    fn track(&self, handle: &JobHandle, input: &Self::Input) -> Job {
        Job::new(handle, self.describe(input))
    }

    /// Poll until the job reaches a terminal state, recording every
    /// observation on `job`.
    ///
    /// `Succeeded` yields the result location; `Failed` becomes
    /// [`RenderError::JobFailed`] with the backend's reason.
    async fn wait_for_completion(
        &self,
        handle: &JobHandle,
        job: &mut Job,
        deadline: &Deadline,
    ) -> RenderResult<ResultLocation> {
        let kind = handle.kind.as_str();
        let activity = format!("waiting for {} job {}", kind, handle.id);

        loop {
            let status = deadline.guard(&activity, self.poll(handle)).await?;
            counter!("hypecast_job_polls_total", "kind" => kind).increment(1);

            if job.observe(status.state)? {
                info!(
                    job_id = %handle.id,
                    kind,
                    input = %job.input,
                    state = %status.state,
                    backend_status = %status.raw_status,
                    "Job state changed"
                );
            } else {
                debug!(
                    job_id = %handle.id,
                    kind,
                    state = %status.state,
                    polls = job.polls,
                    "Job still in progress"
                );
            }

            match status.state {
                JobState::Succeeded => {
                    return status.location.ok_or_else(|| {
                        RenderError::protocol(format!(
                            "job {} succeeded without a result location",
                            handle.id
                        ))
                    });
                }
                JobState::Failed => {
                    let reason = status
                        .failure_reason
                        .unwrap_or_else(|| status.raw_status.clone());
                    counter!("hypecast_jobs_failed_total", "kind" => kind).increment(1);
                    warn!(job_id = %handle.id, kind, input = %job.input, %reason, "Job failed");
                    job.failure_reason = Some(reason.clone());
                    return Err(RenderError::job_failed(&handle.id, reason));
                }
                _ => deadline.sleep(&activity, self.poll_interval()).await?,
            }
        }
    }

    /// Submit, wait for completion and download the result.
    async fn render(
        &self,
        input: &Self::Input,
        dest: &Path,
        deadline: &Deadline,
    ) -> RenderResult<Artifact> {
        let kind = self.kind();
        info!(kind = kind.as_str(), input = %self.describe(input), "Submitting job");

        let handle = deadline
            .guard(&format!("submitting {} job", kind), self.submit(input))
            .await?;
        counter!("hypecast_jobs_submitted_total", "kind" => kind.as_str()).increment(1);
        info!(job_id = %handle.id, kind = kind.as_str(), "Job submitted");

        let mut job = self.track(&handle, input);
        let location = self.wait_for_completion(&handle, &mut job, deadline).await?;

        let artifact = deadline
            .guard(
                &format!("downloading {} job {}", kind, handle.id),
                self.fetch(&handle, &location, dest),
            )
            .await?;
        info!(
            job_id = %handle.id,
            kind = kind.as_str(),
            path = %artifact.path.display(),
            bytes = artifact.size_bytes,
            "Job completed"
        );
        Ok(artifact)
    }
}
