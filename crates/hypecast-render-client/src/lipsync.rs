//! Lip-sync video backend (Sync-style generate API).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use hypecast_models::{Artifact, JobHandle, JobId, JobKind, JobState};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::JobClient;
use crate::download::download_artifact;
use crate::error::{RenderError, RenderResult};
use crate::rate_limit::RateLimiter;
use crate::types::{JobStatus, ResultLocation};

/// Configuration for the lip-sync client.
#[derive(Debug, Clone)]
pub struct LipSyncClientConfig {
    pub api_url: String,
    /// Sent as `x-api-key`
    pub api_key: String,
    pub model: String,
    pub min_interval: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Output container requested from the backend
    pub output_format: String,
    /// How a shorter video is stretched to the audio length
    pub sync_mode: String,
}

impl Default for LipSyncClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sync.so".to_string(),
            api_key: String::new(),
            model: "lipsync-1.7.1".to_string(),
            min_interval: Duration::from_millis(1000),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
            output_format: "mp4".to_string(),
            sync_mode: "loop".to_string(),
        }
    }
}

impl LipSyncClientConfig {
    /// Create config from environment variables.
    ///
    /// `SYNC_API_KEY` is required.
    pub fn from_env() -> RenderResult<Self> {
        let defaults = Self::default();
        let api_key = std::env::var("SYNC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RenderError::dependency("SYNC_API_KEY is not set"))?;

        Ok(Self {
            api_url: std::env::var("LIPSYNC_API_URL").unwrap_or(defaults.api_url),
            api_key,
            model: std::env::var("LIPSYNC_MODEL").unwrap_or(defaults.model),
            min_interval: Duration::from_millis(
                std::env::var("LIPSYNC_MIN_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("LIPSYNC_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
            timeout: Duration::from_secs(
                std::env::var("LIPSYNC_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            output_format: defaults.output_format,
            sync_mode: std::env::var("LIPSYNC_SYNC_MODE").unwrap_or(defaults.sync_mode),
        })
    }
}

/// Public media URLs for one lip-sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipSyncInput {
    pub video_url: String,
    pub audio_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    input: [MediaInput<'a>; 2],
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct MediaInput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    output_format: &'a str,
    sync_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationStatus {
    status: Option<String>,
    output_url: Option<String>,
    error: Option<String>,
}

fn normalize_status(status: &str) -> JobState {
    match status {
        "PENDING" => JobState::Pending,
        "PROCESSING" => JobState::Running,
        "COMPLETED" => JobState::Succeeded,
        "FAILED" | "REJECTED" | "CANCELED" => JobState::Failed,
        other => {
            warn!(status = other, "Unknown lip-sync status, treating as pending");
            JobState::Pending
        }
    }
}

/// Client for the lip-sync backend.
pub struct LipSyncClient {
    http: Client,
    config: LipSyncClientConfig,
    limiter: RateLimiter,
    download_headers: HeaderMap,
}

impl LipSyncClient {
    pub fn new(config: LipSyncClientConfig) -> RenderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RenderError::dependency("lip-sync API key is empty"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RenderError::Network)?;

        Ok(Self {
            http,
            limiter: RateLimiter::new(config.min_interval),
            config,
            download_headers: HeaderMap::new(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(LipSyncClientConfig::from_env()?)
    }

    async fn check_status(response: reqwest::Response) -> RenderResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RenderError::transport(status, body))
    }
}

#[async_trait]
impl JobClient for LipSyncClient {
    type Input = LipSyncInput;

    fn kind(&self) -> JobKind {
        JobKind::LipSync
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    fn describe(&self, input: &LipSyncInput) -> String {
        format!("video {} + audio {}", input.video_url, input.audio_url)
    }

    async fn submit(&self, input: &LipSyncInput) -> RenderResult<JobHandle> {
        let url = format!("{}/v2/generate", self.config.api_url);
        let request = GenerateRequest {
            model: &self.config.model,
            input: [
                MediaInput {
                    kind: "video",
                    url: &input.video_url,
                },
                MediaInput {
                    kind: "audio",
                    url: &input.audio_url,
                },
            ],
            options: GenerateOptions {
                output_format: &self.config.output_format,
                sync_mode: &self.config.sync_mode,
            },
        };
        let idempotency_token = Uuid::new_v4().to_string();

        self.limiter.wait().await;
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("Idempotency-Key", &idempotency_token)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RenderError::protocol(format!("invalid generate response: {}", e)))?;
        let id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RenderError::protocol("generate response missing id"))?;

        debug!(job_id = %id, %idempotency_token, "Lip-sync job accepted");
        Ok(JobHandle::new(JobId::from_string(id), JobKind::LipSync))
    }

    async fn poll(&self, handle: &JobHandle) -> RenderResult<JobStatus> {
        let url = format!("{}/v2/generate/{}", self.config.api_url, handle.id);

        self.limiter.wait().await;
        let response = self
            .http
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: GenerationStatus = response
            .json()
            .await
            .map_err(|e| RenderError::protocol(format!("invalid generation status: {}", e)))?;
        let raw = body
            .status
            .ok_or_else(|| RenderError::protocol("generation status missing status"))?;

        let normalized = normalize_status(&raw);
        let mut status = JobStatus::new(normalized, raw);
        match normalized {
            JobState::Succeeded => {
                if let Some(output_url) = body.output_url {
                    status = status.with_location(ResultLocation::new(output_url));
                }
            }
            JobState::Failed => status = status.with_failure(body.error),
            _ => {}
        }
        Ok(status)
    }

    async fn fetch(
        &self,
        handle: &JobHandle,
        location: &ResultLocation,
        dest: &Path,
    ) -> RenderResult<Artifact> {
        download_artifact(
            &self.http,
            &self.limiter,
            &self.download_headers,
            handle,
            location,
            dest,
        )
        .await
    }
}
