//! Text-to-speech backend (FakeYou-style job API).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hypecast_models::{Artifact, JobHandle, JobId, JobKind, JobState};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::JobClient;
use crate::download::download_artifact;
use crate::error::{RenderError, RenderResult};
use crate::rate_limit::RateLimiter;
use crate::types::{JobStatus, ResultLocation};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for the speech client.
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    /// Job API base URL
    pub api_url: String,
    /// Primary base URL for finished audio
    pub cdn_url: String,
    /// Alternate base URL tried on 403
    pub alt_url: String,
    /// Minimum spacing between any two calls
    pub min_interval: Duration,
    pub poll_interval: Duration,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.fakeyou.com".to_string(),
            cdn_url: "https://cdn-2.fakeyou.com".to_string(),
            alt_url: "https://fakeyou.com".to_string(),
            min_interval: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(2000),
            timeout: Duration::from_secs(60),
        }
    }
}

impl SpeechClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("SPEECH_API_URL").unwrap_or(defaults.api_url),
            cdn_url: std::env::var("SPEECH_CDN_URL").unwrap_or(defaults.cdn_url),
            alt_url: std::env::var("SPEECH_ALT_URL").unwrap_or(defaults.alt_url),
            min_interval: Duration::from_millis(
                std::env::var("SPEECH_MIN_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("SPEECH_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            timeout: Duration::from_secs(
                std::env::var("SPEECH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Input for one synthesis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechInput {
    /// Voice model token from the catalog
    pub voice_token: String,
    pub text: String,
}

impl SpeechInput {
    pub fn new(voice_token: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            voice_token: voice_token.into(),
            text: text.into(),
        }
    }
}

/// A voice model from the backend catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceModel {
    pub model_token: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    uuid_idempotency_token: String,
    tts_model_token: &'a str,
    inference_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    success: bool,
    inference_job_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    success: bool,
    state: Option<JobStateBody>,
}

#[derive(Debug, Deserialize)]
struct JobStateBody {
    status: String,
    maybe_public_bucket_wav_audio_path: Option<String>,
    maybe_failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceListResponse {
    success: bool,
    #[serde(default)]
    models: Vec<VoiceModel>,
}

/// Map a backend status string onto the normalized state machine.
fn normalize_status(status: &str) -> JobState {
    match status {
        "pending" | "attempt_failed" => JobState::Pending,
        "started" => JobState::Running,
        "complete_success" => JobState::Succeeded,
        "complete_failure" | "dead" => JobState::Failed,
        other => {
            warn!(status = other, "Unknown speech job status, treating as pending");
            JobState::Pending
        }
    }
}

/// Client for the speech synthesis backend.
pub struct SpeechClient {
    http: Client,
    config: SpeechClientConfig,
    limiter: RateLimiter,
    download_headers: HeaderMap,
}

impl SpeechClient {
    /// Create a new speech client with its own rate limiter.
    pub fn new(config: SpeechClientConfig) -> RenderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RenderError::Network)?;

        let mut download_headers = HeaderMap::new();
        download_headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        download_headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        Ok(Self {
            http,
            limiter: RateLimiter::new(config.min_interval),
            config,
            download_headers,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(SpeechClientConfig::from_env())
    }

    pub fn config(&self) -> &SpeechClientConfig {
        &self.config
    }

    /// List every voice model in the catalog.
    pub async fn list_voices(&self) -> RenderResult<Vec<VoiceModel>> {
        let url = format!("{}/tts/list", self.config.api_url);
        self.limiter.wait().await;
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::transport(status, body));
        }

        let list: VoiceListResponse = response
            .json()
            .await
            .map_err(|e| RenderError::protocol(format!("invalid voice list: {}", e)))?;
        if !list.success {
            return Err(RenderError::protocol("voice list returned success=false"));
        }
        Ok(list.models)
    }

    /// Find a voice whose title contains `query` (case-insensitive).
    ///
    /// When several match, the most recently updated one wins.
    pub async fn search_voice(&self, query: &str) -> RenderResult<Option<VoiceModel>> {
        let voices = self.list_voices().await?;
        let found = best_voice_match(voices, query);
        match &found {
            Some(voice) => info!(query, title = %voice.title, token = %voice.model_token, "Found voice"),
            None => warn!(query, "No voice matched"),
        }
        Ok(found)
    }

    fn location_for(&self, audio_path: &str) -> ResultLocation {
        ResultLocation::new(format!("{}{}", self.config.cdn_url, audio_path))
            .with_alternate(format!("{}{}", self.config.alt_url, audio_path))
    }
}

fn best_voice_match(voices: Vec<VoiceModel>, query: &str) -> Option<VoiceModel> {
    let query = query.to_lowercase();
    voices
        .into_iter()
        .filter(|v| v.title.to_lowercase().contains(&query))
        .max_by_key(|v| v.updated_at)
}

#[async_trait]
impl JobClient for SpeechClient {
    type Input = SpeechInput;

    fn kind(&self) -> JobKind {
        JobKind::Speech
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    fn describe(&self, input: &SpeechInput) -> String {
        format!("{} words with voice {}", hypecast_models::word_count(&input.text), input.voice_token)
    }

    async fn submit(&self, input: &SpeechInput) -> RenderResult<JobHandle> {
        let url = format!("{}/tts/inference", self.config.api_url);
        let request = InferenceRequest {
            uuid_idempotency_token: Uuid::new_v4().to_string(),
            tts_model_token: &input.voice_token,
            inference_text: &input.text,
        };

        self.limiter.wait().await;
        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::transport(status, body));
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| RenderError::protocol(format!("invalid inference response: {}", e)))?;
        if !body.success {
            return Err(RenderError::protocol("inference request returned success=false"));
        }
        let token = body
            .inference_job_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RenderError::protocol("inference response missing job token"))?;

        debug!(job_id = %token, idempotency_token = %request.uuid_idempotency_token, "Speech job accepted");
        Ok(JobHandle::new(JobId::from_string(token), JobKind::Speech))
    }

    async fn poll(&self, handle: &JobHandle) -> RenderResult<JobStatus> {
        let url = format!("{}/tts/job/{}", self.config.api_url, handle.id);

        self.limiter.wait().await;
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::transport(status, body));
        }

        let body: JobStatusResponse = response
            .json()
            .await
            .map_err(|e| RenderError::protocol(format!("invalid job status: {}", e)))?;
        if !body.success {
            return Err(RenderError::protocol("job status returned success=false"));
        }
        let state = body
            .state
            .ok_or_else(|| RenderError::protocol("job status missing state"))?;

        let normalized = normalize_status(&state.status);
        let mut status = JobStatus::new(normalized, state.status);
        match normalized {
            JobState::Succeeded => {
                if let Some(path) = state.maybe_public_bucket_wav_audio_path {
                    status = status.with_location(self.location_for(&path));
                }
            }
            JobState::Failed => {
                status = status.with_failure(state.maybe_failure_reason);
            }
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
