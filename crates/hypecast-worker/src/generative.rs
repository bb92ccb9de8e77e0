//! Chat-completions client for the generative analysis model.
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint (xAI by
//! default). Configured models are tried in order until one answers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// One request to the generative model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Public image URL sent alongside the user message
    pub image_url: Option<String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }
}

/// Opaque text generation capability.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> WorkerResult<String>;
}

/// Generative API configuration.
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    pub api_url: String,
    pub api_key: String,
    /// Models tried in order
    pub models: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.x.ai/v1".to_string(),
            api_key: String::new(),
            models: vec!["grok-2-1212".to_string()],
            max_tokens: 400,
            temperature: 0.8,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerativeConfig {
    /// Create config from environment variables. `XAI_API_KEY` is required.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let api_key = std::env::var("XAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| WorkerError::dependency("XAI_API_KEY not set"))?;

        let models = std::env::var("XAI_MODELS")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or(defaults.models);

        Ok(Self {
            api_url: std::env::var("XAI_API_URL").unwrap_or(defaults.api_url),
            api_key,
            models,
            max_tokens: std::env::var("XAI_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("XAI_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            timeout: Duration::from_secs(
                std::env::var("XAI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(config: &'a GenerativeConfig, model: &'a str, prompt: &'a Prompt) -> ChatRequest<'a> {
    let user = match &prompt.image_url {
        Some(url) => MessageContent::Parts(vec![
            ContentPart::Text { text: &prompt.user },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
        ]),
        None => MessageContent::Text(&prompt.user),
    };

    ChatRequest {
        model,
        messages: vec![
            Message {
                role: "system",
                content: MessageContent::Text(&prompt.system),
            },
            Message {
                role: "user",
                content: user,
            },
        ],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// xAI chat-completions client.
pub struct XaiClient {
    http: Client,
    config: GenerativeConfig,
}

impl XaiClient {
    pub fn new(config: GenerativeConfig) -> WorkerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(WorkerError::dependency("generative API key is empty"));
        }
        if config.models.is_empty() {
            return Err(WorkerError::dependency("no generative models configured"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::dependency(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> WorkerResult<Self> {
        Self::new(GenerativeConfig::from_env()?)
    }

    async fn call_model(&self, model: &str, prompt: &Prompt) -> WorkerResult<String> {
        let url = format!("{}/chat/completions", self.config.api_url);
        let request = build_request(&self.config, model, prompt);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::analysis_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::analysis_failed(format!(
                "model {} returned {}: {}",
                model, status, error_text
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            WorkerError::analysis_failed(format!("failed to parse completion: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| WorkerError::analysis_failed(format!("model {} returned no content", model)))
    }
}

#[async_trait]
impl GenerativeModel for XaiClient {
    async fn complete(&self, prompt: &Prompt) -> WorkerResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            info!(model = %model, "Requesting completion");
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, error = %e, "Completion failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WorkerError::analysis_failed("all models failed")))
    }
}
