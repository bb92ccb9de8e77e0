//! Analysis requests, joined results and the persisted summary document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::engagement::EngagementSummary;
use crate::persona::PersonaCommentary;
use crate::recommendation::Recommendation;

/// Malformed caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} is not a valid http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
}

/// Public media URLs for a lip-sync render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LipSyncRequest {
    pub video_url: String,
    pub audio_url: String,
}

/// One top-level analysis invocation.
///
/// Accepts the legacy `token_name`/`image` field names as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(alias = "token_name")]
    pub subject: String,
    pub pitch: String,
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Persona that narrates; first configured persona when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lipsync: Option<LipSyncRequest>,
}

impl AnalysisRequest {
    pub fn new(subject: impl Into<String>, pitch: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            pitch: pitch.into(),
            image_url: None,
            narrator: None,
            lipsync: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Logical key all sub-results are joined under.
    pub fn request_key(&self) -> String {
        self.subject.trim().to_string()
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.subject.trim().is_empty() {
            return Err(RequestError::Empty("subject"));
        }
        if self.pitch.trim().is_empty() {
            return Err(RequestError::Empty("pitch"));
        }
        if let Some(image) = &self.image_url {
            check_url("image_url", image)?;
        }
        if let Some(lipsync) = &self.lipsync {
            check_url("lipsync.video_url", &lipsync.video_url)?;
            check_url("lipsync.audio_url", &lipsync.audio_url)?;
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), RequestError> {
    let invalid = || RequestError::InvalidUrl {
        field,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Engagement and generative results joined under one request key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_key: String,
    pub engagement: EngagementSummary,
    pub analysis_text: String,
    pub recommendation: Recommendation,
}

/// The JSON document written once per successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub request_key: String,
    pub recommendation: Recommendation,
    pub analysis_text: String,
    pub engagement: EngagementSummary,
    pub commentary: Vec<PersonaCommentary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lipsync_path: Option<PathBuf>,
    pub generated_at: DateTime<Utc>,
}

impl SummaryDocument {
    pub fn new(result: AnalysisResult, commentary: Vec<PersonaCommentary>) -> Self {
        Self {
            request_key: result.request_key,
            recommendation: result.recommendation,
            analysis_text: result.analysis_text,
            engagement: result.engagement,
            commentary,
            narration_path: None,
            lipsync_path: None,
            generated_at: Utc::now(),
        }
    }
}
