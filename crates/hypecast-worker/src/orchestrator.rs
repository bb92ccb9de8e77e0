//! Top-level pipeline: analysis, commentary, narration, lip-sync, summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use hypecast_media::{
    remove_files_best_effort, write_atomic, AudioExporter, FfmpegAudioExporter, TextSegmenter,
};
use hypecast_models::{
    AnalysisRequest, PersonaCatalog, PersonaProfile, Sentiment, SummaryDocument,
};
use hypecast_render_client::{
    Deadline, JobClient, LipSyncClient, LipSyncInput, SpeechClient, SpeechInput, VoiceModel,
};
use tokio::sync::watch;
use tracing::{debug, info, Instrument};

use crate::aggregator::{AggregatorConfig, AnalysisAggregator};
use crate::assembler::MediaAssembler;
use crate::config::WorkerConfig;
use crate::engagement::{EngagementSource, RapidApiSource};
use crate::error::{WorkerError, WorkerResult};
use crate::generative::{GenerativeModel, XaiClient};
use crate::logging::StageLogger;
use crate::persona::{load_catalog, CommentaryWriter};

/// Runs one analysis request end to end.
pub struct Orchestrator {
    config: WorkerConfig,
    catalog: PersonaCatalog,
    aggregator: AnalysisAggregator,
    commentary: CommentaryWriter,
    assembler: MediaAssembler,
    segmenter: TextSegmenter,
    speech: Option<SpeechClient>,
    lipsync: Option<LipSyncClient>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        catalog: PersonaCatalog,
        source: Arc<dyn EngagementSource>,
        model: Arc<dyn GenerativeModel>,
        exporter: Arc<dyn AudioExporter>,
    ) -> Self {
        let aggregator = AnalysisAggregator::new(
            source,
            Arc::clone(&model),
            AggregatorConfig {
                windows: config.windows,
                window_days: config.window_days,
                top_k: config.top_k,
                ..Default::default()
            },
        );
        let assembler = MediaAssembler::new(exporter, config.work_dir.clone()).with_pause(config.pause);

        Self {
            segmenter: TextSegmenter::new(config.segment_max_words),
            commentary: CommentaryWriter::new(model),
            aggregator,
            assembler,
            catalog,
            config,
            speech: None,
            lipsync: None,
            cancel_rx: None,
        }
    }

    /// Wire every backend from environment variables.
    ///
    /// The speech client is only required when narration is enabled; the
    /// lip-sync client is built when `SYNC_API_KEY` is present.
    pub async fn from_env(config: WorkerConfig, cancel_rx: watch::Receiver<bool>) -> WorkerResult<Self> {
        let catalog = load_catalog(config.personas_path.as_deref()).await?;
        let source: Arc<dyn EngagementSource> = Arc::new(RapidApiSource::from_env()?);
        let model: Arc<dyn GenerativeModel> = Arc::new(XaiClient::from_env()?);
        let exporter: Arc<dyn AudioExporter> = Arc::new(
            FfmpegAudioExporter::new()
                .with_timeout(config.job_deadline.as_secs())
                .with_cancel(cancel_rx.clone()),
        );

        let speech = if config.narrate {
            Some(SpeechClient::from_env()?)
        } else {
            None
        };
        let lipsync = match std::env::var("SYNC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Some(LipSyncClient::from_env()?),
            _ => {
                debug!("SYNC_API_KEY not set; lip-sync disabled");
                None
            }
        };

        let mut orchestrator = Self::new(config, catalog, source, model, exporter).with_cancel(cancel_rx);
        orchestrator.speech = speech;
        orchestrator.lipsync = lipsync;
        Ok(orchestrator)
    }

    pub fn with_speech(mut self, client: SpeechClient) -> Self {
        self.speech = Some(client);
        self
    }

    pub fn with_lipsync(mut self, client: LipSyncClient) -> Self {
        self.lipsync = Some(client);
        self
    }

    /// Set cancellation signal for every remote job.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    fn deadline(&self) -> Deadline {
        let deadline = Deadline::after(self.config.job_deadline);
        match &self.cancel_rx {
            Some(rx) => deadline.with_cancel(rx.clone()),
            None => deadline,
        }
    }

    fn narrator(&self, request: &AnalysisRequest) -> WorkerResult<Option<&PersonaProfile>> {
        if !self.config.narrate {
            return Ok(None);
        }
        let persona = match &request.narrator {
            Some(name) => self
                .catalog
                .find(name)
                .ok_or_else(|| WorkerError::validation(format!("unknown narrator '{}'", name)))?,
            None => self
                .catalog
                .personas
                .first()
                .ok_or_else(|| WorkerError::dependency("persona catalog is empty"))?,
        };
        Ok(Some(persona))
    }

    async fn resolve_voice(&self, narrator: Option<&PersonaProfile>) -> WorkerResult<Option<VoiceModel>> {
        let Some(persona) = narrator else {
            return Ok(None);
        };
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| WorkerError::dependency("narration enabled but no speech backend configured"))?;

        let query = persona.voice_query();
        match speech.search_voice(query).await? {
            Some(voice) => Ok(Some(voice)),
            None => Err(WorkerError::dependency(format!("no voice model matches '{}'", query))),
        }
    }

    async fn narrate(&self, text: &str, voice: &VoiceModel, output: &Path) -> WorkerResult<PathBuf> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| WorkerError::dependency("no speech backend configured"))?;
        let segments = self.segmenter.segment(text);
        info!(
            voice = %voice.title,
            segments = segments.len(),
            "Narrating commentary"
        );
        self.assembler
            .assemble(
                speech,
                &segments,
                |segment| SpeechInput::new(voice.model_token.clone(), segment.text.clone()),
                output,
                &self.deadline(),
            )
            .await
    }

    /// Run the full pipeline and return the path of the summary document.
    ///
    /// Aggregation and voice lookup share no state and run concurrently on
    /// this task through `tokio::join!`, each under its own stage span; the
    /// aggregator fans its windows out to spawned workers itself. The summary
    /// is written only when every stage succeeds.
    pub async fn run(&self, request: &AnalysisRequest) -> WorkerResult<PathBuf> {
        request.validate()?;
        let key = request.request_key();
        let logger = StageLogger::new(&key, "orchestrate");
        logger.log_start("analysis request accepted");

        let narrator = self.narrator(request)?;
        let (analysis, voice) = tokio::join!(
            self.aggregator
                .run(request)
                .instrument(StageLogger::new(&key, "aggregate").span()),
            self.resolve_voice(narrator)
                .instrument(StageLogger::new(&key, "voice").span()),
        );
        let analysis = analysis?;
        let voice = voice?;

        let sentiment = Sentiment::from(analysis.recommendation);
        let commentary = self
            .commentary
            .write_all(&self.catalog, &key, &analysis.analysis_text, sentiment)
            .await;
        logger.log_progress(&format!("{} persona commentaries", commentary.len()));

        let stamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let slug = slugify(&key);
        let mut document = SummaryDocument::new(analysis, commentary);
        let mut outputs: Vec<PathBuf> = Vec::new();

        let outcome = async {
            if let (Some(persona), Some(voice)) = (narrator, voice.as_ref()) {
                let text = document
                    .commentary
                    .iter()
                    .find(|c| c.persona == persona.name)
                    .map(|c| c.text.clone())
                    .unwrap_or_default();
                let output = self
                    .config
                    .output_dir
                    .join(format!("{}_{}_{}.wav", slug, slugify(&persona.name), stamp));
                outputs.push(output.clone());
                document.narration_path = Some(self.narrate(&text, voice, &output).await?);
                logger.log_progress("narration assembled");
            }

            if let Some(lipsync) = &request.lipsync {
                let client = self.lipsync.as_ref().ok_or_else(|| {
                    WorkerError::dependency("lip-sync requested but SYNC_API_KEY is not configured")
                })?;
                let dest = self.config.output_dir.join(format!("{}_lipsync_{}.mp4", slug, stamp));
                outputs.push(dest.clone());
                let input = LipSyncInput {
                    video_url: lipsync.video_url.clone(),
                    audio_url: lipsync.audio_url.clone(),
                };
                let artifact = client.render(&input, &dest, &self.deadline()).await?;
                document.lipsync_path = Some(artifact.path);
                logger.log_progress("lip-sync video downloaded");
            }

            let summary_path = self.config.output_dir.join(format!("{}_{}.json", slug, stamp));
            let json = serde_json::to_vec_pretty(&document)?;
            write_atomic(&summary_path, &json).await?;
            Ok::<PathBuf, WorkerError>(summary_path)
        }
        .await;

        match outcome {
            Ok(summary_path) => {
                logger.log_completion(&format!(
                    "{} -> {}",
                    document.recommendation,
                    summary_path.display()
                ));
                Ok(summary_path)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                remove_files_best_effort(&outputs).await;
                Err(e)
            }
        }
    }
}

/// File-name-safe form of a request key or persona name.
fn slugify(s: &str) -> String {
    let slug: String = s
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if slug.is_empty() {
        "request".to_string()
    } else {
        slug
    }
}
