//! End-to-end pipeline runs with fake analysis backends and a mocked speech API.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hypecast_media::{AudioExporter, MediaResult};
use hypecast_models::{
    AnalysisRequest, EngagementMetrics, EngagementRecord, LipSyncRequest, PostAuthor,
    Recommendation, SummaryDocument,
};
use hypecast_render_client::{SpeechClient, SpeechClientConfig};
use hypecast_worker::{
    load_catalog, EngagementSource, GenerativeModel, Orchestrator, Prompt, TimeWindow,
    WorkerConfig, WorkerError, WorkerResult,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

struct OnePostPerWindow;

#[async_trait]
impl EngagementSource for OnePostPerWindow {
    async fn fetch_window(
        &self,
        _subject: &str,
        window: &TimeWindow,
    ) -> WorkerResult<Vec<EngagementRecord>> {
        Ok(vec![EngagementRecord {
            post_id: format!("w{}", window.index),
            author: PostAuthor::default(),
            text: "to the moon".into(),
            posted_on: window.start,
            posted_at: None,
            metrics: EngagementMetrics {
                reposts: 10 - window.index as u64,
                ..Default::default()
            },
            discovery_index: 0,
        }])
    }
}

struct FixedModel {
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl FixedModel {
    fn new(reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerativeModel for FixedModel {
    async fn complete(&self, _prompt: &Prompt) -> WorkerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .map(str::to_string)
            .ok_or_else(|| WorkerError::analysis_failed("model offline"))
    }
}

/// Writes the input count so the composite is checkable.
struct CountingExporter;

#[async_trait]
impl AudioExporter for CountingExporter {
    async fn export(&self, inputs: &[PathBuf], _pause: Duration, output: &Path) -> MediaResult<()> {
        for input in inputs {
            assert!(input.exists());
        }
        tokio::fs::write(output, format!("{} parts", inputs.len())).await?;
        Ok(())
    }
}

struct Dirs {
    work: TempDir,
    output: TempDir,
}

fn config(dirs: &Dirs, narrate: bool) -> WorkerConfig {
    WorkerConfig {
        work_dir: dirs.work.path().to_path_buf(),
        output_dir: dirs.output.path().to_path_buf(),
        windows: 3,
        narrate,
        job_deadline: Duration::from_secs(30),
        ..Default::default()
    }
}

fn dirs() -> Dirs {
    Dirs {
        work: TempDir::new().unwrap(),
        output: TempDir::new().unwrap(),
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

async fn mount_speech_backend(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tts/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "models": [
                { "model_token": "TM:chef-old", "title": "Gordon Ramsay", "updated_at": "2022-01-01T00:00:00Z" },
                { "model_token": "TM:chef", "title": "Gordon Ramsay (v3)", "updated_at": "2024-01-01T00:00:00Z" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tts/inference"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "inference_job_token": "JTINF:1",
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/tts/job/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "state": {
                "status": "complete_success",
                "maybe_public_bucket_wav_audio_path": "/media/seg.wav",
                "maybe_failure_reason": null
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/seg.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVE".to_vec()))
        .mount(server)
        .await;
}

fn speech_client(server: &MockServer) -> SpeechClient {
    SpeechClient::new(SpeechClientConfig {
        api_url: server.uri(),
        cdn_url: server.uri(),
        alt_url: server.uri(),
        min_interval: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

const BULLISH: &str = "The community is loud and growing. The pitch is coherent and the art is strong. \
Liquidity is thin but improving week over week. Final call: INVEST.";

#[tokio::test]
async fn test_full_run_writes_summary_and_narration() {
    let server = MockServer::start().await;
    mount_speech_backend(&server).await;
    let dirs = dirs();
    let catalog = load_catalog(None).await.unwrap();
    let persona_count = catalog.len();
    let model = FixedModel::new(Some(BULLISH));

    let orchestrator = Orchestrator::new(
        config(&dirs, true),
        catalog,
        Arc::new(OnePostPerWindow),
        model.clone(),
        Arc::new(CountingExporter),
    )
    .with_speech(speech_client(&server));

    let request = AnalysisRequest::new("Squirrel Nuts", "Decentralized storage for hoarders.");
    let summary_path = orchestrator.run(&request).await.unwrap();

    let document: SummaryDocument =
        serde_json::from_slice(&std::fs::read(&summary_path).unwrap()).unwrap();
    assert_eq!(document.request_key, "Squirrel Nuts");
    assert_eq!(document.recommendation, Recommendation::Invest);
    assert_eq!(document.engagement.windows_total, 3);
    assert_eq!(document.engagement.total_posts, 3);
    assert_eq!(document.engagement.top_posts[0].post_id, "w0");
    assert_eq!(document.commentary.len(), persona_count);
    assert!(document.commentary.iter().all(|c| c.generated));

    // One analysis call plus one per persona
    assert_eq!(model.calls.load(Ordering::SeqCst), 1 + persona_count);

    let narration = document.narration_path.unwrap();
    assert!(narration.starts_with(dirs.output.path()));
    let composite = std::fs::read_to_string(&narration).unwrap();
    assert!(composite.ends_with(" parts"));
    assert!(document.lipsync_path.is_none());

    // Only the summary and the composite remain; scratch is empty
    assert_eq!(count_files(dirs.output.path()), 2);
    assert_eq!(count_files(dirs.work.path()), 0);
}

#[tokio::test]
async fn test_generative_failure_writes_nothing() {
    let dirs = dirs();
    let orchestrator = Orchestrator::new(
        config(&dirs, false),
        load_catalog(None).await.unwrap(),
        Arc::new(OnePostPerWindow),
        FixedModel::new(None),
        Arc::new(CountingExporter),
    );

    let err = orchestrator
        .run(&AnalysisRequest::new("PEPE", "frogs"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::AnalysisFailed(_)));
    assert_eq!(count_files(dirs.output.path()), 0);
}

#[tokio::test]
async fn test_missing_voice_fails_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tts/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "models": []})))
        .mount(&server)
        .await;
    let dirs = dirs();

    let orchestrator = Orchestrator::new(
        config(&dirs, true),
        load_catalog(None).await.unwrap(),
        Arc::new(OnePostPerWindow),
        FixedModel::new(Some(BULLISH)),
        Arc::new(CountingExporter),
    )
    .with_speech(speech_client(&server));

    let err = orchestrator
        .run(&AnalysisRequest::new("PEPE", "frogs"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Dependency(_)));
    assert_eq!(count_files(dirs.output.path()), 0);
}

#[tokio::test]
async fn test_lipsync_without_backend_is_dependency_error() {
    let dirs = dirs();
    let orchestrator = Orchestrator::new(
        config(&dirs, false),
        load_catalog(None).await.unwrap(),
        Arc::new(OnePostPerWindow),
        FixedModel::new(Some(BULLISH)),
        Arc::new(CountingExporter),
    );

    let mut request = AnalysisRequest::new("PEPE", "frogs");
    request.lipsync = Some(LipSyncRequest {
        video_url: "https://cdn.example.com/v.mp4".into(),
        audio_url: "https://cdn.example.com/a.wav".into(),
    });

    let err = orchestrator.run(&request).await.unwrap_err();
    assert!(matches!(err, WorkerError::Dependency(_)));
    assert_eq!(count_files(dirs.output.path()), 0);
}

#[tokio::test]
async fn test_invalid_request_rejected_before_any_call() {
    let dirs = dirs();
    let model = FixedModel::new(Some(BULLISH));
    let orchestrator = Orchestrator::new(
        config(&dirs, false),
        load_catalog(None).await.unwrap(),
        Arc::new(OnePostPerWindow),
        model.clone(),
        Arc::new(CountingExporter),
    );

    let err = orchestrator
        .run(&AnalysisRequest::new("  ", "frogs"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Validation(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}
