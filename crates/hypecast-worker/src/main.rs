//! Analysis pipeline binary.
//!
//! Reads one JSON analysis request from stdin and prints the path of the
//! summary document it writes.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hypecast_models::AnalysisRequest;
use hypecast_worker::{Orchestrator, WorkerConfig};

const DEFAULT_LOG_DIRECTIVES: &str = "hypecast_worker=info,hypecast_render_client=info,hypecast_media=info";

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    // stdout carries the summary path; logs go to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cancel_rx: watch::Receiver<bool>) -> anyhow::Result<PathBuf> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read request from stdin")?;
    let request: AnalysisRequest =
        serde_json::from_str(input.trim()).context("invalid request JSON")?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let orchestrator = Orchestrator::from_env(config, cancel_rx)
        .await
        .context("failed to initialize pipeline")?;
    let summary = orchestrator
        .run(&request)
        .await
        .with_context(|| format!("analysis of '{}' failed", request.request_key()))?;
    Ok(summary)
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting hypecast-worker");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    match run(cancel_rx).await {
        Ok(summary) => {
            println!("{}", summary.display());
        }
        Err(e) => {
            error!(error = %e, cause = %e.root_cause(), "Pipeline failed");
            std::process::exit(1);
        }
    }
}
