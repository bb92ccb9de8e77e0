//! Streaming download of finished job payloads.

use std::path::Path;

use futures::StreamExt;
use hypecast_models::{Artifact, ArtifactKind, JobHandle};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};
use crate::rate_limit::RateLimiter;
use crate::types::ResultLocation;

/// Download `location` into `dest`.
///
/// A 403 from the primary URL is retried exactly once against the
/// alternate URL, if the location has one.
pub(crate) async fn download_artifact(
    http: &Client,
    limiter: &RateLimiter,
    headers: &HeaderMap,
    handle: &JobHandle,
    location: &ResultLocation,
    dest: &Path,
) -> RenderResult<Artifact> {
    let mut source_url = location.url.clone();
    let mut response = get(http, limiter, headers, &source_url).await?;

    if response.status() == StatusCode::FORBIDDEN {
        if let Some(alternate) = &location.alternate_url {
            warn!(
                job_id = %handle.id,
                url = %source_url,
                alternate = %alternate,
                "Primary download URL denied access, trying alternate"
            );
            source_url = alternate.clone();
            response = get(http, limiter, headers, &source_url).await?;
        }
    }

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RenderError::download(format!(
            "{} returned {}: {}",
            source_url, status, body
        )));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let size_bytes = match write_body(response, dest).await {
        Ok(size) => size,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                debug!(path = %dest.display(), "No partial download to remove: {}", cleanup);
            }
            return Err(e);
        }
    };

    Ok(Artifact {
        job_id: handle.id.clone(),
        kind: ArtifactKind::from(handle.kind),
        path: dest.to_path_buf(),
        source_url,
        size_bytes,
    })
}

async fn get(
    http: &Client,
    limiter: &RateLimiter,
    headers: &HeaderMap,
    url: &str,
) -> RenderResult<Response> {
    limiter.wait().await;
    debug!(url, "Downloading job result");
    Ok(http.get(url).headers(headers.clone()).send().await?)
}

async fn write_body(response: Response, dest: &Path) -> RenderResult<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        return Err(RenderError::download(format!(
            "empty payload for {}",
            dest.display()
        )));
    }
    Ok(written)
}
