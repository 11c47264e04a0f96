//! Screenshot-cache read client.
//!
//! The cache is an external collaborator exposing a single read: the most
//! recent encoded frame no older than a caller-supplied staleness bound.
//! The core never triggers captures itself.

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct CachedFrame {
    /// Base64-encoded image bytes.
    pub data: String,
    pub media_type: String,
    pub age_ms: u64,
}

#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn fetch(&self, max_age_ms: u64) -> anyhow::Result<CachedFrame>;
}

pub struct HttpScreenshotCache {
    base_url: String,
    http: reqwest::Client,
}

impl HttpScreenshotCache {
    pub fn new(base_url: &str, request_timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl ScreenshotSource for HttpScreenshotCache {
    async fn fetch(&self, max_age_ms: u64) -> anyhow::Result<CachedFrame> {
        let url = format!("{}/screenshot", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("max_age_ms", max_age_ms)])
            .send()
            .await?
            .error_for_status()?;
        let frame: CachedFrame = response.json().await?;

        // A frame that does not decode would only fail later, inside the
        // model transcript; reject it at the boundary instead.
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.data)
            .context("screenshot cache returned undecodable image data")?;
        tracing::debug!(
            media_type = %frame.media_type,
            age_ms = frame.age_ms,
            size = bytes.len(),
            "cached screenshot read"
        );
        Ok(frame)
    }
}
