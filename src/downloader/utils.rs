// HTTP helpers shared by resolvers, the job backend and direct delivery

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use super::errors::ResolutionError;
use super::traits::{FetchedPage, PageFetcher};
use crate::config::NetworkConfig;

/// Build a reqwest client honoring proxy, timeout and user agent
pub fn build_client(config: &NetworkConfig) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone());

    let builder = match config.proxy.as_deref() {
        Some(proxy_url) => match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder.proxy(proxy),
            Err(e) => {
                tracing::warn!(proxy = %proxy_url, error = %e, "Invalid proxy URL, connecting directly");
                builder
            }
        },
        None => builder,
    };

    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Failed to build HTTP client with settings: {}", e);
        reqwest::Client::new()
    })
}

/// Check that `page_url` is a non-empty absolute http(s) URL
pub fn parse_page_url(page_url: &str) -> Result<Url, ResolutionError> {
    let trimmed = page_url.trim();
    if trimmed.is_empty() {
        return Err(ResolutionError::InvalidInput("empty URL".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ResolutionError::InvalidInput(format!("{}: {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ResolutionError::InvalidInput(format!(
            "{}: only http(s) URLs with a host are supported",
            trimmed
        )));
    }

    Ok(url)
}

/// Resolve a media reference against the origin (scheme + host) of the page.
/// References that already carry a scheme are returned unchanged.
pub fn absolutize(page: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if Url::parse(reference).is_ok() {
        return Some(reference.to_string());
    }

    let origin = Url::parse(&page.origin().ascii_serialization()).ok()?;
    origin.join(reference).ok().map(String::from)
}

/// reqwest-backed `PageFetcher`
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            client: build_client(config),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> ResolutionError {
    let reason = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    };
    ResolutionError::upstream(url, err.status().map(|s| s.as_u16()), reason)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ResolutionError> {
        tracing::debug!(url = %url, "Fetching page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| transport_error(url, e))?;
        Ok(FetchedPage { status, body })
    }

    async fn probe(&self, url: &str) -> Result<u16, ResolutionError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Ok(response.status().as_u16())
    }

    async fn stream_to(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, ResolutionError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::upstream(
                url,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(url, e))? {
            sink.write_all(&chunk)
                .await
                .map_err(|e| ResolutionError::upstream(url, None, format!("write failed: {}", e)))?;
            written += chunk.len() as u64;
        }
        sink.flush()
            .await
            .map_err(|e| ResolutionError::upstream(url, None, format!("flush failed: {}", e)))?;

        tracing::info!(url = %url, bytes = written, "Streamed media");
        Ok(written)
    }
}
