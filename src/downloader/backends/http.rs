// HTTP client for the metadata / download-job backend
//
// Endpoints relative to the configured base URL:
//   POST /api/info              {url}                                 -> info
//   POST /api/download          {url, format_id, start_time?, end_time?} -> {downloadId}
//   GET  /api/status/{id}                                              -> {status, url?, filename?, error?}

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::config::NetworkConfig;
use crate::downloader::errors::{BackendError, ResolutionError};
use crate::downloader::models::{InfoResponse, StatusResponse, SubmitRequest, SubmitResponse, TrimSpec};
use crate::downloader::traits::{JobBackend, MetadataService};
use crate::downloader::utils::build_client;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct InfoRequest<'a> {
    url: &'a str,
}

#[derive(Clone)]
pub struct HttpJobBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobBackend {
    pub fn new(base_url: &str, network: &NetworkConfig) -> Self {
        Self {
            client: build_client(network),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Pull a readable message out of an error response
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            })
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    if err.is_decode() {
        BackendError::Malformed(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

#[async_trait]
impl MetadataService for HttpJobBackend {
    async fn extract_info(&self, url: &str) -> Result<InfoResponse, ResolutionError> {
        let endpoint = self.url("/info");
        let response = self
            .client
            .post(&endpoint)
            .json(&InfoRequest { url })
            .send()
            .await
            .map_err(|e| ResolutionError::upstream(&endpoint, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            return Err(ResolutionError::upstream(url, Some(status.as_u16()), message));
        }

        response
            .json::<InfoResponse>()
            .await
            .map_err(|e| ResolutionError::upstream(&endpoint, None, format!("invalid info response: {}", e)))
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit_download(
        &self,
        source_url: &str,
        format_id: &str,
        trim: Option<&TrimSpec>,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("/download"))
            .json(&SubmitRequest::new(source_url, format_id, trim))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: Self::error_message(response).await,
            });
        }

        let body: SubmitResponse = response.json().await.map_err(transport)?;
        let job_id = body.download_id.to_string();
        if job_id.is_empty() {
            return Err(BackendError::Malformed("empty downloadId".to_string()));
        }
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, BackendError> {
        let mut endpoint = url::Url::parse(&self.url("/status"))
            .map_err(|e| BackendError::Transport(format!("bad backend URL: {}", e)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| BackendError::Transport("backend URL cannot carry a path".to_string()))?
            .push(job_id);

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: Self::error_message(response).await,
            });
        }

        response.json().await.map_err(transport)
    }
}
