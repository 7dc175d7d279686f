// Transport seams consumed by the acquisition core

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use super::errors::{BackendError, ResolutionError};
use super::models::{InfoResponse, StatusResponse, TrimSpec};

/// Raw page fetch result
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic HTTP access used by resolvers and direct delivery
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET the page. Non-2xx answers are returned, not turned into errors;
    /// only transport failures are `Err`.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ResolutionError>;

    /// HEAD the URL and report the status code
    async fn probe(&self, url: &str) -> Result<u16, ResolutionError>;

    /// Copy the response body into `sink` chunk by chunk; returns bytes written
    async fn stream_to(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, ResolutionError>;
}

/// Rich metadata extraction service
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn extract_info(&self, url: &str) -> Result<InfoResponse, ResolutionError>;
}

/// Backend that runs download/transcode jobs asynchronously
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Start processing; returns the backend-assigned job id
    async fn submit_download(
        &self,
        source_url: &str,
        format_id: &str,
        trim: Option<&TrimSpec>,
    ) -> Result<String, BackendError>;

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, BackendError>;
}
