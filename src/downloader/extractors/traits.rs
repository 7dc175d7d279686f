// Resolver trait shared by every resolution strategy

use async_trait::async_trait;

use crate::downloader::errors::ResolutionError;
use crate::downloader::models::MediaInfo;

/// Turns a page URL into a `MediaInfo`.
///
/// Implementations validate the URL before touching the network, never
/// return a `MediaInfo` without encodings, and are safe to retry.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Name of the resolver (for logging)
    fn name(&self) -> &'static str;

    async fn resolve(&self, page_url: &str) -> Result<MediaInfo, ResolutionError>;
}
