// Resolver module - page URL to MediaInfo
//
// Two strategies behind the `Resolver` trait:
// - Scrape: fetch the page and read <video>/<source> tags (single encoding)
// - Service: ask the metadata service for every available format
//
// `build_resolver` picks one from configuration.

mod scrape;
mod service;
mod traits;

pub use scrape::{PageMedia, ScrapeResolver};
pub use service::ServiceResolver;
pub use traits::Resolver;

use std::sync::Arc;

use crate::config::{AcquireConfig, ResolverMode};
use crate::downloader::errors::ConfigError;
use crate::downloader::traits::{MetadataService, PageFetcher};

/// Select the resolver named by `config`
pub fn build_resolver(
    config: &AcquireConfig,
    fetcher: Arc<dyn PageFetcher>,
    service: Option<Arc<dyn MetadataService>>,
) -> Result<Arc<dyn Resolver>, ConfigError> {
    let resolver: Arc<dyn Resolver> = match config.effective_resolver_mode() {
        ResolverMode::Service => match service {
            Some(svc) => Arc::new(ServiceResolver::new(svc)),
            None => {
                return Err(ConfigError(
                    "service resolver selected but no metadata service available".to_string(),
                ))
            }
        },
        _ => Arc::new(ScrapeResolver::new(fetcher)),
    };

    tracing::debug!(resolver = resolver.name(), "Selected resolver");
    Ok(resolver)
}
