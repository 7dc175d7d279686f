// Service resolver - delegates to a metadata extraction service
//
// The service enumerates every available format, so this path replaces
// scraping entirely when configured.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Resolver;
use crate::downloader::errors::ResolutionError;
use crate::downloader::models::MediaInfo;
use crate::downloader::traits::MetadataService;
use crate::downloader::utils::parse_page_url;

pub struct ServiceResolver {
    service: Arc<dyn MetadataService>,
}

impl ServiceResolver {
    pub fn new(service: Arc<dyn MetadataService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Resolver for ServiceResolver {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn resolve(&self, page_url: &str) -> Result<MediaInfo, ResolutionError> {
        let page = parse_page_url(page_url)?;
        let response = self.service.extract_info(page.as_str()).await?;
        let info = MediaInfo::from_response(response, page.as_str())?;

        tracing::info!(
            page = %page,
            id = %info.id,
            encodings = info.encodings.len(),
            "Resolved media via metadata service"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{FormatEntry, InfoResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedService {
        response: InfoResponse,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataService for FixedService {
        async fn extract_info(&self, _url: &str) -> Result<InfoResponse, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn service(formats: Vec<FormatEntry>) -> Arc<FixedService> {
        Arc::new(FixedService {
            response: InfoResponse {
                id: "vid".to_string(),
                title: "Title".to_string(),
                formats,
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_returns_all_formats() {
        let svc = service(vec![
            FormatEntry {
                format_id: "22".to_string(),
                resolution: Some("720p".to_string()),
                ext: "mp4".to_string(),
                ..Default::default()
            },
            FormatEntry {
                format_id: "18".to_string(),
                resolution: Some("360p".to_string()),
                ext: "mp4".to_string(),
                ..Default::default()
            },
        ]);
        let resolver = ServiceResolver::new(svc.clone());

        let info = resolver.resolve("https://site.test/watch?v=1").await.unwrap();
        assert_eq!(info.encodings.len(), 2);
        assert_eq!(info.encodings[0].format_id, "22");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_skips_service() {
        let svc = service(vec![]);
        let resolver = ServiceResolver::new(svc.clone());

        let err = resolver.resolve("not a url").await.unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidInput(_)));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_formats_is_no_media() {
        let resolver = ServiceResolver::new(service(vec![]));
        let err = resolver.resolve("https://site.test/v").await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoMediaFound(_)));
    }
}
