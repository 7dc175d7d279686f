// Acquirer - wires resolver, coordinator and fetcher from configuration
//
// One Acquirer per process; every session it creates shares the same
// JobCoordinator, so the job cache is process-wide.

use std::sync::Arc;

use super::backends::HttpJobBackend;
use super::coordinator::JobCoordinator;
use super::errors::ConfigError;
use super::extractors::{build_resolver, Resolver};
use super::session::AcquisitionSession;
use super::traits::{JobBackend, MetadataService, PageFetcher};
use super::utils::HttpFetcher;
use crate::config::AcquireConfig;

pub struct Acquirer {
    resolver: Arc<dyn Resolver>,
    coordinator: Option<Arc<JobCoordinator>>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Acquirer {
    /// Build the HTTP-backed pipeline described by `config`
    pub fn from_config(config: &AcquireConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.network));
        let backend = config
            .backend_url
            .as_deref()
            .map(|url| Arc::new(HttpJobBackend::new(url, &config.network)));

        let service = backend
            .clone()
            .map(|b| b as Arc<dyn MetadataService>);
        let resolver = build_resolver(config, fetcher.clone(), service)?;

        let coordinator = backend.map(|b| {
            Arc::new(JobCoordinator::from_config(b as Arc<dyn JobBackend>, config))
        });

        tracing::info!(
            resolver = resolver.name(),
            backend = config.backend_url.as_deref().unwrap_or("none"),
            poll_interval_secs = config.poll_interval.as_secs_f64(),
            "Acquirer ready"
        );

        Ok(Self {
            resolver,
            coordinator,
            fetcher,
        })
    }

    /// Assemble from already-built parts
    pub fn from_parts(
        resolver: Arc<dyn Resolver>,
        coordinator: Option<Arc<JobCoordinator>>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            resolver,
            coordinator,
            fetcher,
        }
    }

    pub fn session(&self) -> AcquisitionSession {
        AcquisitionSession::new(
            self.resolver.clone(),
            self.coordinator.clone(),
            self.fetcher.clone(),
        )
    }

    pub fn coordinator(&self) -> Option<&Arc<JobCoordinator>> {
        self.coordinator.as_ref()
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }
}
