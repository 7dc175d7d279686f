#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use media_acquire_lib::downloader::errors::{BackendError, ResolutionError};
use media_acquire_lib::downloader::models::{EncodingOption, StatusResponse};
use media_acquire_lib::downloader::traits::{FetchedPage, JobBackend, PageFetcher};
use media_acquire_lib::downloader::{MediaInfo, Resolver, TrimSpec};

/// Job backend answering status checks from a script
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<Result<StatusResponse, BackendError>>>,
    reject_submit: Option<BackendError>,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(statuses: Vec<Result<StatusResponse, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            reject_submit: None,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        })
    }

    pub fn rejecting(err: BackendError) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(VecDeque::new()),
            reject_submit: Some(err),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        })
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit_download(
        &self,
        _source_url: &str,
        _format_id: &str,
        _trim: Option<&TrimSpec>,
    ) -> Result<String, BackendError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match &self.reject_submit {
            Some(err) => Err(err.clone()),
            None => Ok("job-1".to_string()),
        }
    }

    async fn job_status(&self, _job_id: &str) -> Result<StatusResponse, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusResponse::processing()))
    }
}

pub fn unreachable_backend() -> Result<StatusResponse, BackendError> {
    Err(BackendError::Transport("connection refused".to_string()))
}

/// Resolver that always returns the same info
pub struct StaticResolver {
    info: Option<MediaInfo>,
    pub calls: AtomicU32,
}

impl StaticResolver {
    pub fn new(info: MediaInfo) -> Arc<Self> {
        Arc::new(Self {
            info: Some(info),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            info: None,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self, page_url: &str) -> Result<MediaInfo, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.info
            .clone()
            .ok_or_else(|| ResolutionError::NoMediaFound(page_url.to_string()))
    }
}

/// Fetcher serving a fixed body and HEAD status
pub struct FixedFetcher {
    pub body: Vec<u8>,
    pub head_status: u16,
    pub probes: AtomicU32,
}

impl FixedFetcher {
    pub fn new(body: &[u8], head_status: u16) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_vec(),
            head_status,
            probes: AtomicU32::new(0),
        })
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FixedFetcher {
    async fn fetch_page(&self, _url: &str) -> Result<FetchedPage, ResolutionError> {
        Ok(FetchedPage {
            status: 200,
            body: String::from_utf8_lossy(&self.body).into_owned(),
        })
    }

    async fn probe(&self, _url: &str) -> Result<u16, ResolutionError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.head_status)
    }

    async fn stream_to(
        &self,
        _url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, ResolutionError> {
        sink.write_all(&self.body)
            .await
            .map_err(|e| ResolutionError::UpstreamUnavailable {
                url: "sink".to_string(),
                status: None,
                reason: e.to_string(),
            })?;
        Ok(self.body.len() as u64)
    }
}

/// Two-encoding info with a known duration
pub fn sample_info() -> MediaInfo {
    MediaInfo {
        id: "abc".to_string(),
        title: "Sample clip".to_string(),
        uploader: "cdn.example".to_string(),
        thumbnail_url: "https://cdn.example/poster.jpg".to_string(),
        duration_seconds: 120.0,
        source_url: "https://video.example/watch/abc".to_string(),
        encodings: vec![
            EncodingOption {
                format_id: "22".to_string(),
                resolution: "720p".to_string(),
                size_bytes: 10_485_760,
                container: "mp4".to_string(),
                direct_url: Some("https://cdn.example/abc-720.mp4".to_string()),
            },
            EncodingOption {
                format_id: "140".to_string(),
                resolution: String::new(),
                size_bytes: 0,
                container: "m4a".to_string(),
                direct_url: None,
            },
        ],
    }
}
