// Acquisition session - one user request from page URL to delivered file
//
// Phases: Idle -> Resolving -> InfoReady -> Downloading -> Ready
//         Downloading -> InfoReady on job failure, any -> Idle on reset
//
// State lives in a watch channel so callers can observe transitions. The
// poll loop runs as a spawned task owned through `PollHandle`; dropping the
// handle (reset, new request, session drop) aborts it. Each request bumps a
// generation counter and the poll task only writes while its generation is
// current, so nothing it does after a reset is observable.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::coordinator::JobCoordinator;
use super::errors::{AcquisitionError, ErrorKind, PollError};
use super::extractors::Resolver;
use super::models::{DownloadJob, JobState, MediaInfo, TrimSpec};
use super::traits::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Resolving,
    InfoReady,
    Downloading,
    Ready,
}

impl SessionPhase {
    /// Waiting on external I/O
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Resolving | Self::Downloading)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::InfoReady => write!(f, "info-ready"),
            Self::Downloading => write!(f, "downloading"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Encoding and trim chosen for the current download
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub format_id: String,
    pub trim: Option<TrimSpec>,
}

/// Observable session state
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub page_url: Option<String>,
    pub media_info: Option<Arc<MediaInfo>>,
    pub selection: Option<Selection>,
    pub job: Option<DownloadJob>,
    pub result_url: Option<String>,
    pub result_filename: Option<String>,
    pub last_error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Status checks issued by this session for the current job
    pub polls: u32,
    generation: u64,
}

impl SessionSnapshot {
    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.job_id.as_str())
    }
}

/// Aborts the poll task when dropped
struct PollHandle {
    task: JoinHandle<()>,
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct AcquisitionSession {
    resolver: Arc<dyn Resolver>,
    coordinator: Option<Arc<JobCoordinator>>,
    fetcher: Arc<dyn PageFetcher>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    poller: Option<PollHandle>,
}

impl AcquisitionSession {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        coordinator: Option<Arc<JobCoordinator>>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            resolver,
            coordinator,
            fetcher,
            state: Arc::new(tx),
            poller: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn media_info(&self) -> Option<Arc<MediaInfo>> {
        self.state.borrow().media_info.clone()
    }

    /// Resolve `page_url` and move to `InfoReady`.
    ///
    /// Replaces any previous result. Not allowed while a download is being
    /// observed; `reset` first.
    pub async fn start(&mut self, page_url: &str) -> Result<Arc<MediaInfo>, AcquisitionError> {
        let phase = self.phase();
        if phase.is_busy() {
            return Err(AcquisitionError::InvalidPhase {
                action: "start a new request",
                phase: phase.to_string(),
            });
        }

        self.poller = None;
        self.state.send_modify(|s| {
            *s = SessionSnapshot {
                phase: SessionPhase::Resolving,
                page_url: Some(page_url.to_string()),
                generation: s.generation + 1,
                ..Default::default()
            };
        });

        match self.resolver.resolve(page_url).await {
            Ok(info) => {
                let info = Arc::new(info);
                tracing::info!(
                    resolver = self.resolver.name(),
                    title = %info.title,
                    encodings = info.encodings.len(),
                    "Session info ready"
                );
                self.state.send_modify(|s| {
                    s.phase = SessionPhase::InfoReady;
                    s.media_info = Some(info.clone());
                });
                Ok(info)
            }
            Err(e) => {
                tracing::warn!(url = %page_url, error = %e, "Resolution failed");
                self.state.send_modify(|s| {
                    s.phase = SessionPhase::Idle;
                    s.last_error = Some(e.to_string());
                    s.error_kind = Some(e.kind());
                });
                Err(e.into())
            }
        }
    }

    /// Submit the chosen encoding and start polling. Returns the job id.
    pub async fn choose_and_download(
        &mut self,
        format_id: &str,
        trim: Option<TrimSpec>,
    ) -> Result<String, AcquisitionError> {
        let (phase, info) = {
            let snap = self.state.borrow();
            (snap.phase, snap.media_info.clone())
        };
        let info = match (phase, info) {
            (SessionPhase::InfoReady, Some(info)) => info,
            _ => {
                return Err(AcquisitionError::InvalidPhase {
                    action: "download",
                    phase: phase.to_string(),
                })
            }
        };
        let coordinator = self
            .coordinator
            .clone()
            .ok_or(AcquisitionError::NoBackend)?;

        if info.encoding(format_id).is_none() {
            return Err(AcquisitionError::InvalidInput(format!(
                "format '{}' is not offered for this video",
                format_id
            )));
        }
        if let Some(trim) = &trim {
            trim.validate_for(&info)
                .map_err(AcquisitionError::InvalidInput)?;
        }

        let job_id = match coordinator
            .submit(&info.source_url, format_id, trim.as_ref())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.state.send_modify(|s| {
                    s.last_error = Some(e.to_string());
                    s.error_kind = Some(e.kind());
                });
                return Err(e.into());
            }
        };

        let generation = {
            let job = coordinator.job(&job_id);
            let mut generation = 0;
            self.state.send_modify(|s| {
                s.generation += 1;
                generation = s.generation;
                s.phase = SessionPhase::Downloading;
                s.selection = Some(Selection {
                    format_id: format_id.to_string(),
                    trim,
                });
                s.job = job;
                s.result_url = None;
                s.result_filename = None;
                s.last_error = None;
                s.error_kind = None;
                s.polls = 0;
            });
            generation
        };

        self.poller = Some(spawn_poller(
            coordinator,
            job_id.clone(),
            self.state.clone(),
            generation,
        ));
        Ok(job_id)
    }

    /// Wait until the session is no longer waiting on I/O
    pub async fn wait_settled(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|s| !s.phase.is_busy()).await.map(|s| s.clone());
        // the sender lives in `self`, so the channel cannot close here
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Submit and wait for the result URL
    pub async fn download_to_completion(
        &mut self,
        format_id: &str,
        trim: Option<TrimSpec>,
    ) -> Result<String, AcquisitionError> {
        self.choose_and_download(format_id, trim).await?;
        let snap = self.wait_settled().await;

        match (snap.phase, snap.result_url) {
            (SessionPhase::Ready, Some(url)) => Ok(url),
            (SessionPhase::Ready, None) => Err(AcquisitionError::JobFailed {
                timed_out: false,
                message: "job completed without a result URL".to_string(),
            }),
            _ => Err(AcquisitionError::JobFailed {
                timed_out: snap.error_kind == Some(ErrorKind::PollTimeout),
                message: snap
                    .last_error
                    .unwrap_or_else(|| "download stopped".to_string()),
            }),
        }
    }

    /// Stop observing the current request and go back to `Idle`.
    ///
    /// A job already submitted keeps running upstream.
    pub fn reset(&mut self) {
        self.poller = None;
        self.state.send_modify(|s| {
            if let Some(id) = s.job_id() {
                tracing::info!(job_id = %id, "Session reset, no longer tracking job");
            }
            *s = SessionSnapshot {
                generation: s.generation + 1,
                ..Default::default()
            };
        });
    }

    /// Directly fetchable URL for `format_id`, or for the first encoding
    /// when `None`. Fails without touching the network.
    pub fn direct_url(&self, format_id: Option<&str>) -> Result<String, AcquisitionError> {
        let info = self.media_info().ok_or_else(|| AcquisitionError::InvalidPhase {
            action: "stream",
            phase: self.phase().to_string(),
        })?;

        let encoding = match format_id {
            Some(id) => info.encoding(id).ok_or_else(|| {
                AcquisitionError::InvalidInput(format!("format '{}' is not offered for this video", id))
            })?,
            None => info
                .encodings
                .first()
                .ok_or_else(|| AcquisitionError::Stream("no encodings available".to_string()))?,
        };

        encoding.direct_url.clone().ok_or_else(|| {
            AcquisitionError::Stream(format!(
                "format '{}' has no directly fetchable URL",
                encoding.format_id
            ))
        })
    }

    /// Copy the media straight into `sink` without a backend job.
    ///
    /// Uses `format_id`'s direct URL, or the first encoding's when `None`.
    pub async fn stream_direct(
        &self,
        format_id: Option<&str>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, AcquisitionError> {
        let url = self.direct_url(format_id)?;
        Ok(self.fetcher.stream_to(&url, sink).await?)
    }

    /// HEAD the result URL to confirm it can be streamed.
    ///
    /// Relative result URLs are returned without probing.
    pub async fn check_ready(&self) -> Result<String, AcquisitionError> {
        let snap = self.snapshot();
        let url = match (snap.phase, snap.result_url) {
            (SessionPhase::Ready, Some(url)) => url,
            (phase, _) => {
                return Err(AcquisitionError::InvalidPhase {
                    action: "check the result",
                    phase: phase.to_string(),
                })
            }
        };

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(url);
        }

        let status = self.fetcher.probe(&url).await?;
        if !(200..300).contains(&status) {
            return Err(AcquisitionError::Stream(format!(
                "Video could not be loaded (HTTP {})",
                status
            )));
        }
        Ok(url)
    }
}

/// Copy a job update into the snapshot; returns true once the job is terminal
fn apply_job(snap: &mut SessionSnapshot, job: &DownloadJob) -> bool {
    snap.job = Some(job.clone());
    match job.state {
        JobState::Completed => {
            snap.phase = SessionPhase::Ready;
            snap.result_url = job.result_url.clone();
            snap.result_filename = job.result_filename.clone();
            snap.last_error = None;
            true
        }
        JobState::Failed => {
            snap.phase = SessionPhase::InfoReady;
            snap.last_error = job.error_message.clone();
            snap.error_kind = Some(if job.timed_out() {
                ErrorKind::PollTimeout
            } else {
                ErrorKind::JobFailed
            });
            true
        }
        JobState::Queued | JobState::Processing => {
            snap.last_error = None;
            false
        }
    }
}

fn spawn_poller(
    coordinator: Arc<JobCoordinator>,
    job_id: String,
    state: Arc<watch::Sender<SessionSnapshot>>,
    generation: u64,
) -> PollHandle {
    let task = tokio::spawn(async move {
        let period = coordinator.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let result = coordinator.poll_once(&job_id).await;

            let mut finished = false;
            state.send_if_modified(|s| {
                if s.generation != generation || s.phase != SessionPhase::Downloading {
                    finished = true;
                    return false;
                }
                s.polls += 1;
                match &result {
                    Ok(job) => finished = apply_job(s, job),
                    Err(PollError::Transport { message, .. }) => {
                        s.last_error = Some(message.clone());
                    }
                    Err(e @ PollError::UnknownJob(_)) => {
                        s.phase = SessionPhase::InfoReady;
                        s.last_error = Some(e.to_string());
                        s.error_kind = Some(e.kind());
                        finished = true;
                    }
                }
                true
            });

            if finished {
                tracing::debug!(job_id = %job_id, "Poll loop finished");
                break;
            }
        }
    });

    PollHandle { task }
}
