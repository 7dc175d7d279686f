// Job coordinator - submits download jobs and tracks them by polling
//
// Jobs are cached by id. Terminal jobs are never polled again; their cached
// state is returned as-is. A job whose status checks fail too many times in
// a row is forced to Failed with FailureKind::PollTimeout.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use super::errors::{PollError, SubmissionError};
use super::models::{DownloadJob, FailureKind, TrimSpec};
use super::traits::JobBackend;
use crate::config::{AcquireConfig, DEFAULT_MAX_POLL_FAILURES, DEFAULT_POLL_INTERVAL};

/// Floor for the status check cadence
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct JobCoordinator {
    backend: Arc<dyn JobBackend>,
    jobs: DashMap<String, DownloadJob>,
    poll_interval: Duration,
    max_poll_failures: u32,
}

impl JobCoordinator {
    pub fn new(backend: Arc<dyn JobBackend>) -> Self {
        Self {
            backend,
            jobs: DashMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }

    pub fn from_config(backend: Arc<dyn JobBackend>, config: &AcquireConfig) -> Self {
        Self::new(backend)
            .with_poll_interval(config.poll_interval)
            .with_max_poll_failures(config.max_poll_failures)
    }

    /// Intervals below `MIN_POLL_INTERVAL` are raised to it
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max.max(1);
        self
    }

    /// Cadence sessions poll at
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Validate and hand the request to the backend.
    ///
    /// Validation happens before any network call. If the backend returns an
    /// id that is already tracked, the existing entry is kept.
    pub async fn submit(
        &self,
        source_url: &str,
        format_id: &str,
        trim: Option<&TrimSpec>,
    ) -> Result<String, SubmissionError> {
        if source_url.trim().is_empty() {
            return Err(SubmissionError::InvalidInput("source URL is empty".to_string()));
        }
        if format_id.trim().is_empty() {
            return Err(SubmissionError::InvalidInput("format id is empty".to_string()));
        }
        if let Some(trim) = trim {
            trim.validate().map_err(SubmissionError::InvalidInput)?;
        }

        let job_id = self
            .backend
            .submit_download(source_url, format_id, trim)
            .await
            .map_err(|e| {
                tracing::warn!(backend = self.backend.name(), error = %e, "Download submission failed");
                SubmissionError::from(e)
            })?;

        self.jobs
            .entry(job_id.clone())
            .or_insert_with(|| DownloadJob::new(job_id.clone()));

        tracing::info!(
            job_id = %job_id,
            format_id = %format_id,
            trimmed = trim.is_some(),
            "Submitted download job"
        );
        Ok(job_id)
    }

    /// Issue one status check and apply it.
    ///
    /// Returns the job after the update. A transport failure below the budget
    /// is `Err(PollError::Transport)`; the failure that exhausts the budget
    /// returns the job, now `Failed`.
    pub async fn poll_once(&self, job_id: &str) -> Result<DownloadJob, PollError> {
        {
            let job = self
                .jobs
                .get(job_id)
                .ok_or_else(|| PollError::UnknownJob(job_id.to_string()))?;
            if job.state.is_terminal() {
                return Ok(job.clone());
            }
        }

        let response = self.backend.job_status(job_id).await;

        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| PollError::UnknownJob(job_id.to_string()))?;

        // another poller may have finished it while we were waiting
        if job.state.is_terminal() {
            return Ok(job.clone());
        }

        job.polls += 1;
        job.last_polled_at = Some(OffsetDateTime::now_utc());

        let failure = match response {
            Ok(status) => match job.apply_status(&status) {
                Ok(()) => None,
                Err(msg) => Some(msg),
            },
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                job.consecutive_failures = 0;
                tracing::debug!(job_id = %job_id, state = %job.state, poll = job.polls, "Polled job");
                if job.state.is_terminal() {
                    tracing::info!(
                        job_id = %job_id,
                        state = %job.state,
                        result = job.result_url.as_deref().unwrap_or(""),
                        error = job.error_message.as_deref().unwrap_or(""),
                        "Job finished"
                    );
                }
                Ok(job.clone())
            }
            Some(message) => {
                job.consecutive_failures += 1;
                let attempt = job.consecutive_failures;
                tracing::warn!(job_id = %job_id, attempt, error = %message, "Status check failed");

                if attempt >= self.max_poll_failures {
                    job.fail(
                        FailureKind::PollTimeout,
                        format!(
                            "Status check failed {} times in a row: {}",
                            attempt, message
                        ),
                    );
                    tracing::info!(job_id = %job_id, "Job failed: poll budget exhausted");
                    return Ok(job.clone());
                }

                Err(PollError::Transport {
                    job_id: job_id.to_string(),
                    attempt,
                    message,
                })
            }
        }
    }

    /// Cached view of a job
    pub fn job(&self, job_id: &str) -> Option<DownloadJob> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    /// Drop a terminal job from the cache; in-flight jobs are kept
    pub fn forget(&self, job_id: &str) -> bool {
        self.jobs
            .remove_if(job_id, |_, job| job.state.is_terminal())
            .is_some()
    }

    pub fn tracked_jobs(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::BackendError;
    use crate::downloader::models::{JobState, StatusResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        statuses: Mutex<VecDeque<Result<StatusResponse, BackendError>>>,
        submits: AtomicU32,
        polls: AtomicU32,
    }

    impl Scripted {
        fn new(statuses: Vec<Result<StatusResponse, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                submits: AtomicU32::new(0),
                polls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl JobBackend for Scripted {
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
            Ok("job-1".to_string())
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

    fn down() -> Result<StatusResponse, BackendError> {
        Err(BackendError::Transport("connection refused".to_string()))
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let coordinator = JobCoordinator::new(Scripted::new(vec![]));
        assert_eq!(coordinator.poll_interval(), Duration::from_secs(3));

        let coordinator = coordinator.with_poll_interval(Duration::ZERO);
        assert_eq!(coordinator.poll_interval(), MIN_POLL_INTERVAL);

        let coordinator = coordinator.with_poll_interval(Duration::from_secs(10));
        assert_eq!(coordinator.poll_interval(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_inverted_trim_rejected_before_network() {
        let backend = Scripted::new(vec![]);
        let coordinator = JobCoordinator::new(backend.clone());

        let err = coordinator
            .submit("https://cdn/x.mp4", "18", Some(&TrimSpec::new(10.0, 5.0)))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::InvalidInput(_)));
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_format_rejected() {
        let backend = Scripted::new(vec![]);
        let coordinator = JobCoordinator::new(backend.clone());

        let err = coordinator.submit("https://cdn/x.mp4", " ", None).await.unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidInput(_)));
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completed_job_is_cached() {
        let backend = Scripted::new(vec![
            Ok(StatusResponse::processing()),
            Ok(StatusResponse::completed("f.mp4", Some("f.mp4"))),
        ]);
        let coordinator = JobCoordinator::new(backend.clone());
        let id = coordinator.submit("https://cdn/x.mp4", "18", None).await.unwrap();
        assert_eq!(coordinator.job(&id).unwrap().state, JobState::Queued);

        assert_eq!(coordinator.poll_once(&id).await.unwrap().state, JobState::Processing);
        let done = coordinator.poll_once(&id).await.unwrap();
        assert_eq!(done.state, JobState::Completed);

        let again = coordinator.poll_once(&id).await.unwrap();
        assert_eq!(again, done);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_below_budget_are_errors() {
        let backend = Scripted::new(vec![down(), down(), Ok(StatusResponse::processing())]);
        let coordinator = JobCoordinator::new(backend);
        let id = coordinator.submit("u", "18", None).await.unwrap();

        assert!(matches!(
            coordinator.poll_once(&id).await,
            Err(PollError::Transport { attempt: 1, .. })
        ));
        assert!(matches!(
            coordinator.poll_once(&id).await,
            Err(PollError::Transport { attempt: 2, .. })
        ));

        // success resets the streak
        let job = coordinator.poll_once(&id).await.unwrap();
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_poll_timeout_after_budget() {
        let backend = Scripted::new(vec![down(), down(), down()]);
        let coordinator = JobCoordinator::new(backend.clone());
        let id = coordinator.submit("u", "18", None).await.unwrap();

        assert!(coordinator.poll_once(&id).await.is_err());
        assert!(coordinator.poll_once(&id).await.is_err());
        let job = coordinator.poll_once(&id).await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert!(job.timed_out());
        assert!(job.error_message.unwrap().contains("3 times"));

        coordinator.poll_once(&id).await.unwrap();
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let backend = Scripted::new(vec![Ok(StatusResponse::failed("codec missing"))]);
        let coordinator = JobCoordinator::new(backend);
        let id = coordinator.submit("u", "18", None).await.unwrap();

        let job = coordinator.poll_once(&id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failure, Some(FailureKind::Reported));
        assert_eq!(job.error_message.as_deref(), Some("codec missing"));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let coordinator = JobCoordinator::new(Scripted::new(vec![]));
        assert!(matches!(
            coordinator.poll_once("nope").await,
            Err(PollError::UnknownJob(_))
        ));
    }

    #[tokio::test]
    async fn test_resubmission_keeps_existing_entry() {
        let backend = Scripted::new(vec![Ok(StatusResponse::completed("f.mp4", None))]);
        let coordinator = JobCoordinator::new(backend);
        let id = coordinator.submit("u", "18", None).await.unwrap();
        coordinator.poll_once(&id).await.unwrap();

        let again = coordinator.submit("u", "18", None).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(coordinator.job(&id).unwrap().state, JobState::Completed);
        assert_eq!(coordinator.tracked_jobs(), 1);
    }

    #[tokio::test]
    async fn test_forget_only_terminal() {
        let backend = Scripted::new(vec![Ok(StatusResponse::completed("f.mp4", None))]);
        let coordinator = JobCoordinator::new(backend);
        let id = coordinator.submit("u", "18", None).await.unwrap();

        assert!(!coordinator.forget(&id));
        coordinator.poll_once(&id).await.unwrap();
        assert!(coordinator.forget(&id));
        assert!(coordinator.job(&id).is_none());
    }
}
