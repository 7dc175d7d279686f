// Error types for resolution, job submission and polling

use thiserror::Error;

/// Coarse classification shared by every error surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed URL, empty format, invalid trim range
    InvalidInput,
    /// Upstream answered with a non-success status or could not be reached
    UpstreamUnavailable,
    /// Page fetched fine but carried no usable media reference
    NoMediaFound,
    /// Backend refused the download request
    SubmissionError,
    /// A single status check failed
    PollError,
    /// Status checks kept failing past the configured budget
    PollTimeout,
    /// Backend reported that the job failed
    JobFailed,
    /// Caller used the session out of order
    InvalidPhase,
}

/// Failure while turning a page URL into a `MediaInfo`
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("Invalid URL: {0}")]
    InvalidInput(String),

    #[error("{}", upstream_message(.url, .status, .reason))]
    UpstreamUnavailable {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("No media found at {0}")]
    NoMediaFound(String),
}

impl ResolutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::NoMediaFound(_) => ErrorKind::NoMediaFound,
        }
    }

    /// Only upstream trouble is worth a manual retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    pub(crate) fn upstream(url: &str, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            url: url.to_string(),
            status,
            reason: reason.into(),
        }
    }
}

fn upstream_message(url: &str, status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("Upstream returned {} for {}: {}", code, url, reason),
        None => format!("Upstream unreachable for {}: {}", url, reason),
    }
}

/// Failure while asking the backend to start a job
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("Invalid download request: {0}")]
    InvalidInput(String),

    #[error("Backend rejected the download (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Malformed submission response: {0}")]
    MalformedResponse(String),
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::SubmissionError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Failure of a single status check
#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Transport or decoding failure; `attempt` counts consecutive failures
    #[error("Status check {attempt} for job {job_id} failed: {message}")]
    Transport {
        job_id: String,
        attempt: u32,
        message: String,
    },
}

impl PollError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PollError
    }

    /// Transport failures are retried by the coordinator until the budget runs out
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Raw failure reported by a `JobBackend` implementation
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Malformed(String),
}

impl From<BackendError> for SubmissionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, message } => Self::Rejected { status, message },
            BackendError::Transport(msg) => Self::Transport(msg),
            BackendError::Malformed(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// Error surfaced at the session boundary
#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Invalid selection: {0}")]
    InvalidInput(String),

    #[error("Cannot {action} while session is {phase}")]
    InvalidPhase { action: &'static str, phase: String },

    #[error("Download failed: {message}")]
    JobFailed { timed_out: bool, message: String },

    #[error("Stream failed: {0}")]
    Stream(String),

    #[error("No job backend configured; only direct streaming is available")]
    NoBackend,
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution(e) => e.kind(),
            Self::Submission(e) => e.kind(),
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidPhase { .. } => ErrorKind::InvalidPhase,
            Self::JobFailed { timed_out: true, .. } => ErrorKind::PollTimeout,
            Self::JobFailed { .. } => ErrorKind::JobFailed,
            Self::NoBackend => ErrorKind::InvalidInput,
            Self::Stream(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Resolution(e) => e.is_retryable(),
            Self::Stream(_) => true,
            _ => false,
        }
    }

    /// Message suitable for showing to the person who pasted the URL
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolution(ResolutionError::InvalidInput(_)) => {
                "That does not look like a valid URL. Please check it and try again.".to_string()
            }
            Self::Resolution(ResolutionError::UpstreamUnavailable { .. }) => format!(
                "Failed to fetch the page. Please check the URL and try again.\n\nDetails: {}",
                self
            ),
            Self::Resolution(ResolutionError::NoMediaFound(_)) => {
                "No downloadable video was found on that page.".to_string()
            }
            Self::Submission(_) => format!(
                "The download could not be started. Pick another quality or try again.\n\nDetails: {}",
                self
            ),
            other => other.to_string(),
        }
    }
}

/// Invalid configuration value
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);
