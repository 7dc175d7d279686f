// Common data models for acquisition

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::OffsetDateTime;

use super::errors::ResolutionError;

/// Format id used when a page only yields one raw media URL
pub const DIRECT_FORMAT_ID: &str = "direct";

/// Normalized description of a resolved video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub thumbnail_url: String,
    /// 0 means unknown or live
    pub duration_seconds: f64,
    /// Location handed to the job backend as the download source
    pub source_url: String,
    /// Presentation order, best first
    pub encodings: Vec<EncodingOption>,
}

impl MediaInfo {
    /// Build the single-encoding info produced by the scrape path
    pub fn single_source(media_url: &str, title: &str, uploader: &str, thumbnail: &str) -> Self {
        let container = container_from_url(media_url);
        Self {
            id: media_url.to_string(),
            title: title.to_string(),
            uploader: uploader.to_string(),
            thumbnail_url: thumbnail.to_string(),
            duration_seconds: 0.0,
            source_url: media_url.to_string(),
            encodings: vec![EncodingOption {
                format_id: DIRECT_FORMAT_ID.to_string(),
                resolution: String::new(),
                size_bytes: 0,
                container,
                direct_url: Some(media_url.to_string()),
            }],
        }
    }

    /// Normalize a metadata-service answer.
    ///
    /// Duplicate format ids keep their first occurrence. A response without
    /// any usable format is `NoMediaFound`, never an empty success.
    pub fn from_response(response: InfoResponse, page_url: &str) -> Result<Self, ResolutionError> {
        let mut seen = HashSet::new();
        let encodings: Vec<EncodingOption> = response
            .formats
            .into_iter()
            .filter(|f| !f.format_id.is_empty())
            .filter(|f| seen.insert(f.format_id.clone()))
            .map(EncodingOption::from)
            .collect();

        if encodings.is_empty() {
            return Err(ResolutionError::NoMediaFound(page_url.to_string()));
        }

        let duration_seconds = response
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);

        Ok(Self {
            id: response.id,
            title: response.title,
            uploader: response.uploader,
            thumbnail_url: response.thumbnail,
            duration_seconds,
            source_url: response
                .webpage_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| page_url.to_string()),
            encodings,
        })
    }

    pub fn encoding(&self, format_id: &str) -> Option<&EncodingOption> {
        self.encodings.iter().find(|e| e.format_id == format_id)
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }
}

/// One rendition of a source video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingOption {
    pub format_id: String,
    /// e.g. "1080p"; empty for audio-only
    pub resolution: String,
    /// 0 when unknown
    pub size_bytes: u64,
    pub container: String,
    /// Directly fetchable location, when the resolver learned one
    pub direct_url: Option<String>,
}

impl EncodingOption {
    pub fn is_audio_only(&self) -> bool {
        self.resolution.is_empty() || self.resolution == "audio only"
    }
}

impl From<FormatEntry> for EncodingOption {
    fn from(f: FormatEntry) -> Self {
        Self {
            format_id: f.format_id,
            resolution: f.resolution.unwrap_or_default(),
            size_bytes: f.filesize.or(f.filesize_approx).unwrap_or(0),
            container: f.ext,
            direct_url: f.url.filter(|u| !u.is_empty()),
        }
    }
}

fn container_from_url(media_url: &str) -> String {
    let path = media_url
        .split(['?', '#'])
        .next()
        .unwrap_or(media_url);
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "mp4".to_string())
}

/// Time range `[start, end)` in seconds applied to the output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimSpec {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TrimSpec {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    /// Range checks that do not need the media duration
    pub fn validate(&self) -> Result<(), String> {
        if !self.start_seconds.is_finite() || !self.end_seconds.is_finite() {
            return Err("trim bounds must be finite numbers".to_string());
        }
        if self.start_seconds < 0.0 {
            return Err(format!(
                "trim start {} must not be negative",
                self.start_seconds
            ));
        }
        if self.end_seconds <= self.start_seconds {
            return Err(format!(
                "trim end {} must be after start {}",
                self.end_seconds, self.start_seconds
            ));
        }
        Ok(())
    }

    /// Full check against the video it will be applied to
    pub fn validate_for(&self, info: &MediaInfo) -> Result<(), String> {
        self.validate()?;
        if info.has_known_duration() && self.end_seconds > info.duration_seconds {
            return Err(format!(
                "trim end {} exceeds video duration {}",
                self.end_seconds, info.duration_seconds
            ));
        }
        Ok(())
    }

    pub fn length(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Backend job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The backend reported the failure
    Reported,
    /// Too many consecutive status checks failed
    PollTimeout,
}

/// A backend-tracked download/transcode job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub job_id: String,
    pub state: JobState,
    pub result_url: Option<String>,
    pub result_filename: Option<String>,
    pub error_message: Option<String>,
    pub failure: Option<FailureKind>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_polled_at: Option<OffsetDateTime>,
    /// Status checks issued against the backend
    pub polls: u32,
    pub consecutive_failures: u32,
}

impl DownloadJob {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Queued,
            result_url: None,
            result_filename: None,
            error_message: None,
            failure: None,
            created_at: OffsetDateTime::now_utc(),
            last_polled_at: None,
            polls: 0,
            consecutive_failures: 0,
        }
    }

    /// Apply one status response. Terminal jobs are left untouched.
    pub fn apply_status(&mut self, status: &StatusResponse) -> Result<(), String> {
        if self.state.is_terminal() {
            return Ok(());
        }
        match status.status.to_ascii_lowercase().as_str() {
            "queued" | "pending" => {}
            "processing" | "downloading" | "running" => self.state = JobState::Processing,
            "completed" | "complete" | "done" => {
                self.state = JobState::Completed;
                self.result_url = status.url.clone();
                self.result_filename = status.filename.clone();
            }
            "failed" | "error" => {
                let message = status
                    .error
                    .clone()
                    .unwrap_or_else(|| "Backend reported failure".to_string());
                self.fail(FailureKind::Reported, message);
            }
            other => return Err(format!("unknown job status '{}'", other)),
        }
        Ok(())
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.failure = Some(kind);
        self.error_message = Some(message.into());
    }

    pub fn timed_out(&self) -> bool {
        self.failure == Some(FailureKind::PollTimeout)
    }
}

/// Metadata service answer
///
/// Services send `null` as freely as they omit keys; both decode to the
/// field's default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uploader: String,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<FormatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub format_id: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ext: String,
    #[serde(default)]
    pub url: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a download submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub url: &'a str,
    pub format_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl<'a> SubmitRequest<'a> {
    pub fn new(url: &'a str, format_id: &'a str, trim: Option<&TrimSpec>) -> Self {
        Self {
            url,
            format_id,
            start_time: trim.map(|t| t.start_seconds),
            end_time: trim.map(|t| t.end_seconds),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "downloadId")]
    pub download_id: JobId,
}

/// Job ids arrive as strings or bare numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Text(String),
    Number(u64),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Job status answer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn processing() -> Self {
        Self {
            status: "processing".to_string(),
            ..Default::default()
        }
    }

    pub fn completed(url: &str, filename: Option<&str>) -> Self {
        Self {
            status: "completed".to_string(),
            url: Some(url.to_string()),
            filename: filename.map(str::to_string),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            status: "failed".to_string(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}
