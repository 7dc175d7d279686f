// FormatSelector - presentation helpers for resolved encodings
//
// Turns a MediaInfo into the choices shown to the user:
// - the first few encodings, in the resolver's priority order
// - the default selection (first encoding)
// - size and duration labels
// - the default trim window (whole video)

use serde::{Deserialize, Serialize};

use super::models::{EncodingOption, MediaInfo, TrimSpec};

/// How many encodings are offered at once
pub const MAX_PRESENTED: usize = 6;

/// One selectable entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Value passed back on selection
    pub format_id: String,

    /// Display label (e.g., "1080p" or "Audio")
    pub label: String,

    /// e.g. "12.5 MB • MP4"
    pub detail: String,

    pub is_audio: bool,

    /// Preselected entry
    pub is_default: bool,
}

pub struct FormatSelector;

impl FormatSelector {
    /// Options for display, best first
    pub fn build_quality_options(info: &MediaInfo) -> Vec<QualityOption> {
        info.encodings
            .iter()
            .take(MAX_PRESENTED)
            .enumerate()
            .map(|(i, enc)| QualityOption {
                format_id: enc.format_id.clone(),
                label: Self::label(enc),
                detail: format!(
                    "{} • {}",
                    Self::format_size(enc.size_bytes),
                    enc.container.to_uppercase()
                ),
                is_audio: enc.is_audio_only(),
                is_default: i == 0,
            })
            .collect()
    }

    pub fn default_selection(info: &MediaInfo) -> Option<&str> {
        info.encodings.first().map(|e| e.format_id.as_str())
    }

    /// Whole-video window, or `None` when the duration is unknown
    pub fn default_trim(info: &MediaInfo) -> Option<TrimSpec> {
        info.has_known_duration()
            .then(|| TrimSpec::new(0.0, info.duration_seconds))
    }

    fn label(enc: &EncodingOption) -> String {
        if enc.resolution.is_empty() {
            "Audio".to_string()
        } else {
            enc.resolution.clone()
        }
    }

    /// "N/A" when unknown, otherwise megabytes with one decimal
    pub fn format_size(bytes: u64) -> String {
        if bytes == 0 {
            return "N/A".to_string();
        }
        let mb = bytes as f64 / 1_048_576.0;
        format!("{:.1} MB", mb)
    }

    /// `m:ss`
    pub fn format_duration(seconds: f64) -> String {
        let total = if seconds.is_finite() && seconds > 0.0 {
            seconds.floor() as u64
        } else {
            0
        };
        format!("{}:{:02}", total / 60, total % 60)
    }
}
