//! Types flowing between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::Stage;

/// A source resolved from a submitted reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Stable source id (the dedup key once resolved).
    pub id: String,
    /// Human readable title.
    pub title: String,
    /// Canonical URL or locator used for acquisition.
    pub locator: String,
    /// Duration in seconds, when the resolver knows it.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// Handle to acquired media on local storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHandle {
    pub source_id: String,
    pub path: PathBuf,
}

/// Transcription provider mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    /// Locally hosted model.
    #[default]
    Local,
    /// Hosted transcription service.
    Cloud,
    /// Hosted service with speaker diarization.
    Diarized,
}

impl TranscriptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionMode::Local => "local",
            TranscriptionMode::Cloud => "cloud",
            TranscriptionMode::Diarized => "diarized",
        }
    }
}

/// One timed span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Output of the transcription stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub speakers: Vec<String>,
}

impl Transcript {
    /// Concatenated text of all segments, space separated.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One unit produced by segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub start: f64,
    pub end: f64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Unit {
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Input handed to an artifact generator for one extracted unit.
#[derive(Debug, Clone)]
pub struct ArtifactRequest<'a> {
    /// Record name of the unit.
    pub name: &'a str,
    pub unit: &'a Unit,
    /// Path of the extracted clip.
    pub clip_path: &'a std::path::Path,
}

/// A secondary artifact attached to a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Generator kind (e.g. "thumbnail").
    pub kind: String,
    pub path: PathBuf,
}

/// Persisted metadata record for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Record name, `{source_id}_{NN}_{slug}`.
    pub name: String,
    pub source_id: String,
    /// Offline dedup key of `source_ref`. Differs from `source_id` when the
    /// reference is not a recognised video URL.
    #[serde(default)]
    pub source_key: String,
    pub source_ref: String,
    pub source_title: String,
    /// 1-based position of the unit within its source.
    pub position: usize,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub start: f64,
    pub end: f64,
    pub clip_path: PathBuf,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    pub created_at: DateTime<Utc>,
}

impl UnitRecord {
    /// Whether this record belongs to the source identified by `id`, either
    /// its resolved id or the dedup key of the submitted reference.
    pub fn is_for_source(&self, id: &str) -> bool {
        self.source_id == id || (!self.source_key.is_empty() && self.source_key == id)
    }
}

/// A unit that failed inside an otherwise successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub position: usize,
    pub title: String,
    pub stage: Stage,
    pub message: String,
}

/// Payload of a processed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub source_id: String,
    pub title: String,
    pub units: Vec<UnitRecord>,
    #[serde(default)]
    pub failed_units: Vec<UnitFailure>,
}

/// Lowercase ASCII slug with `-` separators, capped at `max_len` bytes.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }

    slug.truncate(max_len);
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Record name for the unit at `position` (1-based) of a source.
pub fn unit_record_name(source_id: &str, position: usize, title: &str) -> String {
    format!("{}_{:02}_{}", source_id, position, slugify(title, 48))
}
