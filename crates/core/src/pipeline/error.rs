//! Error types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Admission checks before any pipeline work.
    Dedup,
    /// Source resolution.
    Resolve,
    /// Media download.
    Acquire,
    /// Transcription.
    Transcribe,
    /// Segmentation into units.
    Segment,
    /// Clip extraction for a unit.
    Extract,
    /// Secondary artifact generation for a unit.
    Artifact,
    /// Metadata record persistence.
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dedup => "dedup",
            Stage::Resolve => "resolve",
            Stage::Acquire => "acquire",
            Stage::Transcribe => "transcribe",
            Stage::Segment => "segment",
            Stage::Extract => "extract",
            Stage::Artifact => "artifact",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure category reported by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The source requires age verification.
    AgeRestricted,
    /// The source refused access (e.g. HTTP 403).
    SourceBlocked,
    /// The job exceeded its time budget and was abandoned.
    TimedOut,
    /// Anything not covered by a more specific category.
    Generic,
}

impl FailureCategory {
    /// Short, user-facing reason for this category.
    pub fn short_reason(&self) -> &'static str {
        match self {
            FailureCategory::AgeRestricted => "requires age verification",
            FailureCategory::SourceBlocked => "blocked by source",
            FailureCategory::TimedOut => "timed out",
            FailureCategory::Generic => "processing failed",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::AgeRestricted => "age_restricted",
            FailureCategory::SourceBlocked => "source_blocked",
            FailureCategory::TimedOut => "timed_out",
            FailureCategory::Generic => "generic",
        }
    }
}

/// Error returned by a single collaborator stage.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub category: FailureCategory,
    pub message: String,
}

impl StageError {
    /// Creates an unclassified stage failure.
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            category: FailureCategory::Generic,
            message: message.into(),
        }
    }

    /// Creates a failure caused by an age-verification requirement.
    pub fn age_restricted(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, message).with_category(FailureCategory::AgeRestricted)
    }

    /// Creates a failure caused by the source refusing access.
    pub fn source_blocked(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, message).with_category(FailureCategory::SourceBlocked)
    }

    /// Creates a timeout failure.
    pub fn timed_out(stage: Stage, timeout_secs: u64) -> Self {
        Self::new(stage, format!("timed out after {} seconds", timeout_secs))
            .with_category(FailureCategory::TimedOut)
    }

    pub fn with_category(mut self, category: FailureCategory) -> Self {
        self.category = category;
        self
    }
}

/// A stage failure wrapped with job context.
///
/// This is what a failed job reports in its `JobResult`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{source_ref} ({}): {stage} failed: {message}", .source_id.as_deref().unwrap_or("unresolved"))]
pub struct JobError {
    /// The submitted reference.
    pub source_ref: String,
    /// The resolved source id, if resolution got that far.
    pub source_id: Option<String>,
    pub stage: Stage,
    pub category: FailureCategory,
    pub message: String,
}

impl JobError {
    /// Wraps a stage error with the job's reference and id.
    pub fn from_stage(
        source_ref: impl Into<String>,
        source_id: Option<String>,
        error: StageError,
    ) -> Self {
        Self {
            source_ref: source_ref.into(),
            source_id,
            stage: error.stage,
            category: error.category,
            message: error.message,
        }
    }

    /// Short, user-facing reason derived from the category.
    pub fn short_reason(&self) -> &'static str {
        self.category.short_reason()
    }
}
