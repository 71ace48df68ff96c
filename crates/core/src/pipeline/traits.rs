//! Collaborator traits for the pipeline stages.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::{JobError, StageError};
use super::types::{
    ArtifactRequest, JobOutput, MediaHandle, ResolvedSource, Transcript, TranscriptSegment,
    TranscriptionMode, Unit,
};
use crate::batch::WorkItem;
use crate::progress::JobProgress;

/// Resolves a submitted reference to a concrete source.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, source_ref: &str) -> Result<ResolvedSource, StageError>;
}

/// Downloads the media for a resolved source.
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    async fn acquire(&self, source: &ResolvedSource) -> Result<MediaHandle, StageError>;
}

/// Produces a timed transcript from acquired media.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        media: &MediaHandle,
        mode: TranscriptionMode,
    ) -> Result<Transcript, StageError>;
}

/// Splits a transcript into ordered units.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(
        &self,
        segments: &[TranscriptSegment],
        full_text: &str,
    ) -> Result<Vec<Unit>, StageError>;
}

/// Cuts the media span of one unit into its own clip.
#[async_trait]
pub trait ClipExtractor: Send + Sync {
    /// Extracts `unit` from `media` and returns the clip path.
    async fn extract(
        &self,
        media: &MediaHandle,
        unit: &Unit,
        name: &str,
    ) -> Result<PathBuf, StageError>;
}

/// Best-effort secondary artifact for a unit (image, preview, ...).
///
/// A failure here degrades the unit but never fails it.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Short kind label stored on the unit record.
    fn kind(&self) -> &str;

    async fn generate(&self, request: &ArtifactRequest<'_>) -> Result<PathBuf, StageError>;
}

/// Runs one admitted work item through every stage.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(&self, item: &WorkItem, progress: &JobProgress)
        -> Result<JobOutput, JobError>;
}
