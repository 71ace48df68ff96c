//! Pipeline stages for one admitted job.
//!
//! Each stage is a collaborator trait so tool integrations stay swappable.
//! [`StagedExecutor`] drives them in order: resolve, acquire, transcribe,
//! segment, then extract / artifact / persist per unit.
//!
//! Collaborators report *typed* failure categories through [`StageError`];
//! the executor never inspects error text.

mod error;
mod executor;
mod traits;
mod types;

pub use error::{FailureCategory, JobError, Stage, StageError};
pub use executor::StagedExecutor;
pub use traits::{
    ArtifactGenerator, ClipExtractor, MediaAcquirer, PipelineExecutor, Segmenter, SourceResolver,
    Transcriber,
};
pub use types::{
    slugify, unit_record_name, ArtifactRef, ArtifactRequest, JobOutput, MediaHandle,
    ResolvedSource, Transcript, TranscriptSegment, TranscriptionMode, Unit, UnitFailure,
    UnitRecord,
};
