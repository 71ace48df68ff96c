//! Stage-by-stage pipeline executor.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{JobError, Stage, StageError};
use super::traits::{
    ArtifactGenerator, ClipExtractor, MediaAcquirer, PipelineExecutor, Segmenter, SourceResolver,
    Transcriber,
};
use super::types::{
    unit_record_name, ArtifactRef, ArtifactRequest, JobOutput, MediaHandle, ResolvedSource,
    TranscriptionMode, Unit, UnitFailure, UnitRecord,
};
use crate::batch::WorkItem;
use crate::dedup::source_key;
use crate::metrics;
use crate::progress::JobProgress;
use crate::store::RecordStore;

/// Runs resolve, acquire, transcribe and segment, then extract, artifact and
/// persist for every unit.
///
/// Unit failures are isolated: a failing unit is dropped and its siblings
/// continue. Artifact failures only degrade the unit. A job with units but
/// none that survive is errored.
pub struct StagedExecutor {
    resolver: Arc<dyn SourceResolver>,
    acquirer: Arc<dyn MediaAcquirer>,
    transcriber: Arc<dyn Transcriber>,
    segmenter: Arc<dyn Segmenter>,
    extractor: Arc<dyn ClipExtractor>,
    artifacts: Vec<Arc<dyn ArtifactGenerator>>,
    store: Arc<dyn RecordStore>,
    mode: TranscriptionMode,
}

impl StagedExecutor {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        acquirer: Arc<dyn MediaAcquirer>,
        transcriber: Arc<dyn Transcriber>,
        segmenter: Arc<dyn Segmenter>,
        extractor: Arc<dyn ClipExtractor>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            resolver,
            acquirer,
            transcriber,
            segmenter,
            extractor,
            artifacts: Vec::new(),
            store,
            mode: TranscriptionMode::default(),
        }
    }

    /// Adds a best-effort artifact generator.
    pub fn with_artifact(mut self, generator: Arc<dyn ArtifactGenerator>) -> Self {
        self.artifacts.push(generator);
        self
    }

    pub fn with_mode(mut self, mode: TranscriptionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> TranscriptionMode {
        self.mode
    }

    async fn process_unit(
        &self,
        item: &WorkItem,
        source: &ResolvedSource,
        media: &MediaHandle,
        unit: &Unit,
        position: usize,
        progress: &JobProgress,
    ) -> Result<UnitRecord, StageError> {
        let name = unit_record_name(&source.id, position, &unit.title);
        let clip_path = self.extractor.extract(media, unit, &name).await?;

        let mut artifacts = Vec::new();
        for generator in &self.artifacts {
            progress.enter(Stage::Artifact, &format!("{} for {}", generator.kind(), name));
            let request = ArtifactRequest {
                name: &name,
                unit,
                clip_path: &clip_path,
            };
            match generator.generate(&request).await {
                Ok(path) => artifacts.push(ArtifactRef {
                    kind: generator.kind().to_string(),
                    path,
                }),
                Err(e) => {
                    metrics::ARTIFACT_FAILURES
                        .with_label_values(&[generator.kind()])
                        .inc();
                    warn!(unit = %name, kind = generator.kind(), error = %e, "Artifact generation failed");
                }
            }
        }

        let record = UnitRecord {
            name: name.clone(),
            source_id: source.id.clone(),
            source_key: source_key(&item.source_ref),
            source_ref: item.source_ref.clone(),
            source_title: source.title.clone(),
            position,
            title: unit.title.clone(),
            description: unit.description.clone(),
            tags: unit.tags.clone(),
            start: unit.start,
            end: unit.end,
            clip_path,
            artifacts,
            created_at: Utc::now(),
        };

        progress.enter(Stage::Persist, &format!("saving {}", name));
        self.store
            .save(&name, &record)
            .await
            .map_err(|e| StageError::new(Stage::Persist, e.to_string()))?;
        metrics::UNITS_PERSISTED.inc();

        Ok(record)
    }
}

#[async_trait]
impl PipelineExecutor for StagedExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        progress: &JobProgress,
    ) -> Result<JobOutput, JobError> {
        let fail = |source_id: Option<&str>, error: StageError| {
            JobError::from_stage(&item.source_ref, source_id.map(str::to_string), error)
        };

        progress.enter(Stage::Resolve, "resolving");
        let source = self
            .resolver
            .resolve(&item.source_ref)
            .await
            .map_err(|e| fail(None, e))?;
        let id = Some(source.id.as_str());

        progress.enter(Stage::Acquire, &format!("downloading {}", source.title));
        let media = self
            .acquirer
            .acquire(&source)
            .await
            .map_err(|e| fail(id, e))?;

        progress.enter(Stage::Transcribe, &format!("transcribing ({})", self.mode.as_str()));
        let transcript = self
            .transcriber
            .transcribe(&media, self.mode)
            .await
            .map_err(|e| fail(id, e))?;

        progress.enter(Stage::Segment, "segmenting");
        let units = self
            .segmenter
            .segment(&transcript.segments, &transcript.full_text())
            .await
            .map_err(|e| fail(id, e))?;
        if units.is_empty() {
            return Err(fail(
                id,
                StageError::new(Stage::Segment, "segmentation produced no units"),
            ));
        }
        debug!(source_id = %source.id, units = units.len(), "Segmented");

        let total = units.len();
        let mut records = Vec::with_capacity(total);
        let mut failed_units = Vec::new();
        for (i, unit) in units.iter().enumerate() {
            let position = i + 1;
            progress.enter(
                Stage::Extract,
                &format!("unit {}/{}: {}", position, total, unit.title),
            );
            let outcome = self
                .process_unit(item, &source, &media, unit, position, progress)
                .await;
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    metrics::UNIT_FAILURES
                        .with_label_values(&[e.stage.as_str()])
                        .inc();
                    warn!(
                        source_id = %source.id,
                        position,
                        stage = %e.stage,
                        error = %e.message,
                        "Unit failed"
                    );
                    failed_units.push(UnitFailure {
                        position,
                        title: unit.title.clone(),
                        stage: e.stage,
                        message: e.message,
                    });
                }
            }
        }

        if records.is_empty() {
            return Err(fail(
                id,
                StageError::new(Stage::Extract, format!("all {} units failed", total)),
            ));
        }

        info!(
            source_id = %source.id,
            units = records.len(),
            failed = failed_units.len(),
            "Job processed"
        );

        Ok(JobOutput {
            source_id: source.id.clone(),
            title: source.title.clone(),
            units: records,
            failed_units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FailureCategory;
    use crate::progress::ProgressReporter;
    use crate::testing::{fixtures, MockRecordStore, MockStages};

    fn executor(stages: &MockStages, store: &Arc<MockRecordStore>) -> StagedExecutor {
        stages.executor(store.clone())
    }

    #[tokio::test]
    async fn test_happy_path_persists_every_unit() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(3)).await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "https://youtu.be/dQw4w9WgXcQ");
        let output = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap();

        assert_eq!(output.source_id, "dQw4w9WgXcQ");
        assert_eq!(output.units.len(), 3);
        assert!(output.failed_units.is_empty());
        assert_eq!(output.units[0].name, "dQw4w9WgXcQ_01_unit-1");
        assert_eq!(output.units[2].position, 3);
        assert_eq!(store.saved_names().await.len(), 3);
        assert_eq!(output.units[0].artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_artifact_and_persist_stages() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(1)).await;
        let store = Arc::new(MockRecordStore::new());
        let reporter = Arc::new(ProgressReporter::hidden());
        let progress = JobProgress::register(Arc::clone(&reporter), "job-0", "job-0");

        let item = WorkItem::new(0, "https://youtu.be/dQw4w9WgXcQ");
        executor(&stages, &store)
            .execute(&item, &progress)
            .await
            .unwrap();

        assert_eq!(progress.current_stage(), Some(Stage::Persist));
        assert_eq!(
            reporter.line("job-0").unwrap().last_rendered_text,
            "job-0 [persist] saving dQw4w9WgXcQ_01_unit-1"
        );
    }

    #[tokio::test]
    async fn test_record_keeps_dedup_key_of_reference() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(1)).await;
        stages
            .set_resolved_id("https://vimeo.com/987654321", "987654321")
            .await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "https://vimeo.com/987654321");
        let output = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap();

        let record = &output.units[0];
        assert_eq!(record.source_id, "987654321");
        assert_eq!(record.source_key, "https://vimeo.com/987654321");
        assert!(record.is_for_source("987654321"));
        assert!(record.is_for_source("https://vimeo.com/987654321"));
    }

    #[tokio::test]
    async fn test_resolve_failure_has_no_source_id() {
        let stages = MockStages::new();
        stages
            .fail_stage(StageError::age_restricted(Stage::Resolve, "Sign in to confirm your age"))
            .await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        let err = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Resolve);
        assert_eq!(err.category, FailureCategory::AgeRestricted);
        assert!(err.source_id.is_none());
        assert_eq!(stages.calls(Stage::Acquire).await, 0);
    }

    #[tokio::test]
    async fn test_stage_failure_carries_job_context() {
        let stages = MockStages::new();
        stages
            .fail_stage(StageError::source_blocked(Stage::Acquire, "HTTP Error 403: Forbidden"))
            .await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(4, "https://youtu.be/dQw4w9WgXcQ");
        let err = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-4"))
            .await
            .unwrap_err();

        assert_eq!(err.source_ref, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(err.source_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(err.short_reason(), "blocked by source");
        assert_eq!(stages.calls(Stage::Transcribe).await, 0);
    }

    #[tokio::test]
    async fn test_unit_failure_is_isolated() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(3)).await;
        stages.fail_unit_extraction("Unit 2").await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        let output = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap();

        assert_eq!(output.units.len(), 2);
        assert_eq!(output.failed_units.len(), 1);
        assert_eq!(output.failed_units[0].position, 2);
        assert_eq!(output.failed_units[0].stage, Stage::Extract);
        let positions: Vec<usize> = output.units.iter().map(|u| u.position).collect();
        assert_eq!(positions, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_artifact_failure_degrades_unit() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(1)).await;
        stages.fail_artifacts(true).await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        let output = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap();

        assert_eq!(output.units.len(), 1);
        assert!(output.units[0].artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_all_units_failing_errors_job() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(2)).await;
        let store = Arc::new(MockRecordStore::new());
        store
            .set_next_errors(2, "records dir is read-only")
            .await;

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        let err = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Extract);
        assert_eq!(err.message, "all 2 units failed");
    }

    #[tokio::test]
    async fn test_no_units_errors_at_segment() {
        let stages = MockStages::new();
        stages.set_units(Vec::new()).await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        let err = executor(&stages, &store)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Segment);
    }

    #[tokio::test]
    async fn test_transcription_mode_forwarded() {
        let stages = MockStages::new();
        stages.set_units(fixtures::units(1)).await;
        let store = Arc::new(MockRecordStore::new());

        let item = WorkItem::new(0, "dQw4w9WgXcQ");
        executor(&stages, &store)
            .with_mode(TranscriptionMode::Diarized)
            .execute(&item, &JobProgress::detached("job-0"))
            .await
            .unwrap();

        assert_eq!(
            stages.transcription_modes().await,
            vec![TranscriptionMode::Diarized]
        );
    }
}
