//! Mock pipeline stages for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::dedup::source_key;
use crate::pipeline::{
    ArtifactGenerator, ArtifactRequest, ClipExtractor, MediaAcquirer, MediaHandle,
    ResolvedSource, Segmenter, SourceResolver, Stage, StageError, StagedExecutor, Transcriber,
    Transcript, TranscriptSegment, TranscriptionMode, Unit,
};
use crate::store::RecordStore;

/// Mock implementation of every pipeline stage trait.
///
/// One value plays resolver, acquirer, transcriber, segmenter, clip extractor
/// and artifact generator. Clones share state, so a test keeps a handle for
/// assertions while the executor owns the others.
///
/// Provides controllable behavior for testing:
/// - Per-stage call counts
/// - Failures for every job or for one reference
/// - Per-unit extraction failures
/// - Simulated stage latency
#[derive(Debug, Clone)]
pub struct MockStages {
    /// Calls per stage.
    calls: Arc<RwLock<HashMap<Stage, usize>>>,
    /// Units returned by the segmenter.
    units: Arc<RwLock<Vec<Unit>>>,
    /// Failure applied to every job at its stage.
    stage_failure: Arc<RwLock<Option<StageError>>>,
    /// Failures applied to one source id at their stage.
    ref_failures: Arc<RwLock<HashMap<String, StageError>>>,
    /// Unit titles whose extraction fails.
    failing_units: Arc<RwLock<Vec<String>>>,
    /// Whether artifact generation fails.
    fail_artifacts: Arc<RwLock<bool>>,
    /// Modes passed to the transcriber.
    modes: Arc<RwLock<Vec<TranscriptionMode>>>,
    /// Simulated acquisition latency.
    acquire_delay_ms: Arc<RwLock<u64>>,
    /// Resolved ids that differ from the reference's dedup key.
    resolved_ids: Arc<RwLock<HashMap<String, String>>>,
}

impl Default for MockStages {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStages {
    /// Create mock stages that yield two units per job.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(HashMap::new())),
            units: Arc::new(RwLock::new(super::fixtures::units(2))),
            stage_failure: Arc::new(RwLock::new(None)),
            ref_failures: Arc::new(RwLock::new(HashMap::new())),
            failing_units: Arc::new(RwLock::new(Vec::new())),
            fail_artifacts: Arc::new(RwLock::new(false)),
            modes: Arc::new(RwLock::new(Vec::new())),
            acquire_delay_ms: Arc::new(RwLock::new(0)),
            resolved_ids: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Builds a [`StagedExecutor`] backed by these stages.
    pub fn executor(&self, store: Arc<dyn RecordStore>) -> StagedExecutor {
        StagedExecutor::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            store,
        )
        .with_artifact(Arc::new(self.clone()))
    }

    /// Set the units returned by segmentation.
    pub async fn set_units(&self, units: Vec<Unit>) {
        *self.units.write().await = units;
    }

    /// Fail every job at `error.stage`.
    pub async fn fail_stage(&self, error: StageError) {
        *self.stage_failure.write().await = Some(error);
    }

    /// Fail jobs for `source_ref` at `error.stage`.
    pub async fn fail_ref(&self, source_ref: &str, error: StageError) {
        self.ref_failures
            .write()
            .await
            .insert(source_key(source_ref), error);
    }

    /// Resolve `source_ref` to `id` instead of its dedup key.
    pub async fn set_resolved_id(&self, source_ref: &str, id: &str) {
        self.resolved_ids
            .write()
            .await
            .insert(source_ref.to_string(), id.to_string());
    }

    /// Fail extraction of the unit titled `title`.
    pub async fn fail_unit_extraction(&self, title: &str) {
        self.failing_units.write().await.push(title.to_string());
    }

    pub async fn fail_artifacts(&self, fail: bool) {
        *self.fail_artifacts.write().await = fail;
    }

    /// Set the simulated acquisition duration.
    pub async fn set_acquire_delay(&self, delay: Duration) {
        *self.acquire_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Number of calls made to `stage`.
    pub async fn calls(&self, stage: Stage) -> usize {
        self.calls.read().await.get(&stage).copied().unwrap_or(0)
    }

    pub async fn transcription_modes(&self) -> Vec<TranscriptionMode> {
        self.modes.read().await.clone()
    }

    /// Counts the call and returns any failure configured for it.
    ///
    /// Per-reference failures are keyed by source id.
    async fn enter(&self, stage: Stage, source_id: &str) -> Result<(), StageError> {
        *self.calls.write().await.entry(stage).or_insert(0) += 1;

        if let Some(error) = self.ref_failures.read().await.get(source_id) {
            if error.stage == stage {
                return Err(error.clone());
            }
        }
        if let Some(error) = self.stage_failure.read().await.as_ref() {
            if error.stage == stage {
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceResolver for MockStages {
    async fn resolve(&self, source_ref: &str) -> Result<ResolvedSource, StageError> {
        let key = source_key(source_ref);
        self.enter(Stage::Resolve, &key).await?;
        let id = self
            .resolved_ids
            .read()
            .await
            .get(source_ref)
            .cloned()
            .unwrap_or(key);
        Ok(ResolvedSource {
            title: format!("Title {}", id),
            locator: format!("https://www.youtube.com/watch?v={}", id),
            id,
            duration_secs: Some(600.0),
        })
    }
}

#[async_trait]
impl MediaAcquirer for MockStages {
    async fn acquire(&self, source: &ResolvedSource) -> Result<MediaHandle, StageError> {
        self.enter(Stage::Acquire, &source.id).await?;

        let delay = *self.acquire_delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(MediaHandle {
            source_id: source.id.clone(),
            path: PathBuf::from(format!("/media/{}.m4a", source.id)),
        })
    }
}

#[async_trait]
impl Transcriber for MockStages {
    async fn transcribe(
        &self,
        media: &MediaHandle,
        mode: TranscriptionMode,
    ) -> Result<Transcript, StageError> {
        self.enter(Stage::Transcribe, &media.source_id).await?;
        self.modes.write().await.push(mode);
        Ok(Transcript {
            segments: vec![
                TranscriptSegment {
                    start: 0.0,
                    end: 30.0,
                    text: "first part".to_string(),
                },
                TranscriptSegment {
                    start: 30.0,
                    end: 60.0,
                    text: "second part".to_string(),
                },
            ],
            speakers: vec!["SPEAKER_00".to_string()],
        })
    }
}

#[async_trait]
impl Segmenter for MockStages {
    async fn segment(
        &self,
        _segments: &[TranscriptSegment],
        _full_text: &str,
    ) -> Result<Vec<Unit>, StageError> {
        self.enter(Stage::Segment, "").await?;
        Ok(self.units.read().await.clone())
    }
}

#[async_trait]
impl ClipExtractor for MockStages {
    async fn extract(
        &self,
        media: &MediaHandle,
        unit: &Unit,
        name: &str,
    ) -> Result<PathBuf, StageError> {
        self.enter(Stage::Extract, &media.source_id).await?;
        if self.failing_units.read().await.contains(&unit.title) {
            return Err(StageError::new(
                Stage::Extract,
                format!("ffmpeg exited with status 1 for {}", unit.title),
            ));
        }
        Ok(PathBuf::from(format!("/clips/{}.mp4", name)))
    }
}

#[async_trait]
impl ArtifactGenerator for MockStages {
    fn kind(&self) -> &str {
        "thumbnail"
    }

    async fn generate(&self, request: &ArtifactRequest<'_>) -> Result<PathBuf, StageError> {
        self.enter(Stage::Artifact, "").await?;
        if *self.fail_artifacts.read().await {
            return Err(StageError::new(Stage::Artifact, "image service unavailable"));
        }
        Ok(PathBuf::from(format!("/clips/{}_thumb.jpg", request.name)))
    }
}
