//! Mock pipeline executor for testing scheduling behaviour.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::batch::WorkItem;
use crate::dedup::source_key;
use crate::pipeline::{JobError, JobOutput, PipelineExecutor, Stage, StageError};
use crate::progress::JobProgress;

/// A start or finish observed by the mock executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Started(usize),
    Finished(usize),
}

/// Mock implementation of the PipelineExecutor trait.
///
/// Records start/finish order and the peak number of concurrently running
/// jobs. Latency and failures are configurable per reference.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    events: Arc<RwLock<Vec<ExecutionEvent>>>,
    default_delay_ms: Arc<RwLock<u64>>,
    delays_ms: Arc<RwLock<HashMap<String, u64>>>,
    failures: Arc<RwLock<HashMap<String, StageError>>>,
    units_per_job: usize,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Create a mock executor producing two units per job.
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(RwLock::new(Vec::new())),
            default_delay_ms: Arc::new(RwLock::new(0)),
            delays_ms: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            units_per_job: 2,
        }
    }

    /// Set the simulated duration of every job.
    pub async fn set_delay(&self, delay: Duration) {
        *self.default_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Set the simulated duration for jobs on `source_ref`.
    pub async fn set_delay_for(&self, source_ref: &str, delay: Duration) {
        self.delays_ms
            .write()
            .await
            .insert(source_ref.to_string(), delay.as_millis() as u64);
    }

    /// Fail jobs on `source_ref` with `error`.
    pub async fn fail_ref(&self, source_ref: &str, error: StageError) {
        self.failures
            .write()
            .await
            .insert(source_ref.to_string(), error);
    }

    /// Highest number of jobs observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub async fn events(&self) -> Vec<ExecutionEvent> {
        self.events.read().await.clone()
    }

    /// Indices in the order their jobs started.
    pub async fn start_order(&self) -> Vec<usize> {
        self.events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                ExecutionEvent::Started(index) => Some(index),
                ExecutionEvent::Finished(_) => None,
            })
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.start_order().await.len()
    }
}

#[async_trait]
impl PipelineExecutor for MockExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        progress: &JobProgress,
    ) -> Result<JobOutput, JobError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events
            .write()
            .await
            .push(ExecutionEvent::Started(item.index));

        let delay = match self.delays_ms.read().await.get(&item.source_ref) {
            Some(ms) => *ms,
            None => *self.default_delay_ms.read().await,
        };
        progress.enter(Stage::Acquire, "downloading");
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failure = self.failures.read().await.get(&item.source_ref).cloned();
        let source_id = source_key(&item.source_ref);

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.events
            .write()
            .await
            .push(ExecutionEvent::Finished(item.index));

        match failure {
            Some(error) => Err(JobError::from_stage(
                item.source_ref.clone(),
                Some(source_id),
                error,
            )),
            None => Ok(JobOutput {
                title: format!("Title {}", source_id),
                units: (1..=self.units_per_job)
                    .map(|position| super::fixtures::unit_record(&source_id, position, "unit"))
                    .collect(),
                failed_units: Vec::new(),
                source_id,
            }),
        }
    }
}
