//! Bounded-concurrency dispatch over an ordered work list.

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

use super::collector::ResultCollector;
use super::error::CollectorError;
use super::types::{JobResult, WorkItem};
use crate::metrics;
use crate::pipeline::{JobError, Stage, StageError};

/// Keeps up to `K` jobs in flight, starting the next queued item the moment
/// any running job finishes.
///
/// Jobs run as futures polled by the calling task, so concurrency comes from
/// overlapping I/O rather than threads. Completion is awaited on a
/// `FuturesUnordered`, so the loop only wakes when a job reaches a terminal
/// state.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyScheduler {
    max_concurrency: NonZeroUsize,
}

impl ConcurrencyScheduler {
    pub fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.get()
    }

    /// Runs `execute_one` over `items` and records each result in `collector`.
    ///
    /// Start order follows `items`. A job that panics is recorded as errored
    /// and its slot is reused like any other.
    pub async fn run<F, Fut>(
        &self,
        items: Vec<WorkItem>,
        collector: &mut ResultCollector,
        execute_one: F,
    ) -> Result<(), CollectorError>
    where
        F: Fn(WorkItem) -> Fut,
        Fut: Future<Output = JobResult>,
    {
        let total = items.len();
        let mut queue = items.into_iter();
        let mut in_flight = FuturesUnordered::new();

        let launch = |item: WorkItem| {
            debug!(index = item.index, source_ref = %item.source_ref, "Dispatching job");
            metrics::JOBS_IN_FLIGHT.inc();
            let index = item.index;
            let source_ref = item.source_ref.clone();
            AssertUnwindSafe(execute_one(item))
                .catch_unwind()
                .map(move |outcome| {
                    metrics::JOBS_IN_FLIGHT.dec();
                    outcome.unwrap_or_else(|panic| panicked(index, source_ref, panic))
                })
        };

        for item in queue.by_ref().take(self.max_concurrency.get()) {
            in_flight.push(launch(item));
        }

        while let Some(result) = in_flight.next().await {
            if let Some(next) = queue.next() {
                in_flight.push(launch(next));
            }
            debug!(
                index = result.index,
                outcome = result.outcome.as_str(),
                in_flight = in_flight.len(),
                recorded = collector.recorded() + 1,
                total,
                "Job finished"
            );
            collector.record(result)?;
        }

        Ok(())
    }
}

fn panicked(index: usize, source_ref: String, panic: Box<dyn Any + Send>) -> JobResult {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "job panicked".to_string());
    error!(index, source_ref = %source_ref, message = %message, "Job panicked");

    let error = JobError::from_stage(
        source_ref.clone(),
        None,
        StageError::new(Stage::Resolve, format!("panicked: {}", message)),
    );
    JobResult::errored(index, source_ref, error, 0)
}
