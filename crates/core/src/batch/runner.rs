//! Batch runs and the service that creates them.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::collector::{BatchReport, ResultCollector};
use super::config::BatchConfig;
use super::error::BatchError;
use super::scheduler::ConcurrencyScheduler;
use super::types::{BatchRequest, BatchResponse, JobResult, WorkItem};
use crate::dedup::{
    source_key, Admission, DedupAuthority, DedupGate, DenyList, FailureLedger, FastIndex,
    RestrictionProbe,
};
use crate::metrics;
use crate::pipeline::{JobError, PipelineExecutor, Stage, StageError};
use crate::progress::{JobProgress, ProgressReporter, ProgressSurface, RenderMode};

/// One batch invocation.
///
/// Owns its dedup view, progress reporter and scheduler. Nothing here is
/// shared with other runs; state ends when the run is dropped.
pub struct BatchRun {
    id: String,
    gate: DedupGate,
    executor: Arc<dyn PipelineExecutor>,
    reporter: Arc<ProgressReporter>,
    scheduler: ConcurrencyScheduler,
    job_timeout: Option<Duration>,
}

impl BatchRun {
    pub fn new(
        gate: DedupGate,
        executor: Arc<dyn PipelineExecutor>,
        reporter: Arc<ProgressReporter>,
        scheduler: ConcurrencyScheduler,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            gate,
            executor,
            reporter,
            scheduler,
            job_timeout: None,
        }
    }

    /// Abandons admitted jobs that run longer than `timeout`.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reporter(&self) -> &Arc<ProgressReporter> {
        &self.reporter
    }

    pub fn gate(&self) -> &DedupGate {
        &self.gate
    }

    /// Runs every item to a terminal state and returns results in
    /// submission order.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        let total = items.len();
        metrics::BATCHES_STARTED.inc();
        info!(
            batch_id = %self.id,
            total,
            max_concurrency = self.scheduler.max_concurrency(),
            "Batch started"
        );

        // Lines are assigned up front so line order matches submission order.
        let handles: Vec<JobProgress> = items
            .iter()
            .map(|item| {
                let label = format!("{} {}", item.job_id(), source_key(&item.source_ref));
                JobProgress::register(Arc::clone(&self.reporter), &item.job_id(), &label)
            })
            .collect();

        let mut collector = ResultCollector::new(total);
        self.scheduler
            .run(items, &mut collector, |item| {
                let progress = handles[item.index].clone();
                async move { self.run_job(item, progress).await }
            })
            .await?;

        let report = collector.finalize()?;
        self.reporter.render_all();

        info!(
            batch_id = %self.id,
            total,
            processed = report.tally.processed,
            skipped = report.tally.skipped,
            errored = report.tally.errored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch finished"
        );
        Ok(report)
    }

    async fn run_job(&self, item: WorkItem, progress: JobProgress) -> JobResult {
        let started = Instant::now();
        progress.enter(Stage::Dedup, "checking");

        let result = match self.gate.admit(&item).await {
            Ok(Admission::Skip(skip)) => {
                progress.finish(&format!("skipped ({})", skip.reason.as_str()));
                JobResult::skipped(
                    &item,
                    skip.source_id,
                    skip.reason,
                    skip.existing_units,
                    elapsed_ms(started),
                )
            }
            Ok(Admission::Admit { source_key }) => {
                self.execute_admitted(&item, &source_key, &progress, started)
                    .await
            }
            Err(e) => {
                let error = JobError::from_stage(
                    item.source_ref.clone(),
                    Some(source_key(&item.source_ref)),
                    StageError::new(Stage::Dedup, e.to_string()),
                );
                self.failed(&item, error, &progress, started)
            }
        };

        metrics::JOBS_TOTAL
            .with_label_values(&[result.outcome.as_str()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[result.outcome.as_str()])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_admitted(
        &self,
        item: &WorkItem,
        key: &str,
        progress: &JobProgress,
        started: Instant,
    ) -> JobResult {
        let execution = self.executor.execute(item, progress);
        let outcome = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let stage = progress.current_stage().unwrap_or(Stage::Resolve);
                    warn!(index = item.index, stage = %stage, "Job timed out, abandoning");
                    Err(JobError::from_stage(
                        item.source_ref.clone(),
                        Some(key.to_string()),
                        StageError::timed_out(stage, limit.as_secs()),
                    ))
                }
            },
            None => execution.await,
        };

        match outcome {
            Ok(output) => {
                self.gate.mark_processed(&output.source_id);
                if output.source_id != key {
                    self.gate.mark_processed(key);
                }
                progress.finish(&format!(
                    "done ({} units, {} failed)",
                    output.units.len(),
                    output.failed_units.len()
                ));
                JobResult::processed(item, output, elapsed_ms(started))
            }
            Err(error) => self.failed(item, error, progress, started),
        }
    }

    fn failed(
        &self,
        item: &WorkItem,
        error: JobError,
        progress: &JobProgress,
        started: Instant,
    ) -> JobResult {
        metrics::STAGE_FAILURES
            .with_label_values(&[error.stage.as_str(), error.category.as_str()])
            .inc();
        error!(
            batch_id = %self.id,
            index = item.index,
            source_ref = %item.source_ref,
            stage = %error.stage,
            category = error.category.as_str(),
            error = %error.message,
            "Job failed"
        );
        progress.finish(&format!("failed: {}", error.short_reason()));
        JobResult::errored(item.index, item.source_ref.clone(), error, elapsed_ms(started))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Entry point for batch submissions.
///
/// Holds the long-lived collaborators and creates a fresh [`BatchRun`] for
/// every request. Runs get their own reporter but draw on one shared
/// surface, so overlapping requests keep their lines apart.
pub struct BatchService {
    config: BatchConfig,
    surface: Arc<ProgressSurface>,
    executor: Arc<dyn PipelineExecutor>,
    deny_list: Arc<dyn DenyList>,
    authority: Arc<dyn DedupAuthority>,
    ledger: Arc<dyn FailureLedger>,
    probe: Option<Arc<dyn RestrictionProbe>>,
}

impl BatchService {
    pub fn new(
        config: BatchConfig,
        executor: Arc<dyn PipelineExecutor>,
        deny_list: Arc<dyn DenyList>,
        authority: Arc<dyn DedupAuthority>,
        ledger: Arc<dyn FailureLedger>,
    ) -> Self {
        Self {
            config,
            surface: Arc::new(ProgressSurface::stderr()),
            executor,
            deny_list,
            authority,
            ledger,
            probe: None,
        }
    }

    /// Replaces the stderr surface progress is drawn on.
    pub fn with_surface(mut self, surface: Arc<ProgressSurface>) -> Self {
        self.surface = surface;
        self
    }

    /// Enables the content-restriction check for every run.
    pub fn with_probe(mut self, probe: Arc<dyn RestrictionProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// A reporter for one run, drawing on the service's surface.
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter::on_surface(
            RenderMode::detect(self.config.progress),
            Arc::clone(&self.surface),
        )
    }

    /// Checks a request and builds its work list.
    pub fn validate(
        &self,
        request: &BatchRequest,
    ) -> Result<(Vec<WorkItem>, NonZeroUsize), BatchError> {
        if request.items.is_empty() {
            return Err(BatchError::validation("items must not be empty"));
        }
        if let Some(index) = request.items.iter().position(|item| item.trim().is_empty()) {
            return Err(BatchError::validation(format!("item {} is blank", index)));
        }
        // References are handed to external tools as positional arguments.
        if let Some(index) = request
            .items
            .iter()
            .position(|item| item.trim().starts_with('-'))
        {
            return Err(BatchError::validation(format!(
                "item {} must not start with '-'",
                index
            )));
        }

        let requested = request
            .max_concurrency
            .unwrap_or(self.config.default_max_concurrency);
        let max_concurrency = NonZeroUsize::new(requested)
            .ok_or_else(|| BatchError::validation("maxConcurrency must be at least 1"))?;
        if requested > self.config.max_concurrency_limit {
            return Err(BatchError::validation(format!(
                "maxConcurrency {} exceeds limit {}",
                requested, self.config.max_concurrency_limit
            )));
        }

        let items = WorkItem::from_refs(request.items.iter().map(|item| item.trim()));
        Ok((items, max_concurrency))
    }

    /// Creates a run with a fresh fast index and progress reporter.
    pub fn start_run(&self, max_concurrency: NonZeroUsize, reporter: ProgressReporter) -> BatchRun {
        let mut gate = DedupGate::new(
            Arc::new(FastIndex::new()),
            Arc::clone(&self.deny_list),
            Arc::clone(&self.authority),
            Arc::clone(&self.ledger),
        );
        if let Some(probe) = &self.probe {
            gate = gate.with_probe(Arc::clone(probe));
        }

        BatchRun::new(
            gate,
            Arc::clone(&self.executor),
            Arc::new(reporter),
            ConcurrencyScheduler::new(max_concurrency),
        )
        .with_job_timeout(self.config.job_timeout())
    }

    /// Validates and runs a batch, returning the boundary response.
    ///
    /// Only validation and internal collection errors are returned as `Err`;
    /// every job failure is a result inside the response.
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchResponse, BatchError> {
        let (items, max_concurrency) = self.validate(&request)?;
        let run = self.start_run(max_concurrency, self.reporter());
        let report = run.run(items).await?;

        Ok(BatchResponse {
            batch_id: run.id().to_string(),
            total: report.results.len(),
            processed: report.tally.processed,
            skipped: report.tally.skipped,
            errors: report.tally.errored,
            results: report.results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{JobOutcome, SkipReason};
    use crate::dedup::BlacklistSet;
    use crate::pipeline::FailureCategory;
    use crate::progress::ProgressSetting;
    use crate::testing::{fixtures, MockExecutor, MockFailureLedger, MockRecordStore};

    fn service(executor: MockExecutor, blacklist: &[&str]) -> BatchService {
        let config = BatchConfig {
            progress: ProgressSetting::Off,
            ..BatchConfig::default()
        };
        BatchService::new(
            config,
            Arc::new(executor),
            Arc::new(BlacklistSet::from_ids(blacklist.iter().copied())),
            Arc::new(MockRecordStore::new()),
            Arc::new(MockFailureLedger::new()),
        )
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    fn request(items: Vec<String>, max_concurrency: Option<usize>) -> BatchRequest {
        BatchRequest {
            items,
            max_concurrency,
        }
    }

    #[test]
    fn test_validate_rejects_empty_items() {
        let svc = service(MockExecutor::new(), &[]);
        let err = svc.validate(&request(vec![], Some(2))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let svc = service(MockExecutor::new(), &[]);
        let err = svc
            .validate(&request(fixtures::video_refs(1), Some(0)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid batch: maxConcurrency must be at least 1");
    }

    #[test]
    fn test_validate_rejects_concurrency_above_limit() {
        let svc = service(MockExecutor::new(), &[]);
        let err = svc
            .validate(&request(fixtures::video_refs(1), Some(17)))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_rejects_blank_item() {
        let svc = service(MockExecutor::new(), &[]);
        let err = svc
            .validate(&request(vec!["a".to_string(), "  ".to_string()], None))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid batch: item 1 is blank");
    }

    #[test]
    fn test_validate_rejects_option_like_item() {
        let svc = service(MockExecutor::new(), &[]);
        let err = svc
            .validate(&request(
                vec!["dQw4w9WgXcQ".to_string(), " --exec=touch /tmp/x".to_string()],
                None,
            ))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Invalid batch: item 1 must not start with '-'");
    }

    #[test]
    fn test_run_reporters_share_service_surface() {
        let capture = Capture::default();
        let config = BatchConfig {
            progress: ProgressSetting::Live,
            ..BatchConfig::default()
        };
        let svc = BatchService::new(
            config,
            Arc::new(MockExecutor::new()),
            Arc::new(BlacklistSet::default()),
            Arc::new(MockRecordStore::new()),
            Arc::new(MockFailureLedger::new()),
        )
        .with_surface(Arc::new(ProgressSurface::new(Box::new(capture.clone()))));

        let first = svc.reporter();
        let second = svc.reporter();
        first.register_job("job-0", "first 0");
        first.register_job("job-1", "first 1");
        second.register_job("job-0", "second 0");
        capture.take();

        first.update("job-0", "first 0 done");
        assert_eq!(capture.take(), "\x1b[3A\r\x1b[2Kfirst 0 done\x1b[3B\r");
    }

    #[test]
    fn test_validate_uses_default_concurrency() {
        let svc = service(MockExecutor::new(), &[]);
        let (items, k) = svc
            .validate(&request(vec![" dQw4w9WgXcQ ".to_string()], None))
            .unwrap();
        assert_eq!(k.get(), 3);
        assert_eq!(items[0].source_ref, "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_submit_counts_sum_to_total() {
        let executor = MockExecutor::new();
        let refs = fixtures::video_refs(4);
        executor
            .fail_ref(&refs[2], StageError::source_blocked(Stage::Acquire, "HTTP Error 403"))
            .await;
        let blocked = fixtures::video_ids(4)[3].clone();
        let svc = service(executor.clone(), &[blocked.as_str()]);

        let response = svc.submit(request(refs, Some(2))).await.unwrap();

        assert_eq!(response.total, 4);
        assert_eq!(response.processed, 2);
        assert_eq!(response.errors, 1);
        assert_eq!(response.skipped, 1);
        assert_eq!(response.processed + response.skipped + response.errors, 4);
        assert_eq!(response.results[3].skip_reason, Some(SkipReason::Blacklisted));
        assert_eq!(
            response.results[2].error.as_ref().unwrap().category,
            FailureCategory::SourceBlocked
        );
        assert_eq!(executor.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_ref_in_same_batch_hits_fast_index() {
        let executor = MockExecutor::new();
        let svc = service(executor.clone(), &[]);
        let refs = vec![
            "https://youtu.be/dQw4w9WgXcQ".to_string(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        ];

        let response = svc.submit(request(refs, Some(1))).await.unwrap();

        assert_eq!(response.results[0].outcome, JobOutcome::Processed);
        assert_eq!(response.results[1].outcome, JobOutcome::Skipped);
        assert_eq!(
            response.results[1].skip_reason,
            Some(SkipReason::AlreadyProcessed)
        );
        assert_eq!(executor.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_job_timeout_yields_single_errored_result() {
        let executor = MockExecutor::new();
        let refs = fixtures::video_refs(2);
        executor
            .set_delay_for(&refs[0], Duration::from_secs(30))
            .await;
        let svc = service(executor, &[]);

        let (items, k) = svc.validate(&request(refs, Some(2))).unwrap();
        let run = svc
            .start_run(k, ProgressReporter::hidden())
            .with_job_timeout(Some(Duration::from_millis(50)));
        let report = run.run(items).await.unwrap();

        assert_eq!(report.results.len(), 2);
        let error = report.results[0].error.as_ref().unwrap();
        assert_eq!(error.category, FailureCategory::TimedOut);
        assert_eq!(error.stage, Stage::Acquire);
        assert_eq!(report.results[1].outcome, JobOutcome::Processed);
    }

    #[tokio::test]
    async fn test_progress_line_per_item_in_submission_order() {
        let svc = service(MockExecutor::new(), &[]);
        let (items, k) = svc
            .validate(&request(fixtures::video_refs(3), Some(3)))
            .unwrap();
        let run = svc.start_run(k, ProgressReporter::hidden());

        run.run(items).await.unwrap();

        let lines = run.reporter().lines();
        assert_eq!(lines.len(), 3);
        for (index, line) in lines.iter().enumerate() {
            assert_eq!(line.job_id, format!("job-{}", index));
            assert!(line.completed);
            assert!(line.last_rendered_text.contains("done"));
        }
    }
}
