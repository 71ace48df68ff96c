//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batch runs and job outcomes
//! - Dedup admission (skips, fast-index repairs)
//! - Pipeline stages and units
//! - External tools and services

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches started.
pub static BATCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("clipline_batches_started_total", "Total batches started").unwrap()
});

/// Jobs finished by outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_jobs_total", "Total jobs by terminal outcome"),
        &["outcome"], // "processed", "skipped", "errored"
    )
    .unwrap()
});

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("clipline_job_duration_seconds", "Duration of one job")
            .buckets(vec![0.01, 0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Jobs currently in flight across all batches.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("clipline_jobs_in_flight", "Number of jobs currently running").unwrap()
});

// =============================================================================
// Dedup Metrics
// =============================================================================

/// Items skipped before pipeline work, by reason.
pub static DEDUP_SKIPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_dedup_skips_total", "Items skipped by the dedup gate"),
        &["reason"], // "blacklisted", "already_processed", "restricted"
    )
    .unwrap()
});

/// Fast-index entries repaired from the authoritative store.
pub static INDEX_REPAIRS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipline_index_repairs_total",
        "Fast index entries repaired from the authoritative store",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Job-level stage failures.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_stage_failures_total", "Job failures by stage and category"),
        &["stage", "category"],
    )
    .unwrap()
});

/// Units dropped from an otherwise successful job.
pub static UNIT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_unit_failures_total", "Units dropped by stage"),
        &["stage"],
    )
    .unwrap()
});

/// Units persisted.
pub static UNITS_PERSISTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("clipline_units_persisted_total", "Unit records persisted").unwrap()
});

/// Best-effort artifacts that failed to generate.
pub static ARTIFACT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_artifact_failures_total", "Artifact generation failures"),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External tool/service call duration.
pub static EXTERNAL_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipline_external_call_duration_seconds",
            "Duration of external tool and service calls",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External tool/service calls by result.
pub static EXTERNAL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_external_calls_total", "External tool and service calls"),
        &["service", "operation", "result"], // result: "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Records one external call.
pub fn observe_external_call(service: &str, operation: &str, seconds: f64, success: bool) {
    EXTERNAL_CALL_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
    EXTERNAL_CALLS
        .with_label_values(&[service, operation, if success { "success" } else { "failure" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batch
        Box::new(BATCHES_STARTED.clone()),
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        // Dedup
        Box::new(DEDUP_SKIPS.clone()),
        Box::new(INDEX_REPAIRS.clone()),
        // Pipeline
        Box::new(STAGE_FAILURES.clone()),
        Box::new(UNIT_FAILURES.clone()),
        Box::new(UNITS_PERSISTED.clone()),
        Box::new(ARTIFACT_FAILURES.clone()),
        // External services
        Box::new(EXTERNAL_CALL_DURATION.clone()),
        Box::new(EXTERNAL_CALLS.clone()),
    ]
}
