//! Batch orchestration.
//!
//! A batch takes an ordered list of source references, runs each through the
//! dedup gate and the media pipeline with at most K jobs in flight, and
//! returns one result per input in submission order.

mod collector;
mod config;
mod error;
mod runner;
mod scheduler;
mod types;

pub use collector::{BatchReport, BatchTally, ResultCollector};
pub use config::BatchConfig;
pub use error::{BatchError, CollectorError};
pub use runner::{BatchRun, BatchService};
pub use scheduler::ConcurrencyScheduler;
pub use types::{BatchRequest, BatchResponse, JobOutcome, JobResult, SkipReason, WorkItem};
