//! Order-restoring accumulation of job results.

use serde::{Deserialize, Serialize};

use super::error::CollectorError;
use super::types::{JobOutcome, JobResult};

/// Aggregate counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTally {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl BatchTally {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.errored
    }

    fn count(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Processed => self.processed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Errored => self.errored += 1,
        }
    }
}

/// Results in submission order with their tallies.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub tally: BatchTally,
}

/// Holds one slot per submitted index.
///
/// Nothing is exposed until every slot is filled.
#[derive(Debug)]
pub struct ResultCollector {
    slots: Vec<Option<JobResult>>,
    recorded: usize,
}

impl ResultCollector {
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            recorded: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn is_complete(&self) -> bool {
        self.recorded == self.slots.len()
    }

    /// Stores `result` in the slot for its index.
    pub fn record(&mut self, result: JobResult) -> Result<(), CollectorError> {
        let total = self.slots.len();
        let slot = self
            .slots
            .get_mut(result.index)
            .ok_or(CollectorError::OutOfRange {
                index: result.index,
                total,
            })?;
        if slot.is_some() {
            return Err(CollectorError::Duplicate {
                index: result.index,
            });
        }
        *slot = Some(result);
        self.recorded += 1;
        Ok(())
    }

    /// Emits results for indices `0..N` in order.
    pub fn finalize(self) -> Result<BatchReport, CollectorError> {
        if !self.is_complete() {
            return Err(CollectorError::Incomplete {
                recorded: self.recorded,
                total: self.slots.len(),
            });
        }

        let mut tally = BatchTally::default();
        let results: Vec<JobResult> = self.slots.into_iter().flatten().collect();
        for result in &results {
            tally.count(result.outcome);
        }

        Ok(BatchReport { results, tally })
    }
}
