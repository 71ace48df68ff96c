//! Types for batch submission and results.

use serde::{Deserialize, Serialize};

use crate::pipeline::{JobError, JobOutput};

/// One submitted reference with its position in the submission list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub index: usize,
    pub source_ref: String,
}

impl WorkItem {
    pub fn new(index: usize, source_ref: impl Into<String>) -> Self {
        Self {
            index,
            source_ref: source_ref.into(),
        }
    }

    /// Builds the ordered work list from raw references.
    pub fn from_refs<I, S>(refs: I) -> Vec<WorkItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        refs.into_iter()
            .enumerate()
            .map(|(index, source_ref)| WorkItem::new(index, source_ref))
            .collect()
    }

    /// Identity of this item's job within a batch run.
    pub fn job_id(&self) -> String {
        format!("job-{}", self.index)
    }
}

/// Terminal outcome of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Processed,
    Skipped,
    Errored,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Processed => "processed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Errored => "errored",
        }
    }
}

/// Why an item was skipped before any pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Blacklisted,
    AlreadyProcessed,
    Restricted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Blacklisted => "blacklisted",
            SkipReason::AlreadyProcessed => "already_processed",
            SkipReason::Restricted => "restricted",
        }
    }
}

/// The single terminal result recorded for a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub index: usize,
    pub source_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub outcome: JobOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    /// Units already on record, set for already-processed skips.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_units: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub elapsed_ms: u64,
}

impl JobResult {
    pub fn processed(item: &WorkItem, output: JobOutput, elapsed_ms: u64) -> Self {
        Self {
            index: item.index,
            source_ref: item.source_ref.clone(),
            source_id: Some(output.source_id.clone()),
            outcome: JobOutcome::Processed,
            skip_reason: None,
            existing_units: None,
            payload: Some(output),
            error: None,
            elapsed_ms,
        }
    }

    pub fn skipped(
        item: &WorkItem,
        source_id: impl Into<String>,
        reason: SkipReason,
        existing_units: Option<usize>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            index: item.index,
            source_ref: item.source_ref.clone(),
            source_id: Some(source_id.into()),
            outcome: JobOutcome::Skipped,
            skip_reason: Some(reason),
            existing_units,
            payload: None,
            error: None,
            elapsed_ms,
        }
    }

    pub fn errored(index: usize, source_ref: impl Into<String>, error: JobError, elapsed_ms: u64) -> Self {
        Self {
            index,
            source_ref: source_ref.into(),
            source_id: error.source_id.clone(),
            outcome: JobOutcome::Errored,
            skip_reason: None,
            existing_units: None,
            payload: None,
            error: Some(error),
            elapsed_ms,
        }
    }

    /// Short user-facing reason for skips and failures.
    pub fn short_reason(&self) -> Option<&'static str> {
        match (self.skip_reason, &self.error) {
            (Some(reason), _) => Some(reason.as_str()),
            (None, Some(error)) => Some(error.short_reason()),
            (None, None) => None,
        }
    }
}

/// Batch submission accepted at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<String>,
    /// Concurrency ceiling; the configured default applies when absent.
    #[serde(default, alias = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

/// Final, order-preserving batch outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub results: Vec<JobResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Stage, StageError};

    #[test]
    fn test_from_refs_assigns_indices() {
        let items = WorkItem::from_refs(["a", "b", "c"]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2], WorkItem::new(2, "c"));
        assert_eq!(items[1].job_id(), "job-1");
    }

    #[test]
    fn test_batch_request_accepts_camel_case_alias() {
        let request: BatchRequest =
            serde_json::from_str(r#"{"items": ["a"], "maxConcurrency": 4}"#).unwrap();
        assert_eq!(request.max_concurrency, Some(4));

        let request: BatchRequest =
            serde_json::from_str(r#"{"items": ["a"], "max_concurrency": 2}"#).unwrap();
        assert_eq!(request.max_concurrency, Some(2));

        let request: BatchRequest = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert_eq!(request.max_concurrency, None);
    }

    #[test]
    fn test_skipped_result_serialization() {
        let item = WorkItem::new(0, "https://youtu.be/dQw4w9WgXcQ");
        let result = JobResult::skipped(&item, "dQw4w9WgXcQ", SkipReason::AlreadyProcessed, Some(4), 3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["skip_reason"], "already_processed");
        assert_eq!(json["existing_units"], 4);
        assert!(json.get("error").is_none());
        assert_eq!(result.short_reason(), Some("already_processed"));
    }

    #[test]
    fn test_errored_result_short_reason() {
        let error = JobError::from_stage(
            "ref",
            Some("id".to_string()),
            StageError::source_blocked(Stage::Acquire, "403"),
        );
        let result = JobResult::errored(5, "ref", error, 10);
        assert_eq!(result.outcome, JobOutcome::Errored);
        assert_eq!(result.source_id.as_deref(), Some("id"));
        assert_eq!(result.short_reason(), Some("blocked by source"));
    }
}
