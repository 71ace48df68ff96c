//! Types for dedup admission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::SkipReason;

/// Result of a restriction probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRestriction {
    Unrestricted,
    Restricted { reason: String },
}

/// Entry appended to the failure ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub source_id: String,
    pub source_ref: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn now(
        source_id: impl Into<String>,
        source_ref: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_ref: source_ref.into(),
            reason: reason.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Admission decision for one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Proceed; `source_key` is the dedup key the gate checked.
    Admit { source_key: String },
    Skip(SkipDecision),
}

/// Why and how an item was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub source_id: String,
    pub reason: SkipReason,
    /// Units on record, for already-processed skips.
    pub existing_units: Option<usize>,
}
