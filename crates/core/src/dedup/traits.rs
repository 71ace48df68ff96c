//! Trait definitions for dedup collaborators.

use async_trait::async_trait;

use super::error::DedupError;
use super::types::{ContentRestriction, FailureRecord};
use crate::pipeline::UnitRecord;

/// Source of truth for "has this source already been processed".
#[async_trait]
pub trait DedupAuthority: Send + Sync {
    async fn is_already_processed(&self, source_id: &str) -> Result<bool, DedupError>;

    /// Persisted unit records for `source_id`.
    async fn list_units_for(&self, source_id: &str) -> Result<Vec<UnitRecord>, DedupError>;
}

/// O(1) membership check against sources that must never be processed.
pub trait DenyList: Send + Sync {
    fn is_blacklisted(&self, source_id: &str) -> bool;
}

/// Checks whether a source is content-restricted before admitting it.
#[async_trait]
pub trait RestrictionProbe: Send + Sync {
    async fn check(
        &self,
        source_ref: &str,
        source_id: &str,
    ) -> Result<ContentRestriction, DedupError>;
}

/// Side record of sources that were blocked or restricted.
#[async_trait]
pub trait FailureLedger: Send + Sync {
    async fn record(&self, record: FailureRecord) -> Result<(), DedupError>;
}
