//! Trait definitions for the store module.

use async_trait::async_trait;

use super::error::StoreError;
use crate::pipeline::UnitRecord;

/// Persistence for unit metadata records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes `record` under `name`, replacing any existing record.
    async fn save(&self, name: &str, record: &UnitRecord) -> Result<(), StoreError>;

    /// Reads the record stored under `name`.
    async fn read(&self, name: &str) -> Result<UnitRecord, StoreError>;

    /// Moves `old_name` to `new_name` together with its files and stores the
    /// updated `record` there. Returns the record as stored.
    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        record: &UnitRecord,
    ) -> Result<UnitRecord, StoreError>;
}
