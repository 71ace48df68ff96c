//! Mock dedup collaborators and record store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::dedup::{
    ContentRestriction, DedupAuthority, DedupError, FailureLedger, FailureRecord,
    RestrictionProbe,
};
use crate::pipeline::UnitRecord;
use crate::store::{RecordStore, StoreError};

/// Mock implementation of the DedupAuthority trait.
///
/// Holds unit records per source id and counts authority lookups.
#[derive(Debug, Clone, Default)]
pub struct MockDedupAuthority {
    units: Arc<RwLock<HashMap<String, Vec<UnitRecord>>>>,
    lookups: Arc<RwLock<usize>>,
    next_error: Arc<RwLock<Option<DedupError>>>,
}

impl MockDedupAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `source_id` processed with `unit_count` records.
    pub async fn add_processed(&self, source_id: &str, unit_count: usize) {
        let records = (1..=unit_count)
            .map(|position| super::fixtures::unit_record(source_id, position, "unit"))
            .collect();
        self.units
            .write()
            .await
            .insert(source_id.to_string(), records);
    }

    /// Number of `is_already_processed` calls.
    pub async fn lookup_count(&self) -> usize {
        *self.lookups.read().await
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: DedupError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<DedupError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl DedupAuthority for MockDedupAuthority {
    async fn is_already_processed(&self, source_id: &str) -> Result<bool, DedupError> {
        *self.lookups.write().await += 1;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self
            .units
            .read()
            .await
            .get(source_id)
            .is_some_and(|units| !units.is_empty()))
    }

    async fn list_units_for(&self, source_id: &str) -> Result<Vec<UnitRecord>, DedupError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self
            .units
            .read()
            .await
            .get(source_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock implementation of the RestrictionProbe trait.
#[derive(Debug, Clone, Default)]
pub struct MockRestrictionProbe {
    restricted: Arc<RwLock<HashMap<String, String>>>,
    checks: Arc<RwLock<usize>>,
    next_error: Arc<RwLock<Option<DedupError>>>,
}

impl MockRestrictionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `source_id` as restricted for `reason`.
    pub async fn restrict(&self, source_id: &str, reason: &str) {
        self.restricted
            .write()
            .await
            .insert(source_id.to_string(), reason.to_string());
    }

    pub async fn check_count(&self) -> usize {
        *self.checks.read().await
    }

    pub async fn set_next_error(&self, error: DedupError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl RestrictionProbe for MockRestrictionProbe {
    async fn check(
        &self,
        _source_ref: &str,
        source_id: &str,
    ) -> Result<ContentRestriction, DedupError> {
        *self.checks.write().await += 1;
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(match self.restricted.read().await.get(source_id) {
            Some(reason) => ContentRestriction::Restricted {
                reason: reason.clone(),
            },
            None => ContentRestriction::Unrestricted,
        })
    }
}

/// Mock implementation of the FailureLedger trait.
#[derive(Debug, Clone, Default)]
pub struct MockFailureLedger {
    records: Arc<RwLock<Vec<FailureRecord>>>,
    next_error: Arc<RwLock<Option<DedupError>>>,
}

impl MockFailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<FailureRecord> {
        self.records.read().await.clone()
    }

    pub async fn set_next_error(&self, error: DedupError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl FailureLedger for MockFailureLedger {
    async fn record(&self, record: FailureRecord) -> Result<(), DedupError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        self.records.write().await.push(record);
        Ok(())
    }
}

/// In-memory record store that also answers as dedup authority.
///
/// Records saved by a batch are visible to the next batch's dedup gate,
/// which makes resumption scenarios testable without a filesystem.
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    records: Arc<RwLock<BTreeMap<String, UnitRecord>>>,
    failures_remaining: Arc<RwLock<usize>>,
    failure_message: Arc<RwLock<String>>,
    authority_lookups: Arc<RwLock<usize>>,
    save_delay_ms: Arc<RwLock<u64>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` saves with `message`.
    pub async fn set_next_errors(&self, count: usize, message: &str) {
        *self.failures_remaining.write().await = count;
        *self.failure_message.write().await = message.to_string();
    }

    /// Delay every save by `delay`.
    pub async fn set_save_delay(&self, delay: Duration) {
        *self.save_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Names of all stored records, sorted.
    pub async fn saved_names(&self) -> Vec<String> {
        self.records.read().await.keys().cloned().collect()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn authority_lookups(&self) -> usize {
        *self.authority_lookups.read().await
    }

    async fn take_failure(&self) -> Option<StoreError> {
        let mut remaining = self.failures_remaining.write().await;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(StoreError::io(
            "/mock/records",
            std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                self.failure_message.read().await.clone(),
            ),
        ))
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn save(&self, name: &str, record: &UnitRecord) -> Result<(), StoreError> {
        let delay = *self.save_delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        self.records
            .write()
            .await
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<UnitRecord, StoreError> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        record: &UnitRecord,
    ) -> Result<UnitRecord, StoreError> {
        let mut records = self.records.write().await;
        if !records.contains_key(old_name) {
            return Err(StoreError::NotFound {
                name: old_name.to_string(),
            });
        }
        if old_name != new_name && records.contains_key(new_name) {
            return Err(StoreError::AlreadyExists {
                name: new_name.to_string(),
            });
        }
        records.remove(old_name);
        let mut updated = record.clone();
        updated.name = new_name.to_string();
        records.insert(new_name.to_string(), updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl DedupAuthority for MockRecordStore {
    async fn is_already_processed(&self, source_id: &str) -> Result<bool, DedupError> {
        *self.authority_lookups.write().await += 1;
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|record| record.is_for_source(source_id)))
    }

    async fn list_units_for(&self, source_id: &str) -> Result<Vec<UnitRecord>, DedupError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.is_for_source(source_id))
            .cloned()
            .collect())
    }
}
