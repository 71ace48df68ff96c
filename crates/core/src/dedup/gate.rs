//! Admission control ahead of any pipeline work.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::DedupError;
use super::index::FastIndex;
use super::source_id::source_key;
use super::traits::{DedupAuthority, DenyList, FailureLedger, RestrictionProbe};
use super::types::{Admission, ContentRestriction, FailureRecord, SkipDecision};
use crate::batch::{SkipReason, WorkItem};
use crate::metrics;

/// Decides skip vs. proceed for each work item.
///
/// Checks run in a fixed order and stop at the first match:
///
/// 1. deny list (never spends a probe on a blacklisted source)
/// 2. fast index
/// 3. authoritative store, repairing the fast index on a hit
/// 4. restriction probe, recording positives to the failure ledger
///
/// The fast index is never trusted as ground truth: an index miss always
/// falls through to the authority.
#[derive(Clone)]
pub struct DedupGate {
    index: Arc<FastIndex>,
    deny_list: Arc<dyn DenyList>,
    authority: Arc<dyn DedupAuthority>,
    probe: Option<Arc<dyn RestrictionProbe>>,
    ledger: Arc<dyn FailureLedger>,
}

impl DedupGate {
    pub fn new(
        index: Arc<FastIndex>,
        deny_list: Arc<dyn DenyList>,
        authority: Arc<dyn DedupAuthority>,
        ledger: Arc<dyn FailureLedger>,
    ) -> Self {
        Self {
            index,
            deny_list,
            authority,
            probe: None,
            ledger,
        }
    }

    /// Enables the content-restriction check.
    pub fn with_probe(mut self, probe: Arc<dyn RestrictionProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn index(&self) -> &Arc<FastIndex> {
        &self.index
    }

    /// Runs the admission checks for `item`.
    pub async fn admit(&self, item: &WorkItem) -> Result<Admission, DedupError> {
        let key = source_key(&item.source_ref);

        if self.deny_list.is_blacklisted(&key) {
            debug!(index = item.index, source_id = %key, "Blacklisted");
            return Ok(self.skip(key, SkipReason::Blacklisted, None));
        }

        if self.index.contains(&key) {
            debug!(index = item.index, source_id = %key, "Fast index hit");
            let existing = self.existing_units(&key).await?;
            return Ok(self.skip(key, SkipReason::AlreadyProcessed, Some(existing)));
        }

        if self.authority.is_already_processed(&key).await? {
            if self.index.insert(&key) {
                metrics::INDEX_REPAIRS.inc();
            }
            info!(index = item.index, source_id = %key, "Already processed, fast index repaired");
            let existing = self.existing_units(&key).await?;
            return Ok(self.skip(key, SkipReason::AlreadyProcessed, Some(existing)));
        }

        if let Some(probe) = &self.probe {
            match probe.check(&item.source_ref, &key).await {
                Ok(ContentRestriction::Restricted { reason }) => {
                    info!(index = item.index, source_id = %key, reason = %reason, "Content restricted");
                    let record = FailureRecord::now(key.clone(), item.source_ref.clone(), reason);
                    if let Err(e) = self.ledger.record(record).await {
                        warn!(source_id = %key, error = %e, "Failed to record restricted source");
                    }
                    return Ok(self.skip(key, SkipReason::Restricted, None));
                }
                Ok(ContentRestriction::Unrestricted) => {}
                Err(e) => {
                    warn!(
                        index = item.index,
                        source_id = %key,
                        error = %e,
                        "Restriction probe failed, admitting"
                    );
                }
            }
        }

        Ok(Admission::Admit { source_key: key })
    }

    /// Marks `source_id` processed for the rest of the run.
    pub fn mark_processed(&self, source_id: &str) {
        self.index.insert(source_id);
    }

    async fn existing_units(&self, source_id: &str) -> Result<usize, DedupError> {
        Ok(self.authority.list_units_for(source_id).await?.len())
    }

    fn skip(&self, source_id: String, reason: SkipReason, existing_units: Option<usize>) -> Admission {
        metrics::DEDUP_SKIPS.with_label_values(&[reason.as_str()]).inc();
        Admission::Skip(SkipDecision {
            source_id,
            reason,
            existing_units,
        })
    }
}
