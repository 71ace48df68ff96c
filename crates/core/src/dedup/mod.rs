//! Dedup admission: deciding, before any expensive work, whether a work item
//! should be skipped.
//!
//! A source is skipped when it is blacklisted, already processed, or
//! content-restricted. The in-memory [`FastIndex`] is a cache in front of the
//! [`DedupAuthority`], repaired lazily whenever the authority knows more.

mod deny_list;
mod error;
mod gate;
mod index;
mod ledger;
mod source_id;
mod traits;
mod types;

pub use deny_list::BlacklistSet;
pub use error::DedupError;
pub use gate::DedupGate;
pub use index::FastIndex;
pub use ledger::JsonlFailureLedger;
pub use source_id::{extract_video_id, source_key};
pub use traits::{DedupAuthority, DenyList, FailureLedger, RestrictionProbe};
pub use types::{Admission, ContentRestriction, FailureRecord, SkipDecision};
