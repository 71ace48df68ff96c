//! Unit record persistence.
//!
//! Renames that touch several files (record, clip, artifacts) go through
//! [`RenameBatch`], which applies them all-or-nothing.

mod error;
mod fs_store;
mod rename;
mod traits;

pub use error::{RenameError, StoreError};
pub use fs_store::{retitle_unit, FsRecordStore};
pub use rename::{FileMove, RenameBatch};
pub use traits::RecordStore;
