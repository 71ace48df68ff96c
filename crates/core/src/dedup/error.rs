//! Error types for the dedup module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while deciding admission.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The authoritative store could not answer.
    #[error("Dedup authority unavailable: {0}")]
    Authority(String),

    /// The restriction probe could not decide.
    #[error("Restriction probe failed: {0}")]
    Probe(String),

    /// The failure ledger could not be written.
    #[error("Failed to write failure ledger {path}: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The deny list file could not be read.
    #[error("Failed to load deny list {path}: {source}")]
    DenyList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DedupError {
    pub fn authority(reason: impl Into<String>) -> Self {
        Self::Authority(reason.into())
    }

    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe(reason.into())
    }
}
