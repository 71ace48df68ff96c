//! Deny list of source ids that must never be processed.

use std::collections::HashSet;
use std::path::Path;

use super::error::DedupError;
use super::source_id::source_key;
use super::traits::DenyList;

/// Deny list held as a hash set.
#[derive(Debug, Clone, Default)]
pub struct BlacklistSet {
    ids: HashSet<String>,
}

impl BlacklistSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a deny list from ids or references.
    ///
    /// Each entry is normalised with [`source_key`], so a full URL and a bare
    /// id block the same source.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(|id| source_key(id.as_ref()))
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    /// Parses one id per line. Blank lines and `#` comments are ignored.
    pub fn parse(contents: &str) -> Self {
        Self::from_ids(
            contents
                .lines()
                .map(|line| line.split('#').next().unwrap_or("").trim())
                .filter(|line| !line.is_empty()),
        )
    }

    /// Loads a deny list file.
    pub async fn load(path: &Path) -> Result<Self, DedupError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DedupError::DenyList {
                    path: path.to_path_buf(),
                    source,
                })?;
        Ok(Self::parse(&contents))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl DenyList for BlacklistSet {
    fn is_blacklisted(&self, source_id: &str) -> bool {
        self.ids.contains(source_id)
    }
}
