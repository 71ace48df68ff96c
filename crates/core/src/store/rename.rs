//! Transactional multi-file rename with reverse-order rollback.

use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, warn};

use super::error::RenameError;

/// One file move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl FileMove {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn reversed(&self) -> FileMove {
        FileMove {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

/// A set of moves applied all-or-nothing.
///
/// Every move is checked before the first one runs. If a move fails midway,
/// the completed moves are undone newest first. When undo fails too, the
/// error names each path left out of place.
#[derive(Debug, Clone, Default)]
pub struct RenameBatch {
    moves: Vec<FileMove>,
}

impl RenameBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a move. Moves onto the same path are dropped.
    pub fn push(&mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> &mut Self {
        let file_move = FileMove::new(from, to);
        if file_move.from != file_move.to {
            self.moves.push(file_move);
        }
        self
    }

    pub fn moves(&self) -> &[FileMove] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The batch that undoes this one once committed.
    pub fn inverse(&self) -> RenameBatch {
        RenameBatch {
            moves: self.moves.iter().rev().map(FileMove::reversed).collect(),
        }
    }

    /// Checks that every source exists, no destination exists, and no two
    /// moves share a destination.
    pub async fn preflight(&self) -> Result<(), RenameError> {
        let mut destinations = HashSet::new();
        for file_move in &self.moves {
            if !fs::try_exists(&file_move.from).await.unwrap_or(false) {
                return Err(RenameError::SourceMissing {
                    path: file_move.from.clone(),
                });
            }
            if matches!(fs::try_exists(&file_move.to).await, Ok(true)) {
                return Err(RenameError::DestinationExists {
                    path: file_move.to.clone(),
                });
            }
            if !destinations.insert(file_move.to.clone()) {
                return Err(RenameError::DuplicateDestination {
                    path: file_move.to.clone(),
                });
            }
        }
        Ok(())
    }

    /// Applies every move, or none of them.
    ///
    /// Returns the number of files moved.
    pub async fn commit(self) -> Result<usize, RenameError> {
        self.preflight().await?;

        let mut done: Vec<&FileMove> = Vec::with_capacity(self.moves.len());
        for file_move in &self.moves {
            match apply(file_move).await {
                Ok(()) => {
                    debug!(from = %file_move.from.display(), to = %file_move.to.display(), "Moved");
                    done.push(file_move);
                }
                Err(source) => {
                    warn!(
                        from = %file_move.from.display(),
                        to = %file_move.to.display(),
                        error = %source,
                        completed = done.len(),
                        "Move failed, rolling back"
                    );
                    return Err(rollback(done, file_move, source).await);
                }
            }
        }

        Ok(done.len())
    }
}

async fn apply(file_move: &FileMove) -> std::io::Result<()> {
    if let Some(parent) = file_move.to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::rename(&file_move.from, &file_move.to).await
}

async fn rollback(done: Vec<&FileMove>, failed: &FileMove, source: std::io::Error) -> RenameError {
    let rolled_back = done.len();
    let mut needs_repair = Vec::new();

    for file_move in done.into_iter().rev() {
        let undo = file_move.reversed();
        if let Err(e) = fs::rename(&undo.from, &undo.to).await {
            error!(
                from = %undo.from.display(),
                to = %undo.to.display(),
                error = %e,
                "Rollback move failed"
            );
            needs_repair.push(undo);
        }
    }

    if needs_repair.is_empty() {
        RenameError::MoveFailed {
            from: failed.from.clone(),
            to: failed.to.clone(),
            rolled_back,
            source,
        }
    } else {
        RenameError::RollbackFailed {
            cause: format!(
                "moving {} to {}: {}",
                failed.from.display(),
                failed.to.display(),
                source
            ),
            needs_repair,
        }
    }
}
