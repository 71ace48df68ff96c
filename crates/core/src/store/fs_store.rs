//! Filesystem record store: one pretty-printed JSON file per unit record.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::rename::RenameBatch;
use super::traits::RecordStore;
use crate::dedup::{DedupAuthority, DedupError};
use crate::pipeline::{unit_record_name, UnitRecord};

/// Stores records as `{records_dir}/{name}.json`.
///
/// Also serves as the dedup authority: a source counts as processed when at
/// least one record carries its id.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    records_dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.records_dir.join(format!("{}.json", name)))
    }

    /// Every readable record. Unparseable files are logged and skipped.
    pub async fn list(&self) -> Result<Vec<UnitRecord>, StoreError> {
        let mut entries = match fs::read_dir(&self.records_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.records_dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.records_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Records belonging to `source_id`, matched on resolved id or dedup key.
    pub async fn records_for(&self, source_id: &str) -> Result<Vec<UnitRecord>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| record.is_for_source(source_id))
            .collect())
    }

    async fn write_atomic(&self, path: &Path, name: &str, record: &UnitRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record).map_err(|e| StoreError::Serialization {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        fs::create_dir_all(&self.records_dir)
            .await
            .map_err(|e| StoreError::io(&self.records_dir, e))?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)
            .await
            .map_err(|e| StoreError::io(&staging, e))?;
        fs::rename(&staging, path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn save(&self, name: &str, record: &UnitRecord) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        self.write_atomic(&path, name, record).await?;
        debug!(name, path = %path.display(), "Saved record");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<UnitRecord, StoreError> {
        let path = self.path_for(name)?;
        match read_record(&path).await {
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound {
                    name: name.to_string(),
                })
            }
            other => other,
        }
    }

    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        record: &UnitRecord,
    ) -> Result<UnitRecord, StoreError> {
        let old_path = self.path_for(old_name)?;
        let new_path = self.path_for(new_name)?;

        if !fs::try_exists(&old_path).await.unwrap_or(false) {
            return Err(StoreError::NotFound {
                name: old_name.to_string(),
            });
        }

        let mut updated = record.clone();
        updated.name = new_name.to_string();

        if old_name == new_name {
            self.write_atomic(&new_path, new_name, &updated).await?;
            return Ok(updated);
        }

        if fs::try_exists(&new_path).await.unwrap_or(false) {
            return Err(StoreError::AlreadyExists {
                name: new_name.to_string(),
            });
        }

        let mut batch = RenameBatch::new();
        batch.push(&old_path, &new_path);

        if let Some(moved) = renamed_file(&record.clip_path, old_name, new_name, "clip").await {
            batch.push(&record.clip_path, &moved);
            updated.clip_path = moved;
        }
        for (artifact, stored) in record.artifacts.iter().zip(updated.artifacts.iter_mut()) {
            if let Some(moved) = renamed_file(&artifact.path, old_name, new_name, &artifact.kind).await {
                batch.push(&artifact.path, &moved);
                stored.path = moved;
            }
        }

        let undo = batch.inverse();
        let moved = batch.commit().await?;

        if let Err(e) = self.write_atomic(&new_path, new_name, &updated).await {
            warn!(old_name, new_name, error = %e, "Record update failed, undoing rename");
            undo.commit().await?;
            return Err(e);
        }

        info!(old_name, new_name, files = moved, "Renamed record");
        Ok(updated)
    }
}

#[async_trait]
impl DedupAuthority for FsRecordStore {
    async fn is_already_processed(&self, source_id: &str) -> Result<bool, DedupError> {
        Ok(!self.list_units_for(source_id).await?.is_empty())
    }

    async fn list_units_for(&self, source_id: &str) -> Result<Vec<UnitRecord>, DedupError> {
        self.records_for(source_id)
            .await
            .map_err(|e| DedupError::authority(e.to_string()))
    }
}

/// Renames a unit after its title changed.
///
/// The new name keeps the source id and position, so the record stays
/// attached to its source for dedup.
pub async fn retitle_unit(
    store: &dyn RecordStore,
    name: &str,
    new_title: &str,
) -> Result<UnitRecord, StoreError> {
    let mut record = store.read(name).await?;
    record.title = new_title.trim().to_string();
    let new_name = unit_record_name(&record.source_id, record.position, &record.title);
    store.rename(name, &new_name, &record).await
}

async fn read_record(path: &Path) -> Result<UnitRecord, StoreError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| StoreError::Serialization {
        name: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// New path for a file belonging to `old_name`, or `None` if it is missing.
///
/// Files named after the record keep their suffix (`{old}_thumb.jpg` becomes
/// `{new}_thumb.jpg`); others are named `{new}_{kind}.{ext}`.
async fn renamed_file(path: &Path, old_name: &str, new_name: &str, kind: &str) -> Option<PathBuf> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        warn!(path = %path.display(), "File missing, left out of rename");
        return None;
    }

    let file_name = path.file_name()?.to_str()?;
    let new_file_name = match file_name.strip_prefix(old_name) {
        Some(suffix) => format!("{}{}", new_name, suffix),
        None => match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_{}.{}", new_name, kind, ext),
            None => format!("{}_{}", new_name, kind),
        },
    };
    Some(path.with_file_name(new_file_name))
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if invalid {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    async fn store_with_files(dir: &TempDir) -> (FsRecordStore, UnitRecord) {
        let store = FsRecordStore::new(dir.path().join("records"));
        let media = dir.path().join("media");
        fs::create_dir_all(&media).await.unwrap();

        let mut record = fixtures::unit_record("dQw4w9WgXcQ", 1, "Old Title");
        record.clip_path = media.join(format!("{}.mp4", record.name));
        fs::write(&record.clip_path, "clip").await.unwrap();
        let thumb = media.join(format!("{}_thumb.jpg", record.name));
        fs::write(&thumb, "jpg").await.unwrap();
        record.artifacts[0].path = thumb;

        store.save(&record.name, &record).await.unwrap();
        (store, record)
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        let record = fixtures::unit_record("abc", 2, "Second Unit");

        store.save(&record.name, &record).await.unwrap();
        let loaded = store.read(&record.name).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_read_missing_record() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        let err = store.read("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        let record = fixtures::unit_record("abc", 1, "x");
        for name in ["../escape", "a/b", ".hidden", ""] {
            let err = store.save(name, &record).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName { .. }), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_authority_matches_on_source_id() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        for position in 1..=3 {
            let record = fixtures::unit_record("aaa", position, "unit");
            store.save(&record.name, &record).await.unwrap();
        }
        let other = fixtures::unit_record("bbb", 1, "unit");
        store.save(&other.name, &other).await.unwrap();
        fs::write(dir.path().join("garbage.json"), "{not json")
            .await
            .unwrap();

        assert!(store.is_already_processed("aaa").await.unwrap());
        assert_eq!(store.list_units_for("aaa").await.unwrap().len(), 3);
        assert_eq!(store.list_units_for("bbb").await.unwrap().len(), 1);
        assert!(!store.is_already_processed("ccc").await.unwrap());
    }

    #[tokio::test]
    async fn test_authority_on_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path().join("never-created"));
        assert!(!store.is_already_processed("aaa").await.unwrap());
    }

    #[tokio::test]
    async fn test_retitle_moves_record_and_files() {
        let dir = TempDir::new().unwrap();
        let (store, record) = store_with_files(&dir).await;

        let renamed = retitle_unit(&store, &record.name, "Brand New Title")
            .await
            .unwrap();

        assert_eq!(renamed.name, "dQw4w9WgXcQ_01_brand-new-title");
        assert_eq!(renamed.title, "Brand New Title");
        assert!(store.read(&record.name).await.unwrap_err().is_not_found());
        assert_eq!(store.read(&renamed.name).await.unwrap(), renamed);

        assert!(!record.clip_path.exists());
        assert!(renamed.clip_path.exists());
        assert!(renamed
            .clip_path
            .ends_with("dQw4w9WgXcQ_01_brand-new-title.mp4"));
        assert!(renamed.artifacts[0]
            .path
            .ends_with("dQw4w9WgXcQ_01_brand-new-title_thumb.jpg"));
        assert!(renamed.artifacts[0].path.exists());
    }

    #[tokio::test]
    async fn test_retitle_same_slug_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let (store, record) = store_with_files(&dir).await;

        let renamed = retitle_unit(&store, &record.name, "old title!").await.unwrap();

        assert_eq!(renamed.name, record.name);
        assert_eq!(renamed.title, "old title!");
        assert!(record.clip_path.exists());
    }

    #[tokio::test]
    async fn test_rename_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let (store, record) = store_with_files(&dir).await;
        let taken = fixtures::unit_record("dQw4w9WgXcQ", 1, "Taken");
        store.save(&taken.name, &taken).await.unwrap();

        let err = retitle_unit(&store, &record.name, "Taken").await.unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert!(record.clip_path.exists());
        assert_eq!(store.read(&record.name).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_retitle_missing_record() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        let err = retitle_unit(&store, "missing_01_x", "y").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
