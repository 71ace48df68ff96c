//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! allowing batch runs to be tested end to end without yt-dlp, ffmpeg or any
//! network service.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipline_core::testing::{MockStages, MockRecordStore};
//!
//! let stages = MockStages::new();
//! let store = Arc::new(MockRecordStore::new());
//!
//! // Configure mock behaviour
//! stages.set_units(fixtures::units(3)).await;
//! stages.fail_ref("https://youtu.be/aaaaaaaaaaa", StageError::source_blocked(Stage::Acquire, "403")).await;
//!
//! let executor = stages.executor(store.clone());
//! ```

mod mock_dedup;
mod mock_executor;
mod mock_stages;

pub use mock_dedup::{MockDedupAuthority, MockFailureLedger, MockRecordStore, MockRestrictionProbe};
pub use mock_executor::{ExecutionEvent, MockExecutor};
pub use mock_stages::MockStages;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    use crate::pipeline::{unit_record_name, ArtifactRef, Unit, UnitRecord};

    /// Create `count` consecutive 30-second units titled "Unit 1", "Unit 2", ...
    pub fn units(count: usize) -> Vec<Unit> {
        (1..=count)
            .map(|i| Unit {
                start: (i - 1) as f64 * 30.0,
                end: i as f64 * 30.0,
                title: format!("Unit {}", i),
                description: format!("Description of unit {}.", i),
                tags: vec!["test".to_string()],
            })
            .collect()
    }

    /// Create a unit record with a clip and one thumbnail artifact.
    pub fn unit_record(source_id: &str, position: usize, title: &str) -> UnitRecord {
        let name = unit_record_name(source_id, position, title);
        UnitRecord {
            source_id: source_id.to_string(),
            source_key: source_id.to_string(),
            source_ref: format!("https://www.youtube.com/watch?v={}", source_id),
            source_title: format!("Title {}", source_id),
            position,
            title: title.to_string(),
            description: String::new(),
            tags: Vec::new(),
            start: (position - 1) as f64 * 30.0,
            end: position as f64 * 30.0,
            clip_path: PathBuf::from(format!("/clips/{}.mp4", name)),
            artifacts: vec![ArtifactRef {
                kind: "thumbnail".to_string(),
                path: PathBuf::from(format!("/clips/{}_thumb.jpg", name)),
            }],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            name,
        }
    }

    /// Create `count` distinct 11-character video ids.
    pub fn video_ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("vid{:08}", i)).collect()
    }

    /// Create short-link references for `count` distinct videos.
    pub fn video_refs(count: usize) -> Vec<String> {
        video_ids(count)
            .into_iter()
            .map(|id| format!("https://youtu.be/{}", id))
            .collect()
    }
}
