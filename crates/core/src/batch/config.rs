//! Batch configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::TranscriptionMode;
use crate::progress::ProgressSetting;

/// Configuration for batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrency used when a request does not name one.
    #[serde(default = "default_max_concurrency")]
    pub default_max_concurrency: usize,

    /// Highest concurrency a request may ask for.
    #[serde(default = "default_max_concurrency_limit")]
    pub max_concurrency_limit: usize,

    /// Abandon an admitted job after this many seconds. Unset means no limit.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Progress display: "auto", "live", "plain" or "off".
    #[serde(default)]
    pub progress: ProgressSetting,

    /// Transcription provider mode for every job.
    #[serde(default)]
    pub transcription_mode: TranscriptionMode,
}

fn default_max_concurrency() -> usize {
    3
}

fn default_max_concurrency_limit() -> usize {
    16
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: default_max_concurrency(),
            max_concurrency_limit: default_max_concurrency_limit(),
            job_timeout_secs: None,
            progress: ProgressSetting::default(),
            transcription_mode: TranscriptionMode::default(),
        }
    }
}

impl BatchConfig {
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
