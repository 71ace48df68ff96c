//! Configuration for the external tool adapters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the yt-dlp and ffmpeg subprocess adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Timeout for a single tool invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Ask yt-dlp for the age limit before admitting an item.
    #[serde(default = "default_check_restrictions")]
    pub check_restrictions: bool,

    /// yt-dlp format selector used for downloads.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    1800
}

fn default_check_restrictions() -> bool {
    true
}

fn default_format() -> String {
    "bv*[height<=1080]+ba/b".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            check_restrictions: default_check_restrictions(),
            format: default_format(),
        }
    }
}

/// Connection settings for a JSON-over-HTTP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint URL requests are posted to.
    pub url: String,

    /// Bearer token, if the service requires one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

fn default_service_timeout() -> u64 {
    600
}

impl ServiceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout_secs: default_service_timeout(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Whether a non-empty API key is set.
    pub fn api_key_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_defaults() {
        let config: ToolsConfig = toml::from_str("").unwrap();
        assert_eq!(config, ToolsConfig::default());
        assert_eq!(config.ytdlp_path, PathBuf::from("yt-dlp"));
        assert!(config.check_restrictions);
    }

    #[test]
    fn test_service_requires_url() {
        let result: Result<ServiceConfig, _> = toml::from_str("timeout_secs = 5");
        assert!(result.is_err());
    }

    #[test]
    fn test_service_api_key_configured() {
        let config = ServiceConfig::new("http://localhost:9000");
        assert!(!config.api_key_configured());
        assert!(!config.clone().with_api_key("").api_key_configured());
        assert!(config.with_api_key("secret").api_key_configured());
    }
}
