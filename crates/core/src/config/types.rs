use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::batch::BatchConfig;
use crate::pipeline::TranscriptionMode;
use crate::progress::ProgressSetting;
use crate::tools::{ServiceConfig, ToolsConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default = "default_transcription")]
    pub transcription: ServiceConfig,
    #[serde(default = "default_segmentation")]
    pub segmentation: ServiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            batch: BatchConfig::default(),
            storage: StorageConfig::default(),
            tools: ToolsConfig::default(),
            transcription: default_transcription(),
            segmentation: default_segmentation(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Where records, media and dedup lists live on disk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// One JSON file per unit record
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
    /// Downloaded media; clips go under `clips/`
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Optional deny list, one id or reference per line
    #[serde(default)]
    pub blacklist_path: Option<PathBuf>,
    /// Append-only JSONL ledger of restricted sources
    #[serde(default = "default_failed_ledger_path")]
    pub failed_ledger_path: PathBuf,
}

impl StorageConfig {
    pub fn clips_dir(&self) -> PathBuf {
        self.media_dir.join("clips")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            media_dir: default_media_dir(),
            blacklist_path: None,
            failed_ledger_path: default_failed_ledger_path(),
        }
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("data/records")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_failed_ledger_path() -> PathBuf {
    PathBuf::from("data/failed.jsonl")
}

fn default_transcription() -> ServiceConfig {
    ServiceConfig::new("http://localhost:9000/transcribe")
}

fn default_segmentation() -> ServiceConfig {
    ServiceConfig::new("http://localhost:9001/segment")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub batch: SanitizedBatchConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub transcription: SanitizedServiceConfig,
    pub segmentation: SanitizedServiceConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBatchConfig {
    pub default_max_concurrency: usize,
    pub max_concurrency_limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
    pub progress: ProgressSetting,
    pub transcription_mode: TranscriptionMode,
}

/// Sanitized service config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&ServiceConfig> for SanitizedServiceConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key_configured: config.api_key_configured(),
            timeout_secs: config.timeout_secs,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            batch: SanitizedBatchConfig {
                default_max_concurrency: config.batch.default_max_concurrency,
                max_concurrency_limit: config.batch.max_concurrency_limit,
                job_timeout_secs: config.batch.job_timeout_secs,
                progress: config.batch.progress,
                transcription_mode: config.batch.transcription_mode,
            },
            storage: config.storage.clone(),
            tools: config.tools.clone(),
            transcription: SanitizedServiceConfig::from(&config.transcription),
            segmentation: SanitizedServiceConfig::from(&config.segmentation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.batch.default_max_concurrency, 3);
        assert_eq!(config.storage.records_dir, PathBuf::from("data/records"));
        assert_eq!(config.storage.clips_dir(), PathBuf::from("data/media/clips"));
        assert!(config.storage.blacklist_path.is_none());
        assert_eq!(config.transcription.url, "http://localhost:9000/transcribe");
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[batch]
default_max_concurrency = 4
job_timeout_secs = 1200
progress = "off"
transcription_mode = "diarized"

[storage]
records_dir = "/srv/clipline/records"
blacklist_path = "/srv/clipline/blacklist.txt"

[tools]
ytdlp_path = "/usr/local/bin/yt-dlp"
check_restrictions = false

[transcription]
url = "https://asr.example.com/v1/transcribe"
api_key = "asr-secret"

[segmentation]
url = "http://segmenter:8000/segment"
timeout_secs = 120
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.batch.default_max_concurrency, 4);
        assert_eq!(config.batch.progress, ProgressSetting::Off);
        assert_eq!(config.batch.transcription_mode, TranscriptionMode::Diarized);
        assert_eq!(
            config.storage.blacklist_path,
            Some(PathBuf::from("/srv/clipline/blacklist.txt"))
        );
        assert_eq!(config.storage.media_dir, PathBuf::from("data/media"));
        assert!(!config.tools.check_restrictions);
        assert_eq!(config.tools.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.transcription.api_key.as_deref(), Some("asr-secret"));
        assert_eq!(config.segmentation.timeout_secs, 120);
    }

    #[test]
    fn test_sanitized_config_hides_api_keys() {
        let config = Config {
            transcription: ServiceConfig::new("https://asr.example.com").with_api_key("secret"),
            ..Config::default()
        };
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.transcription.api_key_configured);
        assert!(!sanitized.segmentation.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
