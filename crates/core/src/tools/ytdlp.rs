//! yt-dlp based source resolution, download and restriction checks.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::config::ToolsConfig;
use super::process::run_tool;
use crate::dedup::{ContentRestriction, DedupError, RestrictionProbe};
use crate::pipeline::{
    FailureCategory, MediaAcquirer, MediaHandle, ResolvedSource, SourceResolver, Stage, StageError,
};

const SERVICE: &str = "yt-dlp";

/// Age limit at or above which a source is treated as restricted.
const RESTRICTED_AGE_LIMIT: u32 = 18;

/// Metadata fields read from `--dump-single-json`.
#[derive(Debug, Clone, Deserialize)]
struct SourceMetadata {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    age_limit: Option<u32>,
}

/// yt-dlp adapter.
///
/// Resolves references, downloads media into `media_dir`, and reports
/// age-restricted sources.
pub struct YtDlpSource {
    config: ToolsConfig,
    media_dir: PathBuf,
}

impl YtDlpSource {
    pub fn new(config: ToolsConfig, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            media_dir: media_dir.into(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    async fn metadata(&self, source_ref: &str, stage: Stage) -> Result<SourceMetadata, StageError> {
        let args = metadata_args(source_ref);
        let stdout = run_tool(
            SERVICE,
            &self.config.ytdlp_path,
            &args,
            stage,
            self.config.timeout_secs,
        )
        .await?;
        parse_metadata(&stdout, stage)
    }

    fn download_args(&self, source: &ResolvedSource) -> Vec<String> {
        let template = self.media_dir.join(format!("{}.%(ext)s", source.id));
        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "-f".to_string(),
            self.config.format.clone(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--".to_string(),
            source.locator.clone(),
        ]
    }
}

fn metadata_args(source_ref: &str) -> Vec<String> {
    vec![
        "--dump-single-json".to_string(),
        "--no-playlist".to_string(),
        "--skip-download".to_string(),
        "--".to_string(),
        source_ref.to_string(),
    ]
}

fn parse_metadata(output: &str, stage: Stage) -> Result<SourceMetadata, StageError> {
    serde_json::from_str(output)
        .map_err(|e| StageError::new(stage, format!("invalid {} metadata: {}", SERVICE, e)))
}

#[async_trait]
impl SourceResolver for YtDlpSource {
    async fn resolve(&self, source_ref: &str) -> Result<ResolvedSource, StageError> {
        let metadata = self.metadata(source_ref, Stage::Resolve).await?;
        Ok(ResolvedSource {
            title: metadata
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| metadata.id.clone()),
            locator: metadata
                .webpage_url
                .unwrap_or_else(|| source_ref.to_string()),
            duration_secs: metadata.duration,
            id: metadata.id,
        })
    }
}

#[async_trait]
impl MediaAcquirer for YtDlpSource {
    async fn acquire(&self, source: &ResolvedSource) -> Result<MediaHandle, StageError> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| {
                StageError::new(
                    Stage::Acquire,
                    format!("failed to create {}: {}", self.media_dir.display(), e),
                )
            })?;

        let stdout = run_tool(
            SERVICE,
            &self.config.ytdlp_path,
            &self.download_args(source),
            Stage::Acquire,
            self.config.timeout_secs,
        )
        .await?;

        let path = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.media_dir.join(format!("{}.mp4", source.id)));

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StageError::new(
                Stage::Acquire,
                format!("download finished but {} is missing", path.display()),
            ));
        }

        debug!(source_id = %source.id, path = %path.display(), "Media acquired");
        Ok(MediaHandle {
            source_id: source.id.clone(),
            path,
        })
    }
}

#[async_trait]
impl RestrictionProbe for YtDlpSource {
    async fn check(
        &self,
        source_ref: &str,
        _source_id: &str,
    ) -> Result<ContentRestriction, DedupError> {
        match self.metadata(source_ref, Stage::Dedup).await {
            Ok(metadata) => Ok(restriction_for(&metadata)),
            Err(e) if e.category == FailureCategory::AgeRestricted => {
                Ok(ContentRestriction::Restricted {
                    reason: e.category.short_reason().to_string(),
                })
            }
            Err(e) => Err(DedupError::probe(e.message)),
        }
    }
}

fn restriction_for(metadata: &SourceMetadata) -> ContentRestriction {
    match metadata.age_limit {
        Some(limit) if limit >= RESTRICTED_AGE_LIMIT => ContentRestriction::Restricted {
            reason: format!("age limit {}", limit),
        },
        _ => ContentRestriction::Unrestricted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "duration": 212.0,
        "age_limit": 0,
        "formats": []
    }"#;

    #[test]
    fn test_parse_metadata() {
        let metadata = parse_metadata(METADATA, Stage::Resolve).unwrap();
        assert_eq!(metadata.id, "dQw4w9WgXcQ");
        assert_eq!(metadata.duration, Some(212.0));
        assert_eq!(restriction_for(&metadata), ContentRestriction::Unrestricted);
    }

    #[test]
    fn test_parse_metadata_invalid() {
        let err = parse_metadata("not json", Stage::Resolve).unwrap_err();
        assert_eq!(err.stage, Stage::Resolve);
        assert!(err.message.starts_with("invalid yt-dlp metadata"));
    }

    #[test]
    fn test_restriction_from_age_limit() {
        let metadata = parse_metadata(r#"{"id": "abc", "age_limit": 18}"#, Stage::Dedup).unwrap();
        assert_eq!(
            restriction_for(&metadata),
            ContentRestriction::Restricted {
                reason: "age limit 18".to_string()
            }
        );
    }

    #[test]
    fn test_download_args() {
        let source = YtDlpSource::new(ToolsConfig::default(), "/media");
        let resolved = ResolvedSource {
            id: "abc".to_string(),
            title: "Title".to_string(),
            locator: "https://www.youtube.com/watch?v=abc".to_string(),
            duration_secs: None,
        };
        let args = source.download_args(&resolved);
        assert!(args.contains(&"/media/abc.%(ext)s".to_string()));
        assert_eq!(
            &args[args.len() - 2..],
            ["--", "https://www.youtube.com/watch?v=abc"]
        );
    }

    #[test]
    fn test_metadata_args_skip_download() {
        let args = metadata_args("https://youtu.be/abc");
        assert_eq!(args[0], "--dump-single-json");
        assert!(args.contains(&"--skip-download".to_string()));
        assert_eq!(&args[args.len() - 2..], ["--", "https://youtu.be/abc"]);
    }

    #[test]
    fn test_option_like_reference_stays_positional() {
        let args = metadata_args("--exec=touch /tmp/x");
        let marker = args.iter().position(|arg| arg == "--").unwrap();
        assert_eq!(args[marker + 1], "--exec=touch /tmp/x");
        assert_eq!(marker + 2, args.len());

        let source = YtDlpSource::new(ToolsConfig::default(), "/media");
        let resolved = ResolvedSource {
            id: "x".to_string(),
            title: "x".to_string(),
            locator: "--exec=touch /tmp/x".to_string(),
            duration_secs: None,
        };
        let args = source.download_args(&resolved);
        assert_eq!(&args[args.len() - 2..], ["--", "--exec=touch /tmp/x"]);
    }

    #[tokio::test]
    async fn test_resolve_missing_binary() {
        let config = ToolsConfig {
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            ..ToolsConfig::default()
        };
        let source = YtDlpSource::new(config, "/tmp");
        let err = source.resolve("https://youtu.be/abc").await.unwrap_err();
        assert_eq!(err.stage, Stage::Resolve);
    }

    #[tokio::test]
    async fn test_probe_error_surfaces_as_dedup_error() {
        let config = ToolsConfig {
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            ..ToolsConfig::default()
        };
        let source = YtDlpSource::new(config, "/tmp");
        let result = source.check("https://youtu.be/abc", "abc").await;
        assert!(matches!(result, Err(DedupError::Probe(_))));
    }
}
