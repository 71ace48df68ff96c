//! FFmpeg-based clip extraction and thumbnails.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::config::ToolsConfig;
use super::process::run_tool;
use crate::pipeline::{ArtifactGenerator, ArtifactRequest, ClipExtractor, MediaHandle, Stage, StageError, Unit};

const SERVICE: &str = "ffmpeg";

/// Cuts unit clips out of acquired media with a stream copy.
pub struct FfmpegClipper {
    config: ToolsConfig,
    clips_dir: PathBuf,
}

impl FfmpegClipper {
    pub fn new(config: ToolsConfig, clips_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            clips_dir: clips_dir.into(),
        }
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    /// Builds ffmpeg arguments for extracting one unit.
    fn build_args(input: &Path, unit: &Unit, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", unit.start),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", unit.duration_secs()),
            "-c".to_string(),
            "copy".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl ClipExtractor for FfmpegClipper {
    async fn extract(
        &self,
        media: &MediaHandle,
        unit: &Unit,
        name: &str,
    ) -> Result<PathBuf, StageError> {
        if unit.duration_secs() <= 0.0 {
            return Err(StageError::new(
                Stage::Extract,
                format!("invalid unit bounds {:.3}..{:.3}", unit.start, unit.end),
            ));
        }

        tokio::fs::create_dir_all(&self.clips_dir)
            .await
            .map_err(|e| {
                StageError::new(
                    Stage::Extract,
                    format!("failed to create {}: {}", self.clips_dir.display(), e),
                )
            })?;

        let output = self.clips_dir.join(format!("{}.mp4", name));
        let args = Self::build_args(&media.path, unit, &output);
        run_tool(
            SERVICE,
            &self.config.ffmpeg_path,
            &args,
            Stage::Extract,
            self.config.timeout_secs,
        )
        .await?;
        Ok(output)
    }
}

/// Grabs one frame from the middle of a clip.
pub struct FfmpegThumbnailer {
    config: ToolsConfig,
}

impl FfmpegThumbnailer {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// Thumbnail path next to the clip, named after the record.
    fn output_path(request: &ArtifactRequest<'_>) -> PathBuf {
        request
            .clip_path
            .with_file_name(format!("{}_thumbnail.jpg", request.name))
    }

    fn build_args(request: &ArtifactRequest<'_>, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", request.unit.duration_secs() / 2.0),
            "-i".to_string(),
            request.clip_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl ArtifactGenerator for FfmpegThumbnailer {
    fn kind(&self) -> &str {
        "thumbnail"
    }

    async fn generate(&self, request: &ArtifactRequest<'_>) -> Result<PathBuf, StageError> {
        let output = Self::output_path(request);
        let args = Self::build_args(request, &output);
        run_tool(
            SERVICE,
            &self.config.ffmpeg_path,
            &args,
            Stage::Artifact,
            self.config.timeout_secs,
        )
        .await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_clip_args_use_unit_bounds() {
        let unit = &fixtures::units(2)[1];
        let args = FfmpegClipper::build_args(
            Path::new("/media/abc.mp4"),
            unit,
            Path::new("/clips/abc_02_unit-2.mp4"),
        );
        assert_eq!(args[2], "30.000");
        assert_eq!(args[6], "30.000");
        assert!(args.contains(&"copy".to_string()));
        assert_eq!(args.last().unwrap(), "/clips/abc_02_unit-2.mp4");
    }

    #[test]
    fn test_thumbnail_path_and_midpoint() {
        let unit = &fixtures::units(1)[0];
        let request = ArtifactRequest {
            name: "abc_01_unit-1",
            unit,
            clip_path: Path::new("/clips/abc_01_unit-1.mp4"),
        };
        let output = FfmpegThumbnailer::output_path(&request);
        assert_eq!(output, PathBuf::from("/clips/abc_01_unit-1_thumbnail.jpg"));

        let args = FfmpegThumbnailer::build_args(&request, &output);
        assert_eq!(args[2], "15.000");
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_unit() {
        let dir = tempfile::tempdir().unwrap();
        let clipper = FfmpegClipper::new(ToolsConfig::default(), dir.path());
        let media = MediaHandle {
            source_id: "abc".to_string(),
            path: dir.path().join("abc.mp4"),
        };
        let unit = Unit {
            start: 10.0,
            end: 10.0,
            title: "Empty".to_string(),
            description: String::new(),
            tags: Vec::new(),
        };

        let err = clipper.extract(&media, &unit, "abc_01_empty").await.unwrap_err();
        assert_eq!(err.stage, Stage::Extract);
        assert!(err.message.starts_with("invalid unit bounds"));
    }
}
