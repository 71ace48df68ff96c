//! External tool adapters.
//!
//! Thin implementations of the pipeline and dedup collaborator traits over
//! yt-dlp, ffmpeg and two JSON-over-HTTP services. Tool failures are mapped to
//! typed [`StageError`](crate::pipeline::StageError) categories here, so
//! nothing above this layer inspects raw tool output.

mod config;
mod ffmpeg;
mod http;
mod process;
mod ytdlp;

pub use config::{ServiceConfig, ToolsConfig};
pub use ffmpeg::{FfmpegClipper, FfmpegThumbnailer};
pub use http::{HttpSegmenter, HttpTranscriber};
pub use ytdlp::YtDlpSource;
