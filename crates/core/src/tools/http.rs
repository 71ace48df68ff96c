//! JSON-over-HTTP clients for the transcription and segmentation services.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

use super::config::ServiceConfig;
use crate::metrics;
use crate::pipeline::{
    MediaHandle, Segmenter, Stage, StageError, Transcriber, Transcript, TranscriptSegment,
    TranscriptionMode, Unit,
};

/// Shared POST-and-decode logic for both services.
struct JsonService {
    client: reqwest::Client,
    config: ServiceConfig,
    name: &'static str,
}

impl JsonService {
    fn new(name: &'static str, config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            name,
        }
    }

    async fn post<B, T>(&self, stage: Stage, body: &B) -> Result<T, StageError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.send(stage, body).await;
        metrics::observe_external_call(
            self.name,
            stage.as_str(),
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }

    async fn send<B, T>(&self, stage: Stage, body: &B) -> Result<T, StageError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(&self.config.url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(body);
        if let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StageError::timed_out(stage, self.config.timeout_secs)
            } else {
                StageError::new(stage, format!("{} request failed: {}", self.name, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceError>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(StageError::new(
                stage,
                format!("{} returned {}: {}", self.name, status.as_u16(), message.trim()),
            ));
        }

        response.json().await.map_err(|e| {
            StageError::new(stage, format!("invalid {} response: {}", self.name, e))
        })
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

// ============================================================================
// Transcription
// ============================================================================

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    source_id: &'a str,
    media_path: &'a Path,
    mode: TranscriptionMode,
}

/// Client for the transcription service.
///
/// Posts the media path and mode, receives timed segments.
pub struct HttpTranscriber {
    service: JsonService,
}

impl HttpTranscriber {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            service: JsonService::new("transcription", config),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        media: &MediaHandle,
        mode: TranscriptionMode,
    ) -> Result<Transcript, StageError> {
        let request = TranscribeRequest {
            source_id: &media.source_id,
            media_path: &media.path,
            mode,
        };
        self.service.post(Stage::Transcribe, &request).await
    }
}

// ============================================================================
// Segmentation
// ============================================================================

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    segments: &'a [TranscriptSegment],
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    units: Vec<Unit>,
}

/// Client for the segmentation service.
pub struct HttpSegmenter {
    service: JsonService,
}

impl HttpSegmenter {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            service: JsonService::new("segmentation", config),
        }
    }
}

#[async_trait]
impl Segmenter for HttpSegmenter {
    async fn segment(
        &self,
        segments: &[TranscriptSegment],
        full_text: &str,
    ) -> Result<Vec<Unit>, StageError> {
        let request = SegmentRequest {
            segments,
            text: full_text,
        };
        let response: SegmentResponse = self.service.post(Stage::Segment, &request).await?;
        Ok(response.units)
    }
}
