//! Common test utilities for integration tests.
//!
//! Provides a test fixture that wires the router to mock pipeline stages and
//! a filesystem record store in a temporary directory.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use clipline_core::testing::MockStages;
use clipline_core::{
    BatchConfig, BatchService, BlacklistSet, Config, FsRecordStore, JsonlFailureLedger,
    ProgressSetting, RecordStore, ServiceConfig, StorageConfig,
};

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Test fixture with a configured router and its collaborators.
pub struct TestFixture {
    pub router: Router,
    pub stages: MockStages,
    pub store: Arc<FsRecordStore>,
    pub temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a new test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        let config = Config {
            batch: BatchConfig {
                max_concurrency_limit: test_config.max_concurrency_limit,
                progress: ProgressSetting::Off,
                ..BatchConfig::default()
            },
            storage: StorageConfig {
                records_dir: root.join("records"),
                media_dir: root.join("media"),
                blacklist_path: None,
                failed_ledger_path: root.join("failed.jsonl"),
            },
            transcription: ServiceConfig::new("http://transcriber.test/transcribe")
                .with_api_key("secret-transcription-key"),
            segmentation: ServiceConfig::new("http://segmenter.test/segment"),
            ..Config::default()
        };

        let stages = MockStages::new();
        let store = Arc::new(FsRecordStore::new(&config.storage.records_dir));
        let executor = stages.executor(store.clone());

        let batches = BatchService::new(
            config.batch.clone(),
            Arc::new(executor),
            Arc::new(BlacklistSet::from_ids(test_config.blacklist)),
            store.clone(),
            Arc::new(JsonlFailureLedger::new(&config.storage.failed_ledger_path)),
        );

        let state = Arc::new(clipline_server::state::AppState::new(
            config,
            batches,
            store.clone() as Arc<dyn RecordStore>,
        ));

        let router = clipline_server::api::create_router(state);

        Self {
            router,
            stages,
            store,
            temp_dir,
        }
    }

    /// Directory for clip files created by tests.
    pub fn clips_dir(&self) -> PathBuf {
        self.temp_dir.path().join("clips")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Source ids on the blacklist
    pub blacklist: Vec<String>,
    /// Highest concurrency a request may ask for
    pub max_concurrency_limit: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            blacklist: Vec::new(),
            max_concurrency_limit: 8,
        }
    }
}

impl TestConfig {
    /// Create config with the given ids blacklisted.
    pub fn with_blacklist(ids: &[&str]) -> Self {
        Self {
            blacklist: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
