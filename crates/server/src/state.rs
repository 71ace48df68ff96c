use std::sync::Arc;
use clipline_core::{BatchService, Config, RecordStore, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    batches: BatchService,
    store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: Config, batches: BatchService, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            batches,
            store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn batches(&self) -> &BatchService {
        &self.batches
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }
}
