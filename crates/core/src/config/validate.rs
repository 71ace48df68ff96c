use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Batch concurrency default and limit are positive, default within limit
/// - Service URLs are not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let batch = &config.batch;
    if batch.default_max_concurrency == 0 {
        return Err(invalid("batch.default_max_concurrency must be at least 1"));
    }
    if batch.max_concurrency_limit == 0 {
        return Err(invalid("batch.max_concurrency_limit must be at least 1"));
    }
    if batch.default_max_concurrency > batch.max_concurrency_limit {
        return Err(invalid(format!(
            "batch.default_max_concurrency ({}) exceeds batch.max_concurrency_limit ({})",
            batch.default_max_concurrency, batch.max_concurrency_limit
        )));
    }
    if batch.job_timeout_secs == Some(0) {
        return Err(invalid("batch.job_timeout_secs cannot be 0"));
    }

    for (section, service) in [
        ("transcription", &config.transcription),
        ("segmentation", &config.segmentation),
    ] {
        if service.url.trim().is_empty() {
            return Err(invalid(format!("{}.url cannot be empty", section)));
        }
    }

    Ok(())
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(reason.into())
}
