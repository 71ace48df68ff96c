use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipline_core::{
    load_config, validate_config, BatchService, BlacklistSet, Config, FfmpegClipper,
    FfmpegThumbnailer, FsRecordStore, HttpSegmenter, HttpTranscriber, JsonlFailureLedger,
    RecordStore, StagedExecutor, YtDlpSource,
};
use clipline_server::{api::create_router, metrics, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CLIPLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Records directory: {:?}", config.storage.records_dir);
    info!("Media directory: {:?}", config.storage.media_dir);

    let state = Arc::new(build_state(config.clone()).await?);

    // Register metrics before the first request
    once_cell::sync::Lazy::force(&metrics::REGISTRY);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wires the tool adapters, stores and batch service from configuration.
async fn build_state(config: Config) -> Result<AppState> {
    let store = Arc::new(FsRecordStore::new(config.storage.records_dir.clone()));

    let deny_list = match &config.storage.blacklist_path {
        Some(path) => {
            let list = BlacklistSet::load(path)
                .await
                .with_context(|| format!("Failed to load blacklist from {:?}", path))?;
            info!("Blacklist loaded with {} entries", list.len());
            list
        }
        None => {
            info!("No blacklist configured");
            BlacklistSet::new()
        }
    };

    let ledger = JsonlFailureLedger::new(config.storage.failed_ledger_path.clone());
    let source = Arc::new(YtDlpSource::new(
        config.tools.clone(),
        config.storage.media_dir.clone(),
    ));

    let executor = StagedExecutor::new(
        source.clone(),
        source.clone(),
        Arc::new(HttpTranscriber::new(config.transcription.clone())),
        Arc::new(HttpSegmenter::new(config.segmentation.clone())),
        Arc::new(FfmpegClipper::new(
            config.tools.clone(),
            config.storage.clips_dir(),
        )),
        store.clone() as Arc<dyn RecordStore>,
    )
    .with_artifact(Arc::new(FfmpegThumbnailer::new(config.tools.clone())))
    .with_mode(config.batch.transcription_mode);
    info!(
        "Pipeline ready (transcription mode: {})",
        executor.mode().as_str()
    );

    let mut batches = BatchService::new(
        config.batch.clone(),
        Arc::new(executor),
        Arc::new(deny_list),
        store.clone(),
        Arc::new(ledger),
    );
    if config.tools.check_restrictions {
        info!("Content restriction checks enabled");
        batches = batches.with_probe(source);
    }

    Ok(AppState::new(config, batches, store))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
