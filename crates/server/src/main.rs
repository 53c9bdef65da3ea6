use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamvault_core::accelerator::{Aria2Client, TransferWatcher};
use streamvault_core::catalog::{ItemStore, SqliteStore};
use streamvault_core::extractor::{
    ExtractionStrategy, GenericScraper, HostScraper, SegmentedHostClient, YtDlpExtractor,
};
use streamvault_core::gateway::{StreamGateway, BROWSER_USER_AGENT};
use streamvault_core::probe::FfmpegProbe;
use streamvault_core::{
    load_config, validate_config, Config, IngestPipeline, StatusBroadcaster,
};

use streamvault_server::api::create_router;
use streamvault_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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
    let config_path = std::env::var("STREAMVAULT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; every section has defaults, so a missing file just
    // means a stock deployment.
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults", config_path);
        Config::default()
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Create SQLite catalog store
    let store: Arc<dyn ItemStore> = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to create catalog store")?,
    );
    info!("Catalog store initialized");

    // Status broadcaster feeding WebSocket clients
    let broadcaster = StatusBroadcaster::default();

    // Shared HTTP client for scrapers and thumbnail downloads. The browser
    // user agent matters: several hosts serve scrapers a different page.
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.extractor.http_timeout_secs))
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .context("Failed to build http client")?;

    // Extraction sources
    let host_strategy: Arc<dyn ExtractionStrategy> = Arc::new(HostScraper::new(
        http_client.clone(),
        config.extractor.host_marker.clone(),
    ));
    let generic_strategy: Arc<dyn ExtractionStrategy> =
        Arc::new(GenericScraper::new(http_client.clone()));
    let segmented = Arc::new(SegmentedHostClient::new(
        http_client.clone(),
        config.extractor.segmented_host.clone(),
    ));
    let fallback = Arc::new(YtDlpExtractor::new(config.extractor.fallback.clone()));

    // Media probe toolchain
    let probe = Arc::new(FfmpegProbe::new(config.probe.clone()));

    // Ingestion pipeline
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::clone(&store),
        host_strategy,
        generic_strategy,
        segmented,
        fallback.clone(),
        probe,
        broadcaster.clone(),
        http_client,
        config.pipeline.clone(),
    ));
    info!("Ingestion pipeline initialized");

    // Download accelerator (engine is launched lazily on first submission)
    let accelerator = Arc::new(Aria2Client::new(config.accelerator.clone()));
    info!(
        "Download accelerator initialized (engine: {}, rpc port: {})",
        config.accelerator.engine_binary, config.accelerator.rpc_port
    );

    // Poll engine transfers into the catalog and onto the broadcaster
    let watcher = TransferWatcher::new(
        Arc::clone(&accelerator),
        Arc::clone(&store),
        broadcaster.clone(),
        Duration::from_secs(config.accelerator.poll_interval_secs),
    );
    tokio::spawn(watcher.run());

    // Stream gateway
    let gateway = Arc::new(StreamGateway::new(
        Arc::clone(&store),
        fallback,
        config.gateway.clone(),
    ));
    info!("Stream gateway initialized");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        pipeline,
        accelerator,
        gateway,
        broadcaster,
    ));

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

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
