// Main entry point for the background removal service

use bg_remover::{
    build_router, AppState, BatchStore, Config, ImageProcessor, Metrics, OnnxBackgroundRemover,
    ScratchStorage,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    let filter = EnvFilter::new(format!(
        "bg_remover={},ort=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== BACKGROUND REMOVAL SERVICE ===");
    info!(
        "Config: model={} input={}px sessions={} timeout={}",
        config.model_path(),
        config.input_size(),
        config.onnx_pool_size(),
        config
            .processing_timeout()
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "off".to_string())
    );

    let scratch = ScratchStorage::new(config.upload_dir());
    scratch.ensure_dir()?;
    info!("Upload directory: {}", scratch.dir().display());

    // Session creation and warmup block for a while
    info!("Initializing background removal model...");
    let model_config = Arc::clone(&config);
    let remover = tokio::task::spawn_blocking(move || OnnxBackgroundRemover::new(&model_config))
        .await
        .context("Model initialization task panicked")??;
    let processor: Arc<dyn ImageProcessor> = Arc::new(remover);

    let state = AppState {
        config: config.clone(),
        processor,
        store: Arc::new(BatchStore::new()),
        scratch,
        metrics: Metrics::new(),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /health                  - Health check");
    info!("  GET  /metrics                 - Prometheus metrics");
    info!("  POST /remove-bg               - Remove background (field: image)");
    info!("  POST /remove-bg/batch         - Queue a batch (field: images)");
    info!("  GET  /queue-status/:batch_id  - Batch status");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
