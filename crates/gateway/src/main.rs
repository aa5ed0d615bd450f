use common::{Environment, TelemetryGuard};
use gateway::{AppState, logging, router};
use inference::backend::ort::OrtLoader;
use inference::{DetectorConfig, Platform, resolve};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = TelemetryGuard::from_env(logging::SERVICE_NAME)?;
    logging::setup_logging(Environment::from_env());

    let config = DetectorConfig::from_env()?;
    tracing::info!(
        backend = %config.backend,
        model = %config.model_path.display(),
        imgsz = config.imgsz,
        conf = config.conf_threshold,
        iou = config.iou_threshold,
        environment = config.environment.as_str(),
        "Detector starting"
    );

    // Model loading and the one-time export block; keep them off the runtime
    let resolve_config = config.clone();
    let context = tokio::task::spawn_blocking(move || {
        let loader = OrtLoader::new(resolve_config.imgsz);
        resolve(&resolve_config, &Platform::current(), &loader)
    })
    .await??;

    tracing::info!(
        backend = %context.backend(),
        imgsz = context.imgsz(),
        model = %config.model_path.display(),
        "Model loaded"
    );

    let app = router(AppState::new(context, config.max_upload_bytes));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Detector listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Detector stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
