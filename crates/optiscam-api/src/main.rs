//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use optiscam_media::{FfmpegBackend, YtDlpFetcher};
use optiscam_ml_client::MlClient;
use optiscam_worker::{Collaborators, JobManager, WorkerConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use optiscam_api::{create_router, metrics, ApiConfig, AppState};

/// How often the sidecar is polled until it reports its models loaded.
const MODEL_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing()?;

    // reqwest's rustls backend needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }
    info!("Starting optiscam-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        work_dir = %worker_config.work_dir.display(),
        max_jobs = worker_config.max_concurrent_jobs,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&worker_config.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", worker_config.work_dir.display()))?;
    if let Some(report_dir) = &worker_config.report_dir {
        tokio::fs::create_dir_all(report_dir)
            .await
            .with_context(|| format!("creating report dir {}", report_dir.display()))?;
    }

    let ml = Arc::new(MlClient::from_env().context("building model sidecar client")?);
    info!(url = %ml.base_url(), "Model sidecar client ready");

    let mut fetcher = YtDlpFetcher::new().with_timeout(config.download_timeout_secs);
    if let Some(cookies) = &config.ytdlp_cookies {
        fetcher = fetcher.with_cookies(cookies);
    }

    let collaborators = Collaborators {
        media: Arc::new(FfmpegBackend::new()),
        text: ml.clone(),
        speech: ml.clone(),
        vlm: ml.clone(),
    };
    let jobs = JobManager::new(collaborators, Arc::new(fetcher), worker_config);
    let state = AppState::new(config.clone(), jobs, ml);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing Prometheus recorder")?)
    } else {
        None
    };

    tokio::spawn(watch_models(state.clone()));

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("optiscam=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Poll the sidecar until it reports ready, so `/health` can report
/// `models_loaded` without calling out itself.
async fn watch_models(state: AppState) {
    loop {
        match state.ml.health_check().await {
            Ok(true) => {
                state.set_models_loaded(true);
                info!("Model sidecar reports models loaded");
                return;
            }
            Ok(false) => warn!("Model sidecar not ready yet"),
            Err(e) => warn!("Model sidecar health check failed: {}", e),
        }
        tokio::time::sleep(MODEL_POLL_INTERVAL).await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
