use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::task::TaskTracker;
use wavelength_api::config::ServerConfig;
use wavelength_api::router::build_app_router;
use wavelength_api::state::AppState;
use wavelength_db::store::Stores;
use wavelength_events::{EventBus, EventLogSink, RunTelemetry};
use wavelength_pipeline::settings::{PipelineSettings, ProviderEndpoints};
use wavelength_pipeline::PipelineServices;
use wavelength_worker::runtime::{init_tracing, shutdown_signal};
use wavelength_worker::{WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("wavelength_api=debug,wavelength_pipeline=debug,tower_http=debug");

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = wavelength_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    wavelength_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    wavelength_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    // --- Telemetry ---
    let stores = Stores::postgres(pool);
    let bus = Arc::new(EventBus::default());
    let log_sink = tokio::spawn(EventLogSink::run(bus.subscribe()));
    let telemetry = RunTelemetry::new(stores.events.clone(), bus.clone());

    // --- Pipeline ---
    let settings = Arc::new(PipelineSettings::from_env());
    let endpoints = ProviderEndpoints::from_env();
    let services = PipelineServices::from_endpoints(stores, telemetry, settings, &endpoints)
        .context("Failed to build pipeline services")?;

    // --- Embedded workers ---
    let workers = WorkerPool::new(
        services.queue.clone(),
        WorkerConfig {
            worker_count: config.embedded_workers,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            ..WorkerConfig::from_env()
        },
    );
    workers.start();

    // --- Server ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let runs = TaskTracker::new();
    let state = AppState {
        services,
        config: Arc::new(config),
        runs: runs.clone(),
    };
    let app = build_app_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("HTTP server stopped, draining workers");
    if !workers.shutdown().await {
        tracing::warn!("Exiting with jobs still running");
    }
    runs.close();
    if tokio::time::timeout(shutdown_timeout, runs.wait()).await.is_err() {
        tracing::warn!(still_running = runs.len(), "Exiting with process-next runs still running");
    }
    drop(workers);
    drop(bus);
    if tokio::time::timeout(Duration::from_secs(5), log_sink).await.is_err() {
        tracing::warn!("Event log sink did not stop in time");
    }

    tracing::info!("Server shut down");
    Ok(())
}
