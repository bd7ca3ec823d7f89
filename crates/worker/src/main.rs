use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use wavelength_db::store::Stores;
use wavelength_events::{EventBus, EventLogSink, RunTelemetry};
use wavelength_pipeline::settings::{PipelineSettings, ProviderEndpoints};
use wavelength_pipeline::PipelineServices;
use wavelength_worker::runtime::{init_tracing, shutdown_signal};
use wavelength_worker::{WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("wavelength_worker=debug,wavelength_pipeline=debug");

    let config = WorkerConfig::from_env();

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

    // --- Workers ---
    let workers = WorkerPool::new(services.queue.clone(), config.clone());
    workers.start();

    shutdown_signal().await;

    // --- Post-shutdown cleanup ---
    if !workers.shutdown().await {
        tracing::warn!("Exiting with jobs still running");
    }
    drop(workers);
    drop(services);
    drop(bus);
    if tokio::time::timeout(Duration::from_secs(5), log_sink).await.is_err() {
        tracing::warn!("Event log sink did not stop in time");
    }

    tracing::info!("Worker stopped");
    Ok(())
}
