// Scheduler binary entry point

mod jobs;

use anyhow::{Context, Result};
use common::bootstrap::{build_scheduler, init_stores};
use common::config::Settings;
use common::scheduler::Scheduler;
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!(
        store_backend = ?settings.store.backend,
        timezone = %settings.scheduler.timezone,
        worker_pool_size = settings.scheduler.worker_pool_size,
        "Starting job scheduler"
    );

    let stores = init_stores(&settings).await?;
    let registry = jobs::builtin_registry(Arc::clone(&stores.logs));
    let ctx = build_scheduler(&settings, &stores, registry)?;

    let report = ctx.jobs.bootstrap().await.context("Failed to load persisted jobs")?;
    for failure in &report.failed {
        warn!(job_key = %failure.key, reason = %failure.reason, "Job not scheduled");
    }

    let engine = Arc::clone(&ctx.engine);
    let trigger_loop = tokio::spawn(async move {
        if let Err(e) = engine.start().await {
            error!(error = %e, "Trigger loop failed");
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received, stopping scheduler");

    if let Err(e) = ctx.engine.stop().await {
        error!(error = %e, "Error during scheduler shutdown");
    }
    if let Err(e) = trigger_loop.await {
        error!(error = %e, "Trigger loop task ended abnormally");
    }
    if let Some(pool) = &stores.db_pool {
        pool.close().await;
    }

    info!("Scheduler stopped");
    telemetry::shutdown_tracer();
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
