// Bootstrap utilities for binary initialization
//
// Wires settings into stores, the dispatcher and the trigger engine so the
// scheduler binary and the integration tests build the same object graph.

use crate::config::{Settings, StoreBackend};
use crate::db::{DbPool, JobLogRepository, JobRepository};
use crate::dispatcher::{JobDispatcher, JobRegistry};
use crate::scheduler::{EngineConfig, TriggerEngine};
use crate::service::{JobLogService, JobService};
use crate::store::{InMemoryJobLogStore, InMemoryJobStore, JobLogStore, JobStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Job and log stores selected by configuration
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub logs: Arc<dyn JobLogStore>,
    /// Present for the Postgres backend so callers can close it on shutdown
    pub db_pool: Option<DbPool>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(InMemoryJobStore::new()),
            logs: Arc::new(InMemoryJobLogStore::new()),
            db_pool: None,
        }
    }

    pub fn postgres(pool: DbPool) -> Self {
        Self {
            jobs: Arc::new(JobRepository::new(pool.clone())),
            logs: Arc::new(JobLogRepository::new(pool.clone())),
            db_pool: Some(pool),
        }
    }
}

/// Fully wired scheduler components
pub struct SchedulerContext {
    pub engine: Arc<TriggerEngine>,
    pub jobs: JobService,
    pub logs: JobLogService,
}

/// Initialize database pool, running migrations when configured
///
/// # Errors
/// Returns error if the pool cannot connect or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Build the job and log stores for the configured backend
///
/// # Errors
/// Returns error if the Postgres backend is selected and the pool fails
#[tracing::instrument(skip(settings), fields(backend = ?settings.store.backend))]
pub async fn init_stores(settings: &Settings) -> Result<Stores> {
    let stores = match settings.store.backend {
        StoreBackend::Postgres => Stores::postgres(init_database_pool(settings).await?),
        StoreBackend::Memory => {
            info!("Using in-memory stores; jobs and logs are lost on exit");
            Stores::in_memory()
        }
    };
    Ok(stores)
}

/// Wire the dispatcher, trigger engine and services around `stores`
///
/// The engine is returned unstarted and empty; call `JobService::bootstrap`
/// to load persisted jobs.
///
/// # Errors
/// Returns error if the scheduler timezone is not a known IANA name
pub fn build_scheduler(
    settings: &Settings,
    stores: &Stores,
    registry: JobRegistry,
) -> Result<SchedulerContext> {
    let config = EngineConfig::from_settings(&settings.scheduler)
        .context("Invalid scheduler configuration")?;
    let handlers = registry.len();

    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::new(registry),
        Arc::clone(&stores.logs),
    ));
    let engine = Arc::new(TriggerEngine::new(config, dispatcher));

    info!(
        handlers,
        timezone = %engine.timezone(),
        "Scheduler components initialized"
    );

    Ok(SchedulerContext {
        jobs: JobService::new(Arc::clone(&stores.jobs), Arc::clone(&engine)),
        logs: JobLogService::new(Arc::clone(&stores.logs)),
        engine,
    })
}
