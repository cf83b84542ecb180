// Job dispatch: resolve a job's invocation target, run it, record the outcome
//
// Every attempt produces exactly one log entry. Handler errors and panics
// are contained here and never reach the trigger engine.

pub mod registry;
pub mod target;

pub use registry::{FnHandler, JobHandler, JobRegistry};
pub use target::{InvocationArg, InvocationTarget};

use crate::errors::DispatchError;
use crate::models::{Job, JobLogEntry, LogStatus, TriggerSource};
use crate::store::JobLogStore;
use crate::telemetry;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Log messages are cut to this many characters
const MAX_MESSAGE_CHARS: usize = 2000;

/// Summary of one dispatched run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: LogStatus,
    pub message: Option<String>,
    pub duration_ms: i64,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == LogStatus::Success
    }
}

/// Runs jobs through the handler registry and records each attempt
pub struct JobDispatcher {
    registry: Arc<JobRegistry>,
    log_store: Arc<dyn JobLogStore>,
}

impl JobDispatcher {
    pub fn new(registry: Arc<JobRegistry>, log_store: Arc<dyn JobLogStore>) -> Self {
        Self {
            registry,
            log_store,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Parse a target and check that its handler exists
    pub fn validate_target(&self, raw: &str) -> Result<InvocationTarget, DispatchError> {
        let target = InvocationTarget::parse(raw)?;
        if !self.registry.contains(&target.name) {
            return Err(DispatchError::UnknownTarget(target.name));
        }
        Ok(target)
    }

    /// Run a job once and append its log entry
    #[instrument(skip(self, job), fields(job_id = job.id, job_group = %job.group, job_name = %job.name, source = %source))]
    pub async fn dispatch(&self, job: &Job, source: TriggerSource) -> RunOutcome {
        let start_time = Utc::now();
        let started = Instant::now();

        let result = self.invoke(job).await;

        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as i64;
        telemetry::record_job_duration(job.id, &job.name, elapsed.as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                info!(duration_ms, "Job run succeeded");
                telemetry::record_job_success(job.id, &job.name);
                RunOutcome {
                    status: LogStatus::Success,
                    message: Some(format!("{} finished in {} ms", job.name, duration_ms)),
                    duration_ms,
                }
            }
            Err(e) => {
                error!(duration_ms, error = %e, "Job run failed");
                telemetry::record_job_failure(job.id, &job.name, failure_reason(&e));
                RunOutcome {
                    status: LogStatus::Failure,
                    message: Some(truncate(&e.to_string())),
                    duration_ms,
                }
            }
        };

        self.append_log(job, source, &outcome, start_time).await;
        outcome
    }

    /// Record a fire that the execution guard blocked
    #[instrument(skip(self, job), fields(job_id = job.id, job_group = %job.group, job_name = %job.name))]
    pub async fn record_skipped(&self, job: &Job, source: TriggerSource) -> RunOutcome {
        info!("Previous run still in flight, fire skipped");
        telemetry::record_job_skipped(job.id, &job.name);

        let outcome = RunOutcome {
            status: LogStatus::Skipped,
            message: Some("Skipped: previous run still in progress".to_string()),
            duration_ms: 0,
        };
        self.append_log(job, source, &outcome, Utc::now()).await;
        outcome
    }

    async fn invoke(&self, job: &Job) -> Result<(), DispatchError> {
        let target = InvocationTarget::parse(&job.invocation_target)?;
        let handler = self
            .registry
            .get(&target.name)
            .ok_or_else(|| DispatchError::UnknownTarget(target.name.clone()))?;

        match AssertUnwindSafe(handler.invoke(&target.args))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchError::HandlerFailed(format!("{:#}", e))),
            Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
        }
    }

    async fn append_log(
        &self,
        job: &Job,
        source: TriggerSource,
        outcome: &RunOutcome,
        start_time: chrono::DateTime<Utc>,
    ) {
        let end_time = Utc::now();
        let entry = JobLogEntry {
            id: 0,
            job_id: job.id,
            job_name: job.name.clone(),
            job_group: job.group.clone(),
            invocation_target: job.invocation_target.clone(),
            status: outcome.status,
            trigger_source: source,
            message: outcome.message.clone(),
            start_time,
            end_time,
            duration_ms: outcome.duration_ms,
            created_at: end_time,
        };

        // A log write failure must not turn into a job failure
        if let Err(e) = self.log_store.append(&entry).await {
            error!(error = %e, "Failed to append job log entry");
        }
    }
}

fn failure_reason(err: &DispatchError) -> &'static str {
    match err {
        DispatchError::InvalidTarget { .. } => "invalid_target",
        DispatchError::UnknownTarget(_) => "unknown_target",
        DispatchError::HandlerFailed(_) => "handler_failed",
        DispatchError::Panicked(_) => "panicked",
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;
    use crate::models::JobSpec;
    use crate::store::{InMemoryJobLogStore, MockJobLogStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(target: &str) -> Job {
        Job::from_spec(1, &JobSpec::new("sample", "0 * * * * ?", target), Utc::now())
    }

    fn registry() -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry
            .register_fn("test.ok", |_| async { Ok(()) })
            .register_fn("test.fail", |_| async { Err(anyhow::anyhow!("boom")) })
            .register_fn("test.panic", |_| async { panic!("handler exploded") })
            .register_fn("test.echo", |args| async move {
                match args.first().and_then(InvocationArg::as_str) {
                    Some("ok") => Ok(()),
                    other => Err(anyhow::anyhow!("unexpected argument {:?}", other)),
                }
            });
        registry
    }

    fn dispatcher(log: Arc<InMemoryJobLogStore>) -> JobDispatcher {
        JobDispatcher::new(Arc::new(registry()), log)
    }

    #[tokio::test]
    async fn test_success_writes_one_log_entry() {
        let log = Arc::new(InMemoryJobLogStore::new());
        let outcome = dispatcher(log.clone())
            .dispatch(&job("test.ok"), TriggerSource::Scheduled)
            .await;

        assert!(outcome.is_success());
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert_eq!(entries[0].trigger_source, TriggerSource::Scheduled);
        assert!(entries[0].end_time >= entries[0].start_time);
    }

    #[tokio::test]
    async fn test_handler_error_is_recorded_as_failure() {
        let log = Arc::new(InMemoryJobLogStore::new());
        let outcome = dispatcher(log.clone())
            .dispatch(&job("test.fail"), TriggerSource::Manual)
            .await;

        assert_eq!(outcome.status, LogStatus::Failure);
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let log = Arc::new(InMemoryJobLogStore::new());
        let outcome = dispatcher(log.clone())
            .dispatch(&job("test.panic"), TriggerSource::Scheduled)
            .await;

        assert_eq!(outcome.status, LogStatus::Failure);
        assert!(outcome.message.unwrap().contains("handler exploded"));
        assert_eq!(log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_arguments_reach_handler() {
        let log = Arc::new(InMemoryJobLogStore::new());
        let d = dispatcher(log.clone());
        assert!(d.dispatch(&job("test.echo('ok')"), TriggerSource::Manual).await.is_success());
        assert!(!d.dispatch(&job("test.echo('no')"), TriggerSource::Manual).await.is_success());
    }

    #[tokio::test]
    async fn test_unknown_target_fails_at_run_time() {
        let log = Arc::new(InMemoryJobLogStore::new());
        let outcome = dispatcher(log.clone())
            .dispatch(&job("missing.handler"), TriggerSource::Scheduled)
            .await;
        assert_eq!(outcome.status, LogStatus::Failure);
        assert_eq!(log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_record_skipped() {
        let log = Arc::new(InMemoryJobLogStore::new());
        dispatcher(log.clone())
            .record_skipped(&job("test.ok"), TriggerSource::Scheduled)
            .await;
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Skipped);
    }

    #[tokio::test]
    async fn test_log_append_failure_does_not_fail_run() {
        let appends = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&appends);

        let mut store = MockJobLogStore::new();
        store.expect_append().returning(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(DatabaseError::QueryFailed("log table unavailable".to_string()))
        });

        let d = JobDispatcher::new(Arc::new(registry()), Arc::new(store));
        let outcome = d.dispatch(&job("test.ok"), TriggerSource::Scheduled).await;
        assert!(outcome.is_success());
        assert_eq!(appends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate_target() {
        let d = dispatcher(Arc::new(InMemoryJobLogStore::new()));
        assert!(d.validate_target("test.ok()").is_ok());
        assert!(matches!(
            d.validate_target("nothing.here"),
            Err(DispatchError::UnknownTarget(_))
        ));
        assert!(matches!(
            d.validate_target("bad target!"),
            Err(DispatchError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_truncate_long_message() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 50);
        assert_eq!(truncate(&long).chars().count(), MAX_MESSAGE_CHARS);
    }
}
