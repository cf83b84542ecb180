// Job management: keeps persisted jobs and live triggers in step
//
// Every mutation is a store write followed by an engine change. The two are
// not transactional; when the engine step fails the store write is undone
// and the caller gets `SchedulerError::Consistency`.

use crate::errors::{DispatchError, EngineError, SchedulerError, ValidationError};
use crate::models::{Job, JobFilter, JobKey, JobSpec, JobStatus, JobView, Page, PageRequest};
use crate::schedule::{ensure_fires_after, next_fire_time, next_fire_times};
use crate::scheduler::TriggerEngine;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const MAX_NAME_CHARS: usize = 64;
const MAX_TARGET_CHARS: usize = 500;

/// Outcome of loading persisted jobs into the engine at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Jobs registered with a firing trigger
    pub active: usize,
    /// Jobs registered with a paused trigger
    pub paused: usize,
    pub failed: Vec<BootstrapFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFailure {
    pub key: JobKey,
    pub reason: String,
}

impl BootstrapReport {
    pub fn registered(&self) -> usize {
        self.active + self.paused
    }
}

/// Management API over the job store and the trigger engine
pub struct JobService {
    store: Arc<dyn JobStore>,
    engine: Arc<TriggerEngine>,
    /// Serializes every store write + engine change pair
    mutations: Mutex<()>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, engine: Arc<TriggerEngine>) -> Self {
        Self {
            store,
            engine,
            mutations: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        &self.engine
    }

    /// Load every persisted job into a freshly cleared engine
    ///
    /// A row that cannot be registered is reported and skipped; the rest
    /// still load.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<BootstrapReport, SchedulerError> {
        let _guard = self.mutations.lock().await;

        self.engine.clear();
        let jobs = self.store.select_all().await?;

        let mut report = BootstrapReport::default();
        for job in &jobs {
            match self.engine.register(job) {
                Ok(()) if job.status == JobStatus::Paused => report.paused += 1,
                Ok(()) => report.active += 1,
                Err(e) => {
                    error!(job_key = %job.key(), error = %e, "Failed to register persisted job");
                    report.failed.push(BootstrapFailure {
                        key: job.key(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = jobs.len(),
            active = report.active,
            paused = report.paused,
            failed = report.failed.len(),
            "Bootstrap complete"
        );
        Ok(report)
    }

    /// Validate, persist and schedule a new job; returns its id
    #[instrument(skip(self, spec), fields(job_name = %spec.name, job_group = %spec.group))]
    pub async fn create_job(&self, spec: JobSpec) -> Result<i64, SchedulerError> {
        self.validate(&spec)?;
        let _guard = self.mutations.lock().await;

        let job = self.store.insert(&spec).await?;

        if let Err(e) = self.engine.register(&job) {
            error!(job_id = job.id, error = %e, "Trigger registration failed after insert, removing row");
            if let Err(rollback) = self.store.delete_by_ids(&[job.id]).await {
                error!(job_id = job.id, error = %rollback, "Rollback of inserted job failed");
            }
            return Err(SchedulerError::Consistency(format!(
                "job {} could not be scheduled: {}",
                job.id, e
            )));
        }

        info!(job_id = job.id, "Job created and scheduled");
        Ok(job.id)
    }

    /// Replace a job's definition and its trigger
    #[instrument(skip(self, spec), fields(job_id = id))]
    pub async fn update_job(&self, id: i64, spec: JobSpec) -> Result<(), SchedulerError> {
        self.validate(&spec)?;
        let _guard = self.mutations.lock().await;

        let old = self
            .store
            .select_by_id(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("job {}", id)))?;
        let updated = Job::from_spec(id, &spec, old.created_at);

        self.store.update(&updated).await?;

        // Delete-then-recreate: the key may change with the group, and the
        // engine never updates a trigger in place. Not atomic with the row
        // write above; failure is compensated below.
        self.engine.remove(&old.key());
        if let Err(e) = self.engine.register(&updated) {
            error!(error = %e, "Trigger re-registration failed, restoring previous definition");
            if let Err(restore) = self.store.update(&old).await {
                error!(error = %restore, "Failed to restore previous job row");
            }
            if let Err(restore) = self.engine.register(&old) {
                error!(error = %restore, "Failed to restore previous trigger");
            }
            return Err(SchedulerError::Consistency(format!(
                "job {} could not be rescheduled: {}",
                id, e
            )));
        }

        info!(job_group = %updated.group, "Job updated and rescheduled");
        Ok(())
    }

    /// Delete jobs and their triggers; every id must exist
    #[instrument(skip(self))]
    pub async fn delete_jobs(&self, ids: &[i64]) -> Result<u64, SchedulerError> {
        let ids: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.mutations.lock().await;

        // Rows are read first: the trigger key needs each job's group
        let jobs = self.store.select_by_ids(&ids).await?;
        if jobs.len() != ids.len() {
            let found: BTreeSet<i64> = jobs.iter().map(|j| j.id).collect();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(SchedulerError::NotFound(format!("jobs {}", missing.join(", "))));
        }

        let deleted = self.store.delete_by_ids(&ids).await?;
        for job in &jobs {
            if !self.engine.remove(&job.key()) {
                warn!(job_key = %job.key(), "Deleted job had no registered trigger");
            }
        }

        info!(deleted, "Jobs deleted");
        Ok(deleted)
    }

    /// Pause or resume a job
    #[instrument(skip(self, status), fields(job_id = id, status = %status))]
    pub async fn set_job_status(&self, id: i64, status: JobStatus) -> Result<(), SchedulerError> {
        let _guard = self.mutations.lock().await;

        let job = self
            .store
            .select_by_id(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("job {}", id)))?;

        if job.status == status {
            debug!("Job already in requested status");
            return Ok(());
        }

        self.store.update_status(id, status).await?;

        let key = job.key();
        let applied = match status {
            JobStatus::Normal => self.engine.resume(&key),
            JobStatus::Paused => self.engine.pause(&key),
        };

        match applied {
            Ok(()) => {
                info!("Job status changed");
                Ok(())
            }
            Err(EngineError::NotRegistered(_)) => {
                warn!(job_key = %key, "Persisted job had no trigger, registering it");
                let healed = Job { status, ..job };
                self.engine.register(&healed).map_err(|e| {
                    error!(error = %e, "Could not register missing trigger");
                    SchedulerError::Consistency(format!("job {} has no trigger: {}", id, e))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run a job once, now, outside its schedule
    ///
    /// The returned handle resolves when the run has finished and been logged.
    #[instrument(skip(self, group), fields(job_id = id, job_group = %group))]
    pub fn run_job_now(&self, id: i64, group: &str) -> Result<JoinHandle<()>, SchedulerError> {
        let key = JobKey::new(id, group);
        self.engine.fire_now(&key).map_err(|e| match e {
            EngineError::NotRegistered(key) => SchedulerError::NotFound(format!("trigger {}", key)),
            other => other.into(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, id: i64) -> Result<JobView, SchedulerError> {
        let job = self
            .store
            .select_by_id(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("job {}", id)))?;
        Ok(self.view(job))
    }

    #[instrument(skip(self))]
    pub async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobView>, SchedulerError> {
        let page = self.store.list(filter, &page.normalized()).await?;
        Ok(page.map(|job| self.view(job)))
    }

    pub async fn list_job_groups(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(self.store.list_groups().await?)
    }

    /// Upcoming fire times for an expression, for previews
    pub fn preview_schedule(
        &self,
        expression: &str,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, ValidationError> {
        Ok(next_fire_times(
            expression,
            Utc::now(),
            self.engine.timezone(),
            count,
        )?)
    }

    fn view(&self, job: Job) -> JobView {
        let next_fire_time = next_fire_time(&job.cron_expression, Utc::now(), self.engine.timezone())
            .ok()
            .flatten();
        JobView {
            job,
            next_fire_time,
        }
    }

    fn validate(&self, spec: &JobSpec) -> Result<(), ValidationError> {
        require("name", &spec.name)?;
        require("group", &spec.group)?;
        require("cron_expression", &spec.cron_expression)?;
        require("invocation_target", &spec.invocation_target)?;

        max_chars("name", &spec.name, MAX_NAME_CHARS)?;
        max_chars("group", &spec.group, MAX_NAME_CHARS)?;
        max_chars("invocation_target", &spec.invocation_target, MAX_TARGET_CHARS)?;

        ensure_fires_after(&spec.cron_expression, Utc::now(), self.engine.timezone())?;

        self.engine
            .dispatcher()
            .validate_target(&spec.invocation_target)
            .map_err(|e| match e {
                DispatchError::UnknownTarget(name) => ValidationError::UnknownInvocationTarget(name),
                other => ValidationError::InvalidFieldValue {
                    field: "invocation_target".to_string(),
                    reason: other.to_string(),
                },
            })?;

        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    Ok(())
}

fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("must be at most {} characters", max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{JobDispatcher, JobRegistry};
    use crate::errors::DatabaseError;
    use crate::models::{LogStatus, MisfirePolicy, TriggerSource};
    use crate::scheduler::{EngineConfig, TriggerState};
    use crate::store::{InMemoryJobLogStore, InMemoryJobStore, MockJobStore};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        service: JobService,
        store: Arc<InMemoryJobStore>,
        log: Arc<InMemoryJobLogStore>,
        engine: Arc<TriggerEngine>,
    }

    fn registry() -> Arc<JobRegistry> {
        let mut registry = JobRegistry::new();
        registry.register_fn("test.noop", |_| async { Ok(()) });
        Arc::new(registry)
    }

    fn engine(log: Arc<InMemoryJobLogStore>) -> Arc<TriggerEngine> {
        let dispatcher = Arc::new(JobDispatcher::new(registry(), log));
        Arc::new(TriggerEngine::new(EngineConfig::default(), dispatcher))
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryJobStore::new());
        let log = Arc::new(InMemoryJobLogStore::new());
        let engine = engine(log.clone());
        let service = JobService::new(store.clone(), engine.clone());
        Fixture {
            service,
            store,
            log,
            engine,
        }
    }

    fn cleanup_spec() -> JobSpec {
        JobSpec::new("cleanup", "0 0 0 * * ?", "test.noop")
            .with_misfire_policy(MisfirePolicy::DoNothing)
    }

    fn next_midnight(after: DateTime<Utc>) -> DateTime<Utc> {
        let tomorrow = after.date_naive() + Duration::days(1);
        Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_create_schedules_next_midnight() {
        let f = fixture();
        let before = Utc::now();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();

        let view = f.service.get_job(id).await.unwrap();
        assert_eq!(view.job.name, "cleanup");
        assert_eq!(view.job.group, "default");
        assert_eq!(view.next_fire_time, Some(next_midnight(before)));

        let snapshot = f.engine.snapshot(&JobKey::new(id, "default")).unwrap();
        assert_eq!(snapshot.state, TriggerState::Normal);
        assert_eq!(snapshot.misfire_policy, MisfirePolicy::DoNothing);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_write() {
        let mut store = MockJobStore::new();
        store.expect_insert().never();
        store.expect_update().never();
        store.expect_select_by_id().never();

        let log = Arc::new(InMemoryJobLogStore::new());
        let engine = engine(log);
        let service = JobService::new(Arc::new(store), engine.clone());

        for spec in [
            JobSpec::new("", "0 0 0 * * ?", "test.noop"),
            JobSpec::new("bad", "0 0 0 * * ?", "test.noop").with_group("  "),
            JobSpec::new("bad", "every day", "test.noop"),
            JobSpec::new("bad", "0 0 0 1 1 ? 2020", "test.noop"),
            JobSpec::new("bad", "0 0 0 * * ?", "test.noop("),
            JobSpec::new("bad", "0 0 0 * * ?", "not.registered"),
            JobSpec::new("x".repeat(65), "0 0 0 * * ?", "test.noop"),
        ] {
            let err = service.create_job(spec.clone()).await.unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {:?}", err);
            let err = service.update_job(1, spec).await.unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {:?}", err);
        }
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_is_reported_by_name() {
        let f = fixture();
        let err = f
            .service
            .create_job(JobSpec::new("x", "0 0 0 * * ?", "report.build('daily')"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Validation(ValidationError::UnknownInvocationTarget(ref name)) if name == "report.build"
        ));
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_registration_fails() {
        let f = fixture();
        // The in-memory store hands out id 1 first; occupy that trigger key
        let squatter = Job::from_spec(1, &cleanup_spec(), Utc::now());
        f.engine.register(&squatter).unwrap();

        let err = f.service.create_job(cleanup_spec()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Consistency(_)));
        assert!(f.store.select_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_reflected_in_store_and_engine() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();

        let spec = JobSpec::new("cleanup-hourly", "0 0 * * * ?", "test.noop")
            .with_group("maintenance")
            .with_misfire_policy(MisfirePolicy::FireAndProceed)
            .with_concurrent(true);
        f.service.update_job(id, spec).await.unwrap();

        let view = f.service.get_job(id).await.unwrap();
        assert_eq!(view.job.name, "cleanup-hourly");
        assert_eq!(view.job.cron_expression, "0 0 * * * ?");

        assert!(!f.engine.exists(&JobKey::new(id, "default")));
        let snapshot = f.engine.snapshot(&JobKey::new(id, "maintenance")).unwrap();
        assert_eq!(snapshot.cron_expression, "0 0 * * * ?");
        assert_eq!(snapshot.misfire_policy, MisfirePolicy::FireAndProceed);
        assert!(snapshot.concurrent);
    }

    #[tokio::test]
    async fn test_update_restores_previous_state_on_failure() {
        let f = fixture();
        let id = f
            .service
            .create_job(cleanup_spec().with_status(JobStatus::Paused))
            .await
            .unwrap();

        let squatter = Job::from_spec(id, &cleanup_spec().with_group("other"), Utc::now());
        f.engine.register(&squatter).unwrap();

        let err = f
            .service
            .update_job(id, cleanup_spec().with_group("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Consistency(_)));

        let row = f.store.select_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.group, "default");
        let restored = f.engine.snapshot(&JobKey::new(id, "default")).unwrap();
        assert_eq!(restored.state, TriggerState::Paused);
    }

    #[tokio::test]
    async fn test_update_unknown_job_is_not_found() {
        let f = fixture();
        let err = f.service.update_job(99, cleanup_spec()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_of_row_deleted_concurrently_is_not_found() {
        let mut store = MockJobStore::new();
        let job = Job::from_spec(8, &cleanup_spec(), Utc::now());
        store
            .expect_select_by_id()
            .returning(move |_| Ok(Some(job.clone())));
        store
            .expect_update()
            .returning(|job| Err(DatabaseError::NotFound(format!("Job {} not found", job.id))));

        let engine = engine(Arc::new(InMemoryJobLogStore::new()));
        let service = JobService::new(Arc::new(store), engine.clone());

        let err = service.update_job(8, cleanup_spec()).await.unwrap_err();
        assert!(err.is_not_found(), "expected not found, got {:?}", err);
        assert!(engine.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_updates_leave_one_matching_trigger() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();

        let alpha = cleanup_spec().with_group("alpha");
        let beta = JobSpec::new("cleanup", "0 30 0 * * ?", "test.noop").with_group("beta");
        let (a, b) = tokio::join!(
            f.service.update_job(id, alpha),
            f.service.update_job(id, beta)
        );
        a.unwrap();
        b.unwrap();

        let keys: Vec<JobKey> = f.engine.keys().into_iter().filter(|k| k.id == id).collect();
        assert_eq!(keys.len(), 1);

        let row = f.store.select_by_id(id).await.unwrap().unwrap();
        assert_eq!(keys[0].group, row.group);
        let snapshot = f.engine.snapshot(&keys[0]).unwrap();
        assert_eq!(snapshot.cron_expression, row.cron_expression);
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_trigger() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();

        assert_eq!(f.service.delete_jobs(&[id]).await.unwrap(), 1);
        assert!(f.service.get_job(id).await.unwrap_err().is_not_found());
        assert!(f.engine.is_empty());
        assert!(f.service.run_job_now(id, "default").unwrap_err().is_not_found());
        assert!(f
            .service
            .set_job_status(id, JobStatus::Paused)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_with_unknown_id_changes_nothing() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();

        let err = f.service.delete_jobs(&[id, 404]).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("404"));
        assert!(f.store.select_by_id(id).await.unwrap().is_some());
        assert!(f.engine.exists(&JobKey::new(id, "default")));
    }

    #[tokio::test]
    async fn test_pause_and_resume_cleanup_job() {
        let f = fixture();
        let before = Utc::now();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();
        let key = JobKey::new(id, "default");

        f.service.set_job_status(id, JobStatus::Paused).await.unwrap();
        assert_eq!(f.engine.snapshot(&key).unwrap().state, TriggerState::Paused);
        assert_eq!(f.service.get_job(id).await.unwrap().job.status, JobStatus::Paused);

        let midnight = next_midnight(before);
        assert!(f.engine.process_due_at(midnight).is_empty());

        f.service.set_job_status(id, JobStatus::Normal).await.unwrap();
        let snapshot = f.engine.snapshot(&key).unwrap();
        assert_eq!(snapshot.state, TriggerState::Normal);
        assert_eq!(snapshot.next_fire_time, Some(midnight));
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() {
        let mut store = MockJobStore::new();
        let job = Job::from_spec(5, &cleanup_spec(), Utc::now());
        store
            .expect_select_by_id()
            .returning(move |_| Ok(Some(job.clone())));
        store.expect_update_status().never();

        let engine = engine(Arc::new(InMemoryJobLogStore::new()));
        let service = JobService::new(Arc::new(store), engine);
        service.set_job_status(5, JobStatus::Normal).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_status_reregisters_missing_trigger() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();
        let key = JobKey::new(id, "default");
        f.engine.remove(&key);

        f.service.set_job_status(id, JobStatus::Paused).await.unwrap();
        assert_eq!(f.engine.snapshot(&key).unwrap().state, TriggerState::Paused);
    }

    #[tokio::test]
    async fn test_run_now_on_paused_job() {
        let f = fixture();
        let id = f
            .service
            .create_job(cleanup_spec().with_status(JobStatus::Paused))
            .await
            .unwrap();
        let key = JobKey::new(id, "default");
        let due_before = f.engine.snapshot(&key).unwrap().next_fire_time;

        f.service.run_job_now(id, "default").unwrap().await.unwrap();

        let entries = f.log.entries_for(id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert_eq!(entries[0].trigger_source, TriggerSource::Manual);
        assert_eq!(f.service.get_job(id).await.unwrap().job.status, JobStatus::Paused);
        assert_eq!(f.engine.snapshot(&key).unwrap().next_fire_time, due_before);
    }

    #[tokio::test]
    async fn test_run_now_with_wrong_group_is_not_found() {
        let f = fixture();
        let id = f.service.create_job(cleanup_spec()).await.unwrap();
        assert!(f.service.run_job_now(id, "other").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_bootstrap_loads_rows_and_reports_failures() {
        let f = fixture();
        let active = f.store.insert(&cleanup_spec()).await.unwrap();
        let paused = f
            .store
            .insert(&cleanup_spec().with_status(JobStatus::Paused))
            .await
            .unwrap();
        let broken = f
            .store
            .insert(&JobSpec::new("broken", "not a cron", "test.noop"))
            .await
            .unwrap();

        let stale = Job::from_spec(77, &cleanup_spec(), Utc::now());
        f.engine.register(&stale).unwrap();

        let report = f.service.bootstrap().await.unwrap();
        assert_eq!(report.active, 1);
        assert_eq!(report.paused, 1);
        assert_eq!(report.registered(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, broken.key());

        assert!(!f.engine.exists(&stale.key()));
        assert_eq!(f.engine.snapshot(&active.key()).unwrap().state, TriggerState::Normal);
        assert_eq!(f.engine.snapshot(&paused.key()).unwrap().state, TriggerState::Paused);
    }

    #[tokio::test]
    async fn test_list_jobs_and_groups() {
        let f = fixture();
        f.service.create_job(cleanup_spec()).await.unwrap();
        f.service
            .create_job(cleanup_spec().with_group("maintenance"))
            .await
            .unwrap();
        f.service
            .create_job(JobSpec::new("report", "0 0 6 * * ?", "test.noop").with_group("reports"))
            .await
            .unwrap();

        let filter = JobFilter {
            name: Some("clean".to_string()),
            ..JobFilter::default()
        };
        let page = f.service.list_jobs(&filter, PageRequest::new(1, 10)).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.records.iter().all(|v| v.next_fire_time.is_some()));

        assert_eq!(
            f.service.list_job_groups().await.unwrap(),
            vec!["default", "maintenance", "reports"]
        );
    }

    #[tokio::test]
    async fn test_preview_schedule() {
        let f = fixture();
        let times = f.service.preview_schedule("0 */5 * * * ?", 3).unwrap();
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|w| w[1] - w[0] == Duration::minutes(5)));
        assert!(f.service.preview_schedule("bogus", 3).is_err());
    }
}
