// Trigger engine: holds one cron trigger per job and fires them on time
//
// The loop sleeps until the earliest due trigger (bounded by `max_idle`),
// wakes early when the trigger set changes, and hands every fire to a
// spawned task that runs under the execution guard and the worker pool.

use super::misfire::{is_misfire, plan_fire};
use crate::config::SchedulerConfig;
use crate::dispatcher::JobDispatcher;
use crate::errors::{EngineError, ScheduleError};
use crate::lock::{ExecutionGuard, LockGuard};
use crate::models::{Job, JobKey, JobStatus, MisfirePolicy, TriggerSource};
use crate::schedule::{next_after, parse_cron_expression, parse_timezone};
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

/// Upper bound on fires started for a single trigger in one pass
const MAX_CATCH_UP_FIRES: usize = 64;

/// Runtime configuration for the trigger engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub misfire_threshold: chrono::Duration,
    pub worker_pool_size: usize,
    pub max_idle: Duration,
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            misfire_threshold: chrono::Duration::seconds(60),
            worker_pool_size: 10,
            max_idle: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &SchedulerConfig) -> Result<Self, ScheduleError> {
        Ok(Self {
            timezone: parse_timezone(&settings.timezone)?,
            misfire_threshold: chrono::Duration::seconds(settings.misfire_threshold_seconds as i64),
            worker_pool_size: settings.worker_pool_size.max(1),
            max_idle: Duration::from_secs(settings.max_idle_seconds.max(1)),
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_seconds),
        })
    }
}

/// Whether a registered trigger is allowed to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Normal,
    Paused,
}

/// Read-only view of a registered trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSnapshot {
    pub key: JobKey,
    pub cron_expression: String,
    pub misfire_policy: MisfirePolicy,
    pub concurrent: bool,
    pub state: TriggerState,
    /// Pending due time; may lie in the past while paused
    pub next_fire_time: Option<DateTime<Utc>>,
}

struct Trigger {
    job: Job,
    schedule: CronSchedule,
    state: TriggerState,
    next_due: Option<DateTime<Utc>>,
}

impl Trigger {
    fn snapshot(&self) -> TriggerSnapshot {
        TriggerSnapshot {
            key: self.job.key(),
            cron_expression: self.job.cron_expression.clone(),
            misfire_policy: self.job.misfire_policy,
            concurrent: self.job.concurrent,
            state: self.state,
            next_fire_time: self.next_due,
        }
    }
}

/// Scheduler trait for job scheduling operations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the trigger loop until stopped
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the loop and wait for in-flight runs
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// In-process cron trigger engine
pub struct TriggerEngine {
    config: EngineConfig,
    triggers: RwLock<HashMap<JobKey, Trigger>>,
    guard: Arc<ExecutionGuard>,
    dispatcher: Arc<JobDispatcher>,
    workers: Arc<Semaphore>,
    wake: Arc<Notify>,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
}

impl TriggerEngine {
    pub fn new(config: EngineConfig, dispatcher: Arc<JobDispatcher>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let workers = Arc::new(Semaphore::new(config.worker_pool_size));

        Self {
            config,
            triggers: RwLock::new(HashMap::new()),
            guard: Arc::new(ExecutionGuard::new()),
            dispatcher,
            workers,
            wake: Arc::new(Notify::new()),
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.config.timezone
    }

    pub fn execution_guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    pub fn dispatcher(&self) -> &Arc<JobDispatcher> {
        &self.dispatcher
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    fn read_triggers(&self) -> RwLockReadGuard<'_, HashMap<JobKey, Trigger>> {
        self.triggers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_triggers(&self) -> RwLockWriteGuard<'_, HashMap<JobKey, Trigger>> {
        self.triggers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Register a trigger for `job`, starting paused if the job is paused
    #[instrument(skip(self, job), fields(job_key = %job.key(), cron = %job.cron_expression))]
    pub fn register(&self, job: &Job) -> Result<(), EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }

        let key = job.key();
        let schedule =
            parse_cron_expression(&job.cron_expression).map_err(|e| EngineError::InvalidSchedule {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        let next_due = next_after(&schedule, self.config.timezone, Utc::now()).ok_or_else(|| {
            EngineError::InvalidSchedule {
                key: key.clone(),
                reason: "schedule has no future fire time".to_string(),
            }
        })?;

        let state = match job.status {
            JobStatus::Normal => TriggerState::Normal,
            JobStatus::Paused => TriggerState::Paused,
        };

        let count = {
            let mut triggers = self.write_triggers();
            if triggers.contains_key(&key) {
                return Err(EngineError::AlreadyRegistered(key));
            }
            triggers.insert(
                key.clone(),
                Trigger {
                    job: job.clone(),
                    schedule,
                    state,
                    next_due: Some(next_due),
                },
            );
            triggers.len()
        };

        telemetry::update_registered_triggers(count);
        info!(next_fire_time = %next_due, state = ?state, "Trigger registered");
        self.wake.notify_one();
        Ok(())
    }

    /// Remove a trigger; returns whether one was registered
    #[instrument(skip(self, key), fields(job_key = %key))]
    pub fn remove(&self, key: &JobKey) -> bool {
        let (removed, count) = {
            let mut triggers = self.write_triggers();
            let removed = triggers.remove(key).is_some();
            (removed, triggers.len())
        };

        if removed {
            telemetry::update_registered_triggers(count);
            info!("Trigger removed");
            self.wake.notify_one();
        }
        removed
    }

    /// Stop a trigger from firing; its pending due time is kept
    #[instrument(skip(self, key), fields(job_key = %key))]
    pub fn pause(&self, key: &JobKey) -> Result<(), EngineError> {
        self.set_state(key, TriggerState::Paused)
    }

    /// Let a paused trigger fire again; an overdue fire goes through misfire handling
    #[instrument(skip(self, key), fields(job_key = %key))]
    pub fn resume(&self, key: &JobKey) -> Result<(), EngineError> {
        self.set_state(key, TriggerState::Normal)?;
        self.wake.notify_one();
        Ok(())
    }

    fn set_state(&self, key: &JobKey, state: TriggerState) -> Result<(), EngineError> {
        let mut triggers = self.write_triggers();
        let trigger = triggers
            .get_mut(key)
            .ok_or_else(|| EngineError::NotRegistered(key.clone()))?;
        trigger.state = state;
        trigger.job.status = match state {
            TriggerState::Normal => JobStatus::Normal,
            TriggerState::Paused => JobStatus::Paused,
        };
        info!(state = ?state, "Trigger state changed");
        Ok(())
    }

    /// Fire a job immediately, regardless of its trigger state
    #[instrument(skip(self, key), fields(job_key = %key))]
    pub fn fire_now(&self, key: &JobKey) -> Result<JoinHandle<()>, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        let job = self
            .read_triggers()
            .get(key)
            .map(|t| t.job.clone())
            .ok_or_else(|| EngineError::NotRegistered(key.clone()))?;

        info!("Manual fire requested");
        Ok(self.spawn_fire(job, TriggerSource::Manual, None))
    }

    pub fn exists(&self, key: &JobKey) -> bool {
        self.read_triggers().contains_key(key)
    }

    pub fn snapshot(&self, key: &JobKey) -> Option<TriggerSnapshot> {
        self.read_triggers().get(key).map(Trigger::snapshot)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<JobKey> {
        let mut keys: Vec<JobKey> = self.read_triggers().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read_triggers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_triggers().is_empty()
    }

    /// Drop every trigger; in-flight runs are not interrupted
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let removed = {
            let mut triggers = self.write_triggers();
            let removed = triggers.len();
            triggers.clear();
            removed
        };
        telemetry::update_registered_triggers(0);
        info!(removed, "All triggers cleared");
        self.wake.notify_one();
    }

    /// Earliest pending due time among active triggers
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.read_triggers()
            .values()
            .filter(|t| t.state == TriggerState::Normal)
            .filter_map(|t| t.next_due)
            .min()
    }

    /// Fire every trigger due at `now`, returning the spawned runs
    ///
    /// Each due time is planned through the trigger's misfire policy. A
    /// trigger far behind fires at most `MAX_CATCH_UP_FIRES` times per pass.
    /// A non-concurrent job replaying missed fires gets one per pass, and
    /// only once its previous run has finished.
    pub fn process_due_at(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        if self.is_shut_down() {
            return Vec::new();
        }

        let mut fires = Vec::new();
        {
            let mut triggers = self.write_triggers();
            for trigger in triggers.values_mut() {
                if trigger.state == TriggerState::Paused {
                    continue;
                }

                let key = trigger.job.key();
                let mut planned = 0;
                while let Some(due) = trigger.next_due {
                    if due > now || planned >= MAX_CATCH_UP_FIRES {
                        break;
                    }

                    let serial = self.replays_serially(&trigger.job, due, now);
                    let mut held = None;
                    if serial {
                        match self.guard.try_acquire(&key) {
                            Some(lock) => held = Some(lock),
                            None => {
                                debug!(job_key = %key, due = %due, "Missed fire waits for the running job");
                                break;
                            }
                        }
                    }
                    planned += 1;

                    let plan = plan_fire(
                        trigger.job.misfire_policy,
                        &trigger.schedule,
                        self.config.timezone,
                        due,
                        now,
                        self.config.misfire_threshold,
                    );

                    if plan.misfired {
                        telemetry::record_misfire(
                            trigger.job.id,
                            &trigger.job.misfire_policy.to_string(),
                        );
                        warn!(
                            job_key = %trigger.job.key(),
                            due = %due,
                            policy = %trigger.job.misfire_policy,
                            fired = plan.fire_at.is_some(),
                            "Trigger misfired"
                        );
                    }

                    if plan.fire_at.is_some() {
                        fires.push((trigger.job.clone(), held));
                    }
                    trigger.next_due = plan.next_due;

                    if serial {
                        break;
                    }
                }
            }
        }

        fires
            .into_iter()
            .map(|(job, held)| self.spawn_fire(job, TriggerSource::Scheduled, held))
            .collect()
    }

    /// Missed fires of a non-concurrent job that ignores misfires run one
    /// after another instead of being skipped by the execution guard
    fn replays_serially(&self, job: &Job, due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        !job.concurrent
            && job.misfire_policy == MisfirePolicy::IgnoreMisfires
            && is_misfire(due, now, self.config.misfire_threshold)
    }

    /// Whether the trigger's next fire is held back by its own running job
    fn awaits_running_job(&self, trigger: &Trigger, now: DateTime<Utc>) -> bool {
        trigger
            .next_due
            .is_some_and(|due| due <= now && self.replays_serially(&trigger.job, due, now))
            && self.guard.is_running(&trigger.job.key())
    }

    /// Spawn one run; `held` is an execution lock already taken for it
    fn spawn_fire(
        &self,
        job: Job,
        source: TriggerSource,
        held: Option<LockGuard>,
    ) -> JoinHandle<()> {
        let guard = Arc::clone(&self.guard);
        let dispatcher = Arc::clone(&self.dispatcher);
        let workers = Arc::clone(&self.workers);
        let wake = Arc::clone(&self.wake);
        let span = tracing::info_span!(
            "job_fire",
            job_key = %job.key(),
            source = %source,
            run_id = %Uuid::new_v4()
        );

        tokio::spawn(
            async move {
                let key = job.key();
                let run = async {
                    let _permit = match workers.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("Worker pool closed, run abandoned");
                            return;
                        }
                    };
                    dispatcher.dispatch(&job, source).await;
                };

                match held {
                    Some(lock) => {
                        run.await;
                        drop(lock);
                    }
                    None => {
                        let outcome = guard.run_exclusive(&key, job.concurrent, run).await;
                        if outcome.is_skipped() {
                            dispatcher.record_skipped(&job, source).await;
                        }
                    }
                }

                // A held-back missed fire may now be runnable
                wake.notify_one();
            }
            .instrument(span),
        )
    }

    fn idle_duration(&self, now: DateTime<Utc>) -> Duration {
        let next = self
            .read_triggers()
            .values()
            .filter(|t| t.state == TriggerState::Normal)
            .filter(|t| !self.awaits_running_job(t, now))
            .filter_map(|t| t.next_due)
            .min();
        match next {
            Some(next) => (next - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.config.max_idle),
            None => self.config.max_idle,
        }
    }
}

#[async_trait]
impl Scheduler for TriggerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            timezone = %self.config.timezone,
            worker_pool_size = self.config.worker_pool_size,
            misfire_threshold_seconds = self.config.misfire_threshold.num_seconds(),
            "Starting trigger engine"
        );

        let mut shutdown_rx = self.shutdown_receiver();

        while !self.is_shut_down() {
            let fired = self.process_due_at(Utc::now()).len();
            if fired > 0 {
                debug!(fired, "Started due job runs");
            }

            let idle = self.idle_duration(Utc::now());
            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                _ = self.wake.notified() => {
                    debug!("Trigger set changed, re-evaluating");
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping trigger loop");
                    break;
                }
            }
        }

        info!("Trigger loop stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping trigger engine");

        self.shut_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        // Every worker permit back in hand means no run is in flight
        let permits = self.config.worker_pool_size as u32;
        match tokio::time::timeout(self.config.shutdown_grace, self.workers.acquire_many(permits))
            .await
        {
            Ok(Ok(_all)) => info!("Trigger engine stopped gracefully"),
            Ok(Err(e)) => error!(error = %e, "Worker pool closed during shutdown"),
            Err(_) => warn!(
                grace_seconds = self.config.shutdown_grace.as_secs(),
                "Shutdown grace period elapsed with runs still in flight"
            ),
        }

        Ok(())
    }
}
