// Per-job execution exclusivity
//
// Non-concurrent jobs may have at most one run in flight. A fire that finds
// the job already running is skipped, never queued.

use crate::models::JobKey;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Outcome of [`ExecutionGuard::run_exclusive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    Ran(T),
    /// Another run of the same job held the lock
    Skipped,
}

impl<T> GuardOutcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, GuardOutcome::Skipped)
    }
}

/// Tracks which non-concurrent jobs currently have a run in flight
#[derive(Debug, Clone, Default)]
pub struct ExecutionGuard {
    running: Arc<Mutex<HashSet<JobKey>>>,
}

/// Lock guard that releases the job's run slot when dropped
///
/// Release happens on every exit path of the guarded run: normal return,
/// error, panic unwinding, or the future being dropped.
#[derive(Debug)]
pub struct LockGuard {
    key: JobKey,
    running: Arc<Mutex<HashSet<JobKey>>>,
    acquired_at: Instant,
}

impl LockGuard {
    /// Get the job this lock guards
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Get the time elapsed since lock acquisition
    pub fn elapsed(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        lock_set(&self.running).remove(&self.key);
        debug!(job_key = %self.key, held_ms = self.elapsed().as_millis() as u64, "Execution lock released");
    }
}

fn lock_set(set: &Mutex<HashSet<JobKey>>) -> MutexGuard<'_, HashSet<JobKey>> {
    // A panic while holding this mutex cannot leave the set half-updated
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the run slot for a job without waiting
    pub fn try_acquire(&self, key: &JobKey) -> Option<LockGuard> {
        let mut running = lock_set(&self.running);
        if !running.insert(key.clone()) {
            return None;
        }

        Some(LockGuard {
            key: key.clone(),
            running: Arc::clone(&self.running),
            acquired_at: Instant::now(),
        })
    }

    /// Run `fut` under the job's exclusivity rules
    ///
    /// Concurrent jobs run without locking. Non-concurrent jobs run only if
    /// no other run of the same key is in flight; otherwise `fut` is dropped
    /// unpolled and `Skipped` is returned.
    #[instrument(skip(self, key, fut), fields(job_key = %key))]
    pub async fn run_exclusive<F>(&self, key: &JobKey, concurrent: bool, fut: F) -> GuardOutcome<F::Output>
    where
        F: Future,
    {
        if concurrent {
            return GuardOutcome::Ran(fut.await);
        }

        match self.try_acquire(key) {
            Some(_guard) => GuardOutcome::Ran(fut.await),
            None => {
                debug!("Job already running and concurrent execution not allowed, skipping");
                GuardOutcome::Skipped
            }
        }
    }

    /// Whether a non-concurrent run of the job is in flight
    pub fn is_running(&self, key: &JobKey) -> bool {
        lock_set(&self.running).contains(key)
    }

    /// Number of non-concurrent runs in flight
    pub fn running_count(&self) -> usize {
        lock_set(&self.running).len()
    }
}
