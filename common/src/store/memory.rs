// In-memory job and log stores

use super::{JobLogStore, JobStore};
use crate::errors::DatabaseError;
use crate::models::{
    Job, JobFilter, JobLogEntry, JobLogFilter, JobSpec, JobStatus, Page, PageRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

fn paginate<T: Clone>(rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let records = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Page::new(records, total)
}

/// Job store held in process memory; ids start at 1
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<BTreeMap<i64, Job>>,
    next_id: AtomicI64,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    #[instrument(skip(self, spec), fields(job_name = %spec.name))]
    async fn insert(&self, spec: &JobSpec) -> Result<Job, DatabaseError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = Job::from_spec(id, spec, Utc::now());
        self.jobs.write().await.insert(id, job.clone());
        debug!(job_id = id, "Job inserted");
        Ok(job)
    }

    #[instrument(skip(self, job), fields(job_id = job.id))]
    async fn update(&self, job: &Job) -> Result<(), DatabaseError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("Job {} not found", job.id))),
        }
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: JobStatus) -> Result<(), DatabaseError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(existing) => {
                existing.status = status;
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("Job {} not found", id))),
        }
    }

    #[instrument(skip(self))]
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let mut jobs = self.jobs.write().await;
        Ok(ids.iter().filter(|id| jobs.remove(*id).is_some()).count() as u64)
    }

    async fn select_by_id(&self, id: i64) -> Result<Option<Job>, DatabaseError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn select_by_ids(&self, ids: &[i64]) -> Result<Vec<Job>, DatabaseError> {
        let jobs = self.jobs.read().await;
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        Ok(wanted.iter().filter_map(|id| jobs.get(id).cloned()).collect())
    }

    async fn select_all(&self) -> Result<Vec<Job>, DatabaseError> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn list(
        &self,
        filter: &JobFilter,
        page: &PageRequest,
    ) -> Result<Page<Job>, DatabaseError> {
        let jobs = self.jobs.read().await;
        let matching: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        Ok(paginate(matching, page))
    }

    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError> {
        let jobs = self.jobs.read().await;
        let groups: BTreeSet<String> = jobs.values().map(|j| j.group.clone()).collect();
        Ok(groups.into_iter().collect())
    }
}

/// Execution log held in process memory
#[derive(Debug)]
pub struct InMemoryJobLogStore {
    entries: RwLock<BTreeMap<i64, JobLogEntry>>,
    next_id: AtomicI64,
}

impl Default for InMemoryJobLogStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryJobLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order
    pub async fn entries(&self) -> Vec<JobLogEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Entries recorded for one job, in append order
    pub async fn entries_for(&self, job_id: i64) -> Vec<JobLogEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobLogStore for InMemoryJobLogStore {
    async fn append(&self, entry: &JobLogEntry) -> Result<i64, DatabaseError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.entries.write().await.insert(id, stored);
        Ok(id)
    }

    async fn query(
        &self,
        filter: &JobLogFilter,
        page: &PageRequest,
    ) -> Result<Page<JobLogEntry>, DatabaseError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<JobLogEntry> = entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Newest first; id breaks ties between entries created in the same instant
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(matching, page))
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let mut entries = self.entries.write().await;
        Ok(ids.iter().filter(|id| entries.remove(*id).is_some()).count() as u64)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<u64, DatabaseError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        debug!(removed, "Job log cleared");
        Ok(removed)
    }

    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError> {
        let entries = self.entries.read().await;
        let groups: BTreeSet<String> = entries.values().map(|e| e.job_group.clone()).collect();
        Ok(groups.into_iter().collect())
    }
}
