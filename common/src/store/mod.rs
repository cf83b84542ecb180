// Persistence seams for job definitions and execution logs
//
// Postgres implementations live in `db::repositories`; the in-memory ones
// back tests and the `memory` store backend.

pub mod memory;

use crate::errors::DatabaseError;
use crate::models::{
    Job, JobFilter, JobLogEntry, JobLogFilter, JobSpec, JobStatus, Page, PageRequest,
};
use async_trait::async_trait;

pub use memory::{InMemoryJobLogStore, InMemoryJobStore};

/// Durable storage of job definitions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job and return it with its assigned id
    async fn insert(&self, spec: &JobSpec) -> Result<Job, DatabaseError>;

    /// Overwrite every mutable field of an existing job
    async fn update(&self, job: &Job) -> Result<(), DatabaseError>;

    async fn update_status(&self, id: i64, status: JobStatus) -> Result<(), DatabaseError>;

    /// Delete jobs by id, returning the number of rows removed
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError>;

    async fn select_by_id(&self, id: i64) -> Result<Option<Job>, DatabaseError>;

    async fn select_by_ids(&self, ids: &[i64]) -> Result<Vec<Job>, DatabaseError>;

    /// All jobs ordered by id
    async fn select_all(&self) -> Result<Vec<Job>, DatabaseError>;

    async fn list(&self, filter: &JobFilter, page: &PageRequest)
        -> Result<Page<Job>, DatabaseError>;

    /// Distinct job groups, sorted
    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Append-mostly storage of execution records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobLogStore: Send + Sync {
    /// Append one entry and return its assigned id
    async fn append(&self, entry: &JobLogEntry) -> Result<i64, DatabaseError>;

    /// Filtered page of entries, newest first
    async fn query(
        &self,
        filter: &JobLogFilter,
        page: &PageRequest,
    ) -> Result<Page<JobLogEntry>, DatabaseError>;

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> Result<u64, DatabaseError>;

    /// Distinct job groups that appear in the log, sorted
    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError>;
}
