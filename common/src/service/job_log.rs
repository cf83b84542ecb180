// Execution log queries and housekeeping

use crate::errors::SchedulerError;
use crate::models::{JobLogEntry, JobLogFilter, Page, PageRequest};
use crate::store::JobLogStore;
use std::sync::Arc;
use tracing::{info, instrument};

/// Read and prune access to the execution log
#[derive(Clone)]
pub struct JobLogService {
    store: Arc<dyn JobLogStore>,
}

impl JobLogService {
    pub fn new(store: Arc<dyn JobLogStore>) -> Self {
        Self { store }
    }

    /// Newest entries first
    #[instrument(skip(self))]
    pub async fn list_logs(
        &self,
        filter: &JobLogFilter,
        page: PageRequest,
    ) -> Result<Page<JobLogEntry>, SchedulerError> {
        Ok(self.store.query(filter, &page.normalized()).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_logs(&self, ids: &[i64]) -> Result<u64, SchedulerError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete_by_ids(ids).await?;
        info!(deleted, "Job log entries deleted");
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn clear_logs(&self) -> Result<u64, SchedulerError> {
        let deleted = self.store.clear().await?;
        info!(deleted, "Job log cleared");
        Ok(deleted)
    }

    pub async fn list_log_groups(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(self.store.list_groups().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogStatus, TriggerSource};
    use crate::store::{InMemoryJobLogStore, MockJobLogStore};
    use chrono::{Duration, TimeZone, Utc};

    fn entry(job_id: i64, group: &str, status: LogStatus, minute: i64) -> JobLogEntry {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::minutes(minute);
        JobLogEntry {
            id: 0,
            job_id,
            job_name: format!("job-{}", job_id),
            job_group: group.to_string(),
            invocation_target: "system.noop".to_string(),
            status,
            trigger_source: TriggerSource::Scheduled,
            message: None,
            start_time: at,
            end_time: at,
            duration_ms: 3,
            created_at: at,
        }
    }

    async fn seeded() -> (JobLogService, Arc<InMemoryJobLogStore>) {
        let store = Arc::new(InMemoryJobLogStore::new());
        for (i, (job_id, group, status)) in [
            (1, "default", LogStatus::Success),
            (1, "default", LogStatus::Failure),
            (2, "reports", LogStatus::Success),
            (2, "reports", LogStatus::Skipped),
        ]
        .into_iter()
        .enumerate()
        {
            store.append(&entry(job_id, group, status, i as i64)).await.unwrap();
        }
        (JobLogService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_list_logs_newest_first() {
        let (service, _) = seeded().await;
        let page = service
            .list_logs(&JobLogFilter::default(), PageRequest::new(1, 3))
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        let ids: Vec<i64> = page.records.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn test_list_logs_filtered_by_job_and_range() {
        let (service, _) = seeded().await;
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let filter = JobLogFilter {
            start_time: Some(start),
            end_time: Some(start + Duration::minutes(1)),
            ..JobLogFilter::for_job(1)
        };
        let page = service.list_logs(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.records.iter().all(|e| e.job_id == 1));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (service, store) = seeded().await;
        assert_eq!(service.delete_logs(&[1, 2, 99]).await.unwrap(), 2);
        assert_eq!(store.entries().await.len(), 2);
        assert_eq!(service.list_log_groups().await.unwrap(), vec!["reports"]);

        assert_eq!(service.clear_logs().await.unwrap(), 2);
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_nothing_skips_store() {
        let mut store = MockJobLogStore::new();
        store.expect_delete_by_ids().never();
        let service = JobLogService::new(Arc::new(store));
        assert_eq!(service.delete_logs(&[]).await.unwrap(), 0);
    }
}
