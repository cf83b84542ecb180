// Job log repository: Postgres implementation of the execution log

use super::job::non_blank;
use super::queries::job_log_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{JobLogEntry, JobLogFilter, LogStatus, Page, PageRequest, TriggerSource};
use crate::store::JobLogStore;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::instrument;

/// Repository for execution log records
#[derive(Debug, Clone)]
pub struct JobLogRepository {
    pool: DbPool,
}

impl JobLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<JobLogEntry, DatabaseError> {
        let status: i16 = row.try_get("status")?;
        let trigger_source: String = row.try_get("trigger_source")?;

        Ok(JobLogEntry {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            job_name: row.try_get("job_name")?,
            job_group: row.try_get("job_group")?,
            invocation_target: row.try_get("invocation_target")?,
            status: LogStatus::try_from(status).map_err(DatabaseError::InvalidData)?,
            trigger_source: trigger_source
                .parse::<TriggerSource>()
                .map_err(DatabaseError::InvalidData)?,
            message: row.try_get("message")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            duration_ms: row.try_get("duration_ms")?,
            created_at: row.try_get("create_time")?,
        })
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobLogFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(job_id) = filter.job_id {
            builder.push(" AND job_id = ").push_bind(job_id);
        }
        if let Some(name) = non_blank(filter.job_name.as_deref()) {
            builder
                .push(" AND job_name LIKE ")
                .push_bind(format!("%{}%", name));
        }
        if let Some(group) = non_blank(filter.job_group.as_deref()) {
            builder
                .push(" AND job_group LIKE ")
                .push_bind(format!("%{}%", group));
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_i16());
        }
        if let Some((start, end)) = filter.time_range() {
            builder
                .push(" AND create_time BETWEEN ")
                .push_bind(start)
                .push(" AND ")
                .push_bind(end);
        }
    }
}

#[async_trait]
impl JobLogStore for JobLogRepository {
    #[instrument(skip(self, entry), fields(job_id = entry.job_id, status = %entry.status))]
    async fn append(&self, entry: &JobLogEntry) -> Result<i64, DatabaseError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO job_logs (
                job_id, job_name, job_group, invocation_target, status,
                trigger_source, message, start_time, end_time, duration_ms, create_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(entry.job_id)
        .bind(&entry.job_name)
        .bind(&entry.job_group)
        .bind(&entry.invocation_target)
        .bind(entry.status.as_i16())
        .bind(entry.trigger_source.to_string())
        .bind(&entry.message)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.duration_ms)
        .bind(entry.created_at)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(id)
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        filter: &JobLogFilter,
        page: &PageRequest,
    ) -> Result<Page<JobLogEntry>, DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_logs");
        Self::push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.pool())
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM job_logs",
            job_log_queries::SELECT_ALL_COLUMNS
        ));
        Self::push_filter(&mut select, filter);
        select
            .push(" ORDER BY create_time DESC, id DESC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = select.build().fetch_all(self.pool.pool()).await?;
        let records = rows
            .iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = records.len(), total, "Queried job logs");
        Ok(Page::new(records, total as u64))
    }

    #[instrument(skip(self))]
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM job_logs WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.pool.pool())
            .await?;

        tracing::info!(deleted = result.rows_affected(), "Job logs deleted");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM job_logs")
            .execute(self.pool.pool())
            .await?;

        tracing::info!(deleted = result.rows_affected(), "Job log cleared");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError> {
        let groups = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT job_group FROM job_logs ORDER BY job_group",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(groups)
    }
}
