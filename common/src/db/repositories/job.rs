// Job repository: Postgres implementation of the job store

use super::queries::job_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Job, JobFilter, JobSpec, JobStatus, MisfirePolicy, Page, PageRequest};
use crate::store::JobStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::instrument;

/// Repository for job-related database operations
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: DbPool,
}

impl JobRepository {
    /// Create a new JobRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Job, DatabaseError> {
        let misfire_policy: i16 = row.try_get("misfire_policy")?;
        let concurrent: i16 = row.try_get("concurrent")?;
        let status: i16 = row.try_get("status")?;

        Ok(Job {
            id: row.try_get("id")?,
            name: row.try_get("job_name")?,
            group: row.try_get("job_group")?,
            cron_expression: row.try_get("cron_expression")?,
            invocation_target: row.try_get("invocation_target")?,
            misfire_policy: MisfirePolicy::try_from(misfire_policy)
                .map_err(DatabaseError::InvalidData)?,
            // 1 allows overlapping runs
            concurrent: concurrent == 1,
            status: JobStatus::try_from(status).map_err(DatabaseError::InvalidData)?,
            remark: row.try_get("remark")?,
            created_at: row.try_get("create_time")?,
            updated_at: row.try_get("update_time")?,
        })
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(name) = non_blank(filter.name.as_deref()) {
            builder
                .push(" AND job_name LIKE ")
                .push_bind(format!("%{}%", name));
        }
        if let Some(group) = non_blank(filter.group.as_deref()) {
            builder
                .push(" AND job_group LIKE ")
                .push_bind(format!("%{}%", group));
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_i16());
        }
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl JobStore for JobRepository {
    #[instrument(skip(self, spec), fields(job_name = %spec.name))]
    async fn insert(&self, spec: &JobSpec) -> Result<Job, DatabaseError> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO jobs (
                job_name, job_group, cron_expression, invocation_target,
                misfire_policy, concurrent, status, remark, create_time, update_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {}
            "#,
            job_queries::SELECT_ALL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(spec.name.trim())
            .bind(spec.group.trim())
            .bind(spec.cron_expression.trim())
            .bind(spec.invocation_target.trim())
            .bind(spec.misfire_policy.as_i16())
            .bind(i16::from(spec.concurrent))
            .bind(spec.status.as_i16())
            .bind(&spec.remark)
            .bind(now)
            .fetch_one(self.pool.pool())
            .await?;

        let job = Self::map_row(&row)?;
        tracing::info!(job_id = job.id, job_group = %job.group, "Job created");
        Ok(job)
    }

    #[instrument(skip(self, job), fields(job_id = job.id))]
    async fn update(&self, job: &Job) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET job_name = $2, job_group = $3, cron_expression = $4,
                invocation_target = $5, misfire_policy = $6, concurrent = $7,
                status = $8, remark = $9, update_time = $10
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.group)
        .bind(&job.cron_expression)
        .bind(&job.invocation_target)
        .bind(job.misfire_policy.as_i16())
        .bind(i16::from(job.concurrent))
        .bind(job.status.as_i16())
        .bind(&job.remark)
        .bind(job.updated_at)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Job {} not found", job.id)));
        }

        tracing::info!("Job updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: JobStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE jobs SET status = $2, update_time = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_i16())
            .bind(Utc::now())
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Job {} not found", id)));
        }

        tracing::info!(status = %status, "Job status updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.pool.pool())
            .await?;

        tracing::info!(deleted = result.rows_affected(), "Jobs deleted");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn select_by_id(&self, id: i64) -> Result<Option<Job>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM jobs WHERE id = $1",
            job_queries::SELECT_ALL_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    #[instrument(skip(self))]
    async fn select_by_ids(&self, ids: &[i64]) -> Result<Vec<Job>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM jobs WHERE id = ANY($1) ORDER BY id",
            job_queries::SELECT_ALL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(ids)
            .fetch_all(self.pool.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    #[instrument(skip(self))]
    async fn select_all(&self) -> Result<Vec<Job>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM jobs ORDER BY id",
            job_queries::SELECT_ALL_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(self.pool.pool()).await?;

        tracing::debug!(count = rows.len(), "Loaded all jobs");
        rows.iter().map(Self::map_row).collect()
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        filter: &JobFilter,
        page: &PageRequest,
    ) -> Result<Page<Job>, DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
        Self::push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.pool())
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM jobs",
            job_queries::SELECT_ALL_COLUMNS
        ));
        Self::push_filter(&mut select, filter);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = select.build().fetch_all(self.pool.pool()).await?;
        let records = rows.iter().map(Self::map_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(records, total as u64))
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> Result<Vec<String>, DatabaseError> {
        let groups = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT job_group FROM jobs ORDER BY job_group",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(groups)
    }
}
