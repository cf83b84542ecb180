// Postgres-backed job and job log stores

pub mod job;
pub mod job_log;
pub mod queries;

pub use job::JobRepository;
pub use job_log::JobLogRepository;
