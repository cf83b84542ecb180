// Management services over the job store, trigger engine and execution log

pub mod job;
pub mod job_log;

pub use job::{BootstrapFailure, BootstrapReport, JobService};
pub use job_log::JobLogService;
