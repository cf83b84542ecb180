// SQL query constants for repositories
// Centralizes repeated SELECT column lists

/// SQL query fragments for the jobs table
pub mod job_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, job_name, job_group, cron_expression,
        invocation_target, misfire_policy, concurrent, status, remark,
        create_time, update_time"#;
}

/// SQL query fragments for the job_logs table
pub mod job_log_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, job_id, job_name, job_group,
        invocation_target, status, trigger_source, message,
        start_time, end_time, duration_ms, create_time"#;
}
