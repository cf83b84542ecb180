// Error handling framework

use crate::models::JobKey;
use thiserror::Error;

/// Schedule-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("No next execution time available for cron expression '{0}'")]
    NoNextExecution(String),
}

/// Validation errors, raised before any store or engine mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Invocation target is not registered: {0}")]
    UnknownInvocationTarget(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Trigger engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Trigger already registered: {0}")]
    AlreadyRegistered(JobKey),

    #[error("Trigger not registered: {0}")]
    NotRegistered(JobKey),

    #[error("Invalid schedule for trigger {key}: {reason}")]
    InvalidSchedule { key: JobKey, reason: String },

    #[error("Trigger engine has been shut down")]
    ShutDown,
}

/// Errors raised while resolving or running an invocation target.
/// These never leave the dispatcher; they end up in the job log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid invocation target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("No handler registered for '{0}'")]
    UnknownTarget(String),

    #[error("Job handler failed: {0}")]
    HandlerFailed(String),

    #[error("Job handler panicked: {0}")]
    Panicked(String),
}

/// Errors surfaced by the job management API
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    NotFound(String),

    /// The store and the trigger engine disagree after a failed two-step write
    #[error("Scheduler state inconsistent: {0}")]
    Consistency(String),

    #[error("Storage error: {0}")]
    Store(DatabaseError),

    #[error("Trigger engine error: {0}")]
    Engine(#[from] EngineError),
}

// A row that vanished between read and write is still a missing job
impl From<DatabaseError> for SchedulerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => SchedulerError::NotFound(msg),
            other => SchedulerError::Store(other),
        }
    }
}

impl SchedulerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SchedulerError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulerError::NotFound(_))
    }
}

/// API response error type for collaborators exposing the management surface
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        let code = match err {
            SchedulerError::Validation(_) => "VALIDATION_ERROR",
            SchedulerError::NotFound(_) => "NOT_FOUND",
            SchedulerError::Consistency(_) => "CONSISTENCY_ERROR",
            SchedulerError::Store(_) => "STORAGE_ERROR",
            SchedulerError::Engine(_) => "ENGINE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}
