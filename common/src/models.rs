use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Job Models
// ============================================================================

/// Identity of a job inside the trigger engine: `(id, group)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub id: i64,
    pub group: String,
}

impl JobKey {
    pub fn new(id: i64, group: impl Into<String>) -> Self {
        Self {
            id,
            group: group.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.TASK_{}", self.group, self.id)
    }
}

/// Job is a persisted, schedulable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub group: String,
    pub cron_expression: String,
    pub invocation_target: String,
    pub misfire_policy: MisfirePolicy,
    pub concurrent: bool,
    pub status: JobStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn key(&self) -> JobKey {
        JobKey::new(self.id, self.group.clone())
    }

    /// Build a job row from a spec, keeping identity and creation time
    pub fn from_spec(id: i64, spec: &JobSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: spec.name.trim().to_string(),
            group: spec.group.trim().to_string(),
            cron_expression: spec.cron_expression.trim().to_string(),
            invocation_target: spec.invocation_target.trim().to_string(),
            misfire_policy: spec.misfire_policy,
            concurrent: spec.concurrent,
            status: spec.status,
            remark: spec.remark.clone(),
            created_at,
            updated_at: Utc::now(),
        }
    }
}

/// JobSpec is the caller-supplied definition used by create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default = "default_job_group")]
    pub group: String,
    pub cron_expression: String,
    pub invocation_target: String,
    #[serde(default)]
    pub misfire_policy: MisfirePolicy,
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub remark: Option<String>,
}

pub fn default_job_group() -> String {
    "default".to_string()
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        invocation_target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: default_job_group(),
            cron_expression: cron_expression.into(),
            invocation_target: invocation_target.into(),
            misfire_policy: MisfirePolicy::Default,
            concurrent: false,
            status: JobStatus::Normal,
            remark: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_misfire_policy(mut self, policy: MisfirePolicy) -> Self {
        self.misfire_policy = policy;
        self
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }
}

/// Read model returned by the management API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// MisfirePolicy decides what happens to fire times missed by more than the
/// misfire threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MisfirePolicy {
    /// Engine smart policy; for cron triggers this fires once and proceeds
    #[default]
    Default,
    /// Fire every missed occurrence as if it were on time
    IgnoreMisfires,
    /// Collapse the backlog into a single immediate fire
    FireAndProceed,
    /// Skip the backlog and wait for the next regular occurrence
    DoNothing,
}

impl MisfirePolicy {
    pub fn as_i16(self) -> i16 {
        match self {
            MisfirePolicy::Default => 0,
            MisfirePolicy::IgnoreMisfires => 1,
            MisfirePolicy::FireAndProceed => 2,
            MisfirePolicy::DoNothing => 3,
        }
    }
}

impl TryFrom<i16> for MisfirePolicy {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MisfirePolicy::Default),
            1 => Ok(MisfirePolicy::IgnoreMisfires),
            2 => Ok(MisfirePolicy::FireAndProceed),
            3 => Ok(MisfirePolicy::DoNothing),
            other => Err(format!("Unknown misfire policy: {}", other)),
        }
    }
}

impl fmt::Display for MisfirePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MisfirePolicy::Default => write!(f, "default"),
            MisfirePolicy::IgnoreMisfires => write!(f, "ignore_misfires"),
            MisfirePolicy::FireAndProceed => write!(f, "fire_and_proceed"),
            MisfirePolicy::DoNothing => write!(f, "do_nothing"),
        }
    }
}

/// Desired state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Normal,
    Paused,
}

impl JobStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            JobStatus::Normal => 1,
            JobStatus::Paused => 0,
        }
    }
}

impl TryFrom<i16> for JobStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(JobStatus::Normal),
            0 => Ok(JobStatus::Paused),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Normal => write!(f, "normal"),
            JobStatus::Paused => write!(f, "paused"),
        }
    }
}

// ============================================================================
// Job Log Models
// ============================================================================

/// JobLogEntry records one execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    /// Assigned by the log store on append
    pub id: i64,
    pub job_id: i64,
    pub job_name: String,
    pub job_group: String,
    pub invocation_target: String,
    pub status: LogStatus,
    pub trigger_source: TriggerSource,
    pub message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Success,
    Failure,
    /// The execution guard blocked an overlapping run
    Skipped,
}

impl LogStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            LogStatus::Success => 0,
            LogStatus::Failure => 1,
            LogStatus::Skipped => 2,
        }
    }
}

impl TryFrom<i16> for LogStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LogStatus::Success),
            1 => Ok(LogStatus::Failure),
            2 => Ok(LogStatus::Skipped),
            other => Err(format!("Unknown log status: {}", other)),
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::Success => write!(f, "success"),
            LogStatus::Failure => write!(f, "failure"),
            LogStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What caused an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Scheduled => write!(f, "scheduled"),
            TriggerSource::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TriggerSource::Scheduled),
            "manual" => Ok(TriggerSource::Manual),
            _ => Err(format!("Invalid trigger source: {}", s)),
        }
    }
}

// ============================================================================
// Query Models
// ============================================================================

/// Explicit pagination parameters, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub current: u32,
    pub size: u32,
}

impl PageRequest {
    pub const MAX_SIZE: u32 = 100;

    pub fn new(current: u32, size: u32) -> Self {
        Self {
            current: current.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// Clamp caller-supplied values into the accepted range
    pub fn normalized(self) -> Self {
        Self::new(self.current, self.size)
    }

    pub fn offset(&self) -> u64 {
        let page = self.normalized();
        (page.current as u64 - 1) * page.size as u64
    }

    pub fn limit(&self) -> u64 {
        self.normalized().size as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// One page of results plus the total row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, total: u64) -> Self {
        Self { records, total }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Filter for listing jobs; text fields match as substrings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub name: Option<String>,
    pub group: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        contains_opt(&job.name, self.name.as_deref())
            && contains_opt(&job.group, self.group.as_deref())
            && self.status.map_or(true, |s| s == job.status)
    }
}

/// Filter for querying execution logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogFilter {
    pub job_id: Option<i64>,
    pub job_name: Option<String>,
    pub job_group: Option<String>,
    pub status: Option<LogStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobLogFilter {
    pub fn for_job(job_id: i64) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    /// Time range applies only when both ends are present
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn matches(&self, entry: &JobLogEntry) -> bool {
        self.job_id.map_or(true, |id| id == entry.job_id)
            && contains_opt(&entry.job_name, self.job_name.as_deref())
            && contains_opt(&entry.job_group, self.job_group.as_deref())
            && self.status.map_or(true, |s| s == entry.status)
            && self
                .time_range()
                .map_or(true, |(start, end)| {
                    entry.created_at >= start && entry.created_at <= end
                })
    }
}

fn contains_opt(value: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        Some(n) if !n.is_empty() => value.contains(n),
        _ => true,
    }
}
