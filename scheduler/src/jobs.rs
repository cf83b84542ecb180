// Built-in job handlers registered by the scheduler binary

use anyhow::Context;
use async_trait::async_trait;
use common::dispatcher::{InvocationArg, JobHandler, JobRegistry};
use common::store::JobLogStore;
use std::sync::Arc;
use tracing::info;

/// Empties the execution log
pub struct ClearJobLogs {
    logs: Arc<dyn JobLogStore>,
}

impl ClearJobLogs {
    pub fn new(logs: Arc<dyn JobLogStore>) -> Self {
        Self { logs }
    }
}

#[async_trait]
impl JobHandler for ClearJobLogs {
    async fn invoke(&self, _args: &[InvocationArg]) -> anyhow::Result<()> {
        let removed = self
            .logs
            .clear()
            .await
            .context("Failed to clear job log")?;
        info!(removed, "Job log cleared by scheduled job");
        Ok(())
    }
}

/// Logs its arguments; useful for checking a schedule end to end
pub struct Echo;

#[async_trait]
impl JobHandler for Echo {
    async fn invoke(&self, args: &[InvocationArg]) -> anyhow::Result<()> {
        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        info!(args = %rendered.join(", "), "Echo job ran");
        Ok(())
    }
}

/// Registry holding every built-in handler
pub fn builtin_registry(logs: Arc<dyn JobLogStore>) -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry
        .register("system.clearJobLogs", Arc::new(ClearJobLogs::new(logs)))
        .register("system.echo", Arc::new(Echo))
        .register_fn("system.noop", |_| async { Ok(()) });
    registry
}
