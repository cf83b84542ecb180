// Scheduler module: cron trigger engine and misfire planning

pub mod engine;
pub mod misfire;

pub use engine::{EngineConfig, Scheduler, TriggerEngine, TriggerSnapshot, TriggerState};
pub use misfire::{is_misfire, plan_fire, FirePlan};
