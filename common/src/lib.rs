// Common library for the cron job scheduler: models, persistence, trigger engine and services

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod errors;
pub mod lock;
pub mod models;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;
