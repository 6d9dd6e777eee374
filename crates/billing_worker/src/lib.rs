//! Billing Worker
//!
//! Hosts the billing command services and the accrual runtime in one
//! process. The `billing-worker` binary loads [`WorkerConfig`], installs
//! tracing, connects to PostgreSQL, and runs a [`Worker`] until it receives
//! Ctrl+C or SIGTERM.

pub mod config;
pub mod telemetry;
pub mod worker;

pub use config::{ConfigError, DatabaseSettings, WorkerConfig};
pub use telemetry::init_tracing;
pub use worker::Worker;
