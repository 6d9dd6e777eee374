//! Accrual Domain - Per-Bill Reconciliation Processes
//!
//! Keeps each bill's running total in step with its line items, outside the
//! request path. The command side announces line item changes as
//! `AccrualEvent`s; this crate routes them to a long-lived process per bill,
//! which reconciles the total through retried, time-limited activities.
//!
//! # Components
//!
//! - **`AccrualRuntime`**: registry of per-bill processes, implements
//!   `AccrualSignaler` (signal-with-start, retirement, shutdown)
//! - **`AccrualProcess`**: the event loop for one bill
//! - **`ReconciliationActivities`**: recompute-and-write of a bill's total
//! - **`ActivityExecutor`**: start-to-close timeout and retry with backoff
//! - **`AccrualAuditor`**: periodic drift detection and repair
//!
//! # Guarantees
//!
//! - At most one reconciliation per bill runs at any time
//! - Redelivered or reordered events converge on the same total
//! - A closed bill's total is never changed
//!
//! # Example
//!
//! ```rust,ignore
//! let runtime = Arc::new(AccrualRuntime::new(ledger.clone(), AccrualConfig::default()));
//! runtime.recover_open_bills().await?;
//!
//! let service = BillService::new(ledger, customers, currencies, runtime.clone());
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod activities;
pub mod process;
pub mod runtime;
pub mod audit;

pub use config::{AccrualConfig, ActivityOptions, RetryPolicy, DEFAULT_TASK_QUEUE};
pub use error::AccrualError;
pub use retry::ActivityExecutor;
pub use activities::ReconciliationActivities;
pub use process::{AccrualProcess, ControlMessage, ProcessExit, ProcessHandle, ProcessSender};
pub use runtime::AccrualRuntime;
pub use audit::{AccrualAuditor, AuditReport, BillDrift};
