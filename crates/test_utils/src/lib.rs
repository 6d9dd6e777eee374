//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data and seeded in-memory adapters
//! - `builders`: Builder patterns for bills and line items
//! - `assertions`: Polling assertions for asynchronously accrued totals
//! - `faults`: Fault-injecting ledger store
//! - `generators`: Property-based test data generators
//! - `database`: PostgreSQL test container management

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod faults;
pub mod generators;
pub mod database;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use faults::*;
pub use generators::*;
pub use database::*;
