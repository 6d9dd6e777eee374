//! Domain Adapters
//!
//! Adapter implementations of the billing domain's storage ports,
//! connecting them to the PostgreSQL repositories.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresDirectory, PostgresLedgerStore};
//! use domain_billing::LedgerStore;
//!
//! let ledger = PostgresLedgerStore::new(pool.clone());
//! let bill = ledger.get_bill(bill_id).await?;
//! ```

pub mod ledger;
pub mod directory;

pub use ledger::PostgresLedgerStore;
pub use directory::PostgresDirectory;
