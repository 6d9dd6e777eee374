//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the billing service using SQLx: connection pool
//! management, embedded migrations, repositories over the billing tables and
//! the adapters that implement the billing domain's storage ports.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! run_migrations(&pool).await?;
//! let ledger = PostgresLedgerStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PostgresDirectory, PostgresLedgerStore};
