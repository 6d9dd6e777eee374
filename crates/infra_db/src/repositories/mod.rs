//! Repository implementations for the billing tables
//!
//! Repositories encapsulate SQL and speak in row types; the adapters in
//! `crate::adapters` map rows to domain types.
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow`, so the
//! crate compiles without a live database or an offline query cache.

pub mod bill;
pub mod line_item;
pub mod directory;

pub use bill::{BillRepository, BillRow};
pub use line_item::{LineItemRepository, LineItemRow};
pub use directory::{CurrencyRepository, CurrencyRow, CustomerRepository, CustomerRow};
