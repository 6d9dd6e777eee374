//! Billing Domain - Bills, Line Items and the Accrual Command Path
//!
//! This crate holds the billing aggregates and the command service that
//! mutates them. A bill's running total is not maintained here: every line
//! item change is written synchronously and then announced to the bill's
//! accrual process, which converges the total asynchronously.
//!
//! # Aggregates
//!
//! - **Bill**: open/closed lifecycle, billing period, running total
//! - **LineItem**: positive charge with a one-way tombstone flag
//! - **Customer** / **Currency**: reference data bills point at
//! - **Invoice**: read model rendered from a bill and its active items
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillService, AddLineItemRequest};
//!
//! let item = service
//!     .add_line_item(AddLineItemRequest {
//!         bill_id: bill.id,
//!         description: "API calls".into(),
//!         amount: dec!(10.00),
//!     })
//!     .await?;
//!
//! // bill.total_amount catches up once the accrual process runs
//! ```

pub mod bill;
pub mod line_item;
pub mod customer;
pub mod currency;
pub mod invoice;
pub mod events;
pub mod ports;
pub mod services;
pub mod error;

pub use bill::{Bill, BillStatus, CreateBillRequest};
pub use line_item::{accrued_total, AddLineItemRequest, LineItem, AMOUNT_SCALE};
pub use customer::{CreateCustomerRequest, Customer};
pub use currency::{normalize_code, CreateCurrencyRequest, Currency};
pub use invoice::{Invoice, InvoiceItem};
pub use events::{
    AccrualEvent, AccrualEventKind, LineItemSignal, ProcessKey, ADD_ITEM_CHANNEL,
    REMOVE_ITEM_CHANNEL,
};
pub use ports::{AccrualSignaler, CurrencyPort, CustomerPort, LedgerStore, LedgerStoreExt};
pub use services::{BillService, CurrencyService, CustomerService};
pub use error::BillingError;
