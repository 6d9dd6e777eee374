//! Billing Domain Ports
//!
//! This module defines the port interfaces the billing domain needs from the
//! outside world:
//!
//! - **`LedgerStore`**: durable storage for bills and line items
//! - **`CustomerPort`** / **`CurrencyPort`**: reference directories
//! - **`AccrualSignaler`**: delivery of accrual events to the per-bill
//!   accrual process
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::adapters` implements the storage ports
//! - **Accrual runtime**: `domain_accrual::AccrualRuntime` implements
//!   `AccrualSignaler`
//! - **Mock**: in-memory implementations for tests (feature `mock`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::ports::LedgerStore;
//! use std::sync::Arc;
//!
//! pub struct BillService {
//!     ledger: Arc<dyn LedgerStore>,
//! }
//!
//! impl BillService {
//!     pub async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
//!         self.ledger.get_bill(id).await
//!     }
//! }
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;

use core_kernel::{
    BillId, CurrencyId, CustomerId, DomainPort, HealthCheckable, LineItemId, PortError,
};

use crate::bill::Bill;
use crate::currency::Currency;
use crate::customer::Customer;
use crate::events::AccrualEvent;
use crate::line_item::{accrued_total, LineItem};

/// Storage port for bills and their line items
///
/// Every method returns `PortError::NotFound` when the addressed entity does
/// not exist and `PortError::Conflict` when the write would break a lifecycle
/// rule (closed bill, removed line item).
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Persists a new bill
    async fn create_bill(&self, bill: Bill) -> Result<Bill, PortError>;

    /// Retrieves a bill by ID
    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError>;

    /// Transitions an open bill to closed
    ///
    /// # Returns
    ///
    /// The closed bill, or `PortError::Conflict` if it was already closed
    async fn close_bill(&self, id: BillId) -> Result<Bill, PortError>;

    /// Persists a new line item
    ///
    /// The insert is conditional on the owning bill being open; a closed
    /// bill yields `PortError::Conflict`.
    async fn create_line_item(&self, item: LineItem) -> Result<LineItem, PortError>;

    /// Retrieves a line item by ID
    async fn get_line_item(&self, id: LineItemId) -> Result<LineItem, PortError>;

    /// Retrieves all line items of a bill, removed ones included
    async fn get_line_items_by_bill(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError>;

    /// Sets the tombstone flag on a line item
    ///
    /// # Returns
    ///
    /// The removed line item, or `PortError::Conflict` if it was already removed
    async fn mark_line_item_removed(&self, id: LineItemId) -> Result<LineItem, PortError>;

    /// Overwrites a bill's running total
    ///
    /// The write only happens while the bill is open. A closed bill yields
    /// `PortError::Conflict` and is left untouched.
    async fn update_bill_total(&self, id: BillId, total: Decimal) -> Result<Bill, PortError>;

    /// Lists every bill that is still open
    async fn list_open_bills(&self) -> Result<Vec<Bill>, PortError>;
}

/// Extension trait for LedgerStore with convenience methods
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Sum of the active line items of a bill
    async fn accrued_total(&self, bill_id: BillId) -> Result<Decimal, PortError> {
        let items = self.get_line_items_by_bill(bill_id).await?;
        Ok(accrued_total(&items))
    }
}

impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}

/// Port for the customer directory
#[async_trait]
pub trait CustomerPort: DomainPort {
    async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError>;
}

/// Port for the currency directory
#[async_trait]
pub trait CurrencyPort: DomainPort {
    /// Registers a currency; a duplicate code yields `PortError::Conflict`
    async fn create_currency(&self, currency: Currency) -> Result<Currency, PortError>;

    async fn get_currency(&self, id: CurrencyId) -> Result<Currency, PortError>;

    /// Looks a currency up by its upper-case ISO code
    async fn get_currency_by_code(&self, code: &str) -> Result<Currency, PortError>;
}

/// Port through which the command side drives accrual processes
///
/// Delivery is at-least-once and best effort: callers log failures instead
/// of propagating them.
#[async_trait]
pub trait AccrualSignaler: DomainPort {
    /// Starts the accrual process for a newly created bill
    async fn start_process(&self, bill: &Bill) -> Result<(), PortError>;

    /// Delivers an event to the process keyed by the event's bill,
    /// starting the process first if none is running
    async fn signal(&self, event: AccrualEvent) -> Result<(), PortError>;

    /// Asks the process of a closed bill to drain its queue and exit
    async fn retire_process(&self, bill_id: BillId) -> Result<(), PortError>;
}

/// Mock implementations of the billing ports for testing
///
/// These adapters keep everything in memory and are useful for unit testing
/// without a database or a running accrual runtime.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::bill::BillStatus;

    /// In-memory mock implementation of LedgerStore
    #[derive(Debug, Default, Clone)]
    pub struct MockLedgerStore {
        bills: Arc<RwLock<HashMap<BillId, Bill>>>,
        line_items: Arc<RwLock<HashMap<LineItemId, LineItem>>>,
    }

    impl MockLedgerStore {
        /// Creates a new mock store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with bills for testing
        pub async fn with_bills(bills: Vec<Bill>) -> Self {
            let store = Self::new();
            for bill in bills {
                store.bills.write().await.insert(bill.id, bill);
            }
            store
        }

        /// Number of stored bills
        pub async fn bill_count(&self) -> usize {
            self.bills.read().await.len()
        }
    }

    impl DomainPort for MockLedgerStore {}

    #[async_trait]
    impl HealthCheckable for MockLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for MockLedgerStore {
        async fn create_bill(&self, bill: Bill) -> Result<Bill, PortError> {
            let mut bills = self.bills.write().await;
            if bills.contains_key(&bill.id) {
                return Err(PortError::conflict(format!("bill {} already exists", bill.id)));
            }
            bills.insert(bill.id, bill.clone());
            Ok(bill)
        }

        async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
            self.bills
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Bill", id))
        }

        async fn close_bill(&self, id: BillId) -> Result<Bill, PortError> {
            let mut bills = self.bills.write().await;
            let bill = bills
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Bill", id))?;
            if bill.status == BillStatus::Closed {
                return Err(PortError::conflict(format!("bill {} is already closed", id)));
            }
            bill.status = BillStatus::Closed;
            bill.updated_at = Utc::now();
            Ok(bill.clone())
        }

        async fn create_line_item(&self, item: LineItem) -> Result<LineItem, PortError> {
            // Hold the bills lock so a concurrent close can not slip in
            let bills = self.bills.read().await;
            let bill = bills
                .get(&item.bill_id)
                .ok_or_else(|| PortError::not_found("Bill", item.bill_id))?;
            if bill.status == BillStatus::Closed {
                return Err(PortError::conflict(format!("bill {} is closed", bill.id)));
            }
            self.line_items.write().await.insert(item.id, item.clone());
            Ok(item)
        }

        async fn get_line_item(&self, id: LineItemId) -> Result<LineItem, PortError> {
            self.line_items
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("LineItem", id))
        }

        async fn get_line_items_by_bill(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError> {
            let mut items: Vec<LineItem> = self
                .line_items
                .read()
                .await
                .values()
                .filter(|item| item.bill_id == bill_id)
                .cloned()
                .collect();
            items.sort_by_key(|item| item.created_at);
            Ok(items)
        }

        async fn mark_line_item_removed(&self, id: LineItemId) -> Result<LineItem, PortError> {
            let mut items = self.line_items.write().await;
            let item = items
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("LineItem", id))?;
            if item.removed {
                return Err(PortError::conflict(format!("line item {} is already removed", id)));
            }
            item.removed = true;
            Ok(item.clone())
        }

        async fn update_bill_total(&self, id: BillId, total: Decimal) -> Result<Bill, PortError> {
            let mut bills = self.bills.write().await;
            let bill = bills
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Bill", id))?;
            if bill.status == BillStatus::Closed {
                return Err(PortError::conflict(format!("bill {} is closed", id)));
            }
            bill.total_amount = total;
            bill.updated_at = Utc::now();
            Ok(bill.clone())
        }

        async fn list_open_bills(&self) -> Result<Vec<Bill>, PortError> {
            let mut open: Vec<Bill> = self
                .bills
                .read()
                .await
                .values()
                .filter(|bill| bill.is_open())
                .cloned()
                .collect();
            open.sort_by_key(|bill| bill.created_at);
            Ok(open)
        }
    }

    /// In-memory customer and currency directory
    #[derive(Debug, Default, Clone)]
    pub struct MockDirectory {
        customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
        currencies: Arc<RwLock<HashMap<CurrencyId, Currency>>>,
    }

    impl MockDirectory {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for MockDirectory {}

    #[async_trait]
    impl CustomerPort for MockDirectory {
        async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError> {
            let mut customers = self.customers.write().await;
            if customers.values().any(|c| c.email == customer.email) {
                return Err(PortError::conflict(format!(
                    "customer with email {} already exists",
                    customer.email
                )));
            }
            customers.insert(customer.id, customer.clone());
            Ok(customer)
        }

        async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
            self.customers
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }
    }

    #[async_trait]
    impl CurrencyPort for MockDirectory {
        async fn create_currency(&self, currency: Currency) -> Result<Currency, PortError> {
            let mut currencies = self.currencies.write().await;
            if currencies.values().any(|c| c.code == currency.code) {
                return Err(PortError::conflict(format!(
                    "currency {} already exists",
                    currency.code
                )));
            }
            currencies.insert(currency.id, currency.clone());
            Ok(currency)
        }

        async fn get_currency(&self, id: CurrencyId) -> Result<Currency, PortError> {
            self.currencies
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Currency", id))
        }

        async fn get_currency_by_code(&self, code: &str) -> Result<Currency, PortError> {
            self.currencies
                .read()
                .await
                .values()
                .find(|c| c.code == code)
                .cloned()
                .ok_or_else(|| PortError::not_found("Currency", code))
        }
    }

    /// Signaler that records everything it is asked to deliver
    #[derive(Debug, Default, Clone)]
    pub struct MockSignaler {
        started: Arc<RwLock<Vec<BillId>>>,
        events: Arc<RwLock<Vec<AccrualEvent>>>,
        retired: Arc<RwLock<Vec<BillId>>>,
        failing: Arc<AtomicBool>,
    }

    impl MockSignaler {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent call fail with `ServiceUnavailable`
        pub fn fail_all(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn started(&self) -> Vec<BillId> {
            self.started.read().await.clone()
        }

        pub async fn events(&self) -> Vec<AccrualEvent> {
            self.events.read().await.clone()
        }

        pub async fn retired(&self) -> Vec<BillId> {
            self.retired.read().await.clone()
        }

        fn check(&self) -> Result<(), PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "accrual-runtime".to_string(),
                });
            }
            Ok(())
        }
    }

    impl DomainPort for MockSignaler {}

    #[async_trait]
    impl AccrualSignaler for MockSignaler {
        async fn start_process(&self, bill: &Bill) -> Result<(), PortError> {
            self.check()?;
            self.started.write().await.push(bill.id);
            Ok(())
        }

        async fn signal(&self, event: AccrualEvent) -> Result<(), PortError> {
            self.check()?;
            self.events.write().await.push(event);
            Ok(())
        }

        async fn retire_process(&self, bill_id: BillId) -> Result<(), PortError> {
            self.check()?;
            self.retired.write().await.push(bill_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLedgerStore;
    use super::*;
    use chrono::{Duration, Utc};
    use core_kernel::BillingPeriod;
    use rust_decimal_macros::dec;

    fn open_bill() -> Bill {
        let now = Utc::now();
        let period = BillingPeriod::new(now, now + Duration::days(30)).unwrap();
        Bill::open("usage", CustomerId::new(), CurrencyId::new(), period)
    }

    #[tokio::test]
    async fn test_update_total_rejected_once_closed() {
        let store = MockLedgerStore::new();
        let bill = store.create_bill(open_bill()).await.unwrap();

        store.update_bill_total(bill.id, dec!(4.0)).await.unwrap();
        store.close_bill(bill.id).await.unwrap();

        let err = store.update_bill_total(bill.id, dec!(9.0)).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_bill(bill.id).await.unwrap().total_amount, dec!(4.0));
    }

    #[tokio::test]
    async fn test_second_removal_is_conflict() {
        let store = MockLedgerStore::new();
        let bill = store.create_bill(open_bill()).await.unwrap();
        let item = store
            .create_line_item(LineItem::new(bill.id, "a", dec!(1.0)).unwrap())
            .await
            .unwrap();

        store.mark_line_item_removed(item.id).await.unwrap();
        assert!(store.mark_line_item_removed(item.id).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_line_item_insert_requires_open_bill() {
        let store = MockLedgerStore::new();
        let bill = store.create_bill(open_bill()).await.unwrap();
        store.close_bill(bill.id).await.unwrap();

        let err = store
            .create_line_item(LineItem::new(bill.id, "late", dec!(1.0)).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store.close_bill(bill.id).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_accrued_total_and_open_listing() {
        let store = MockLedgerStore::new();
        let first = store.create_bill(open_bill()).await.unwrap();
        let second = store.create_bill(open_bill()).await.unwrap();
        store
            .create_line_item(LineItem::new(first.id, "a", dec!(2.5)).unwrap())
            .await
            .unwrap();
        store
            .create_line_item(LineItem::new(first.id, "b", dec!(1.5)).unwrap())
            .await
            .unwrap();
        store.close_bill(second.id).await.unwrap();

        assert_eq!(store.accrued_total(first.id).await.unwrap(), dec!(4.0));
        let open = store.list_open_bills().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, first.id);
    }
}
