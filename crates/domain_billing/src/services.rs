//! Billing domain services
//!
//! The command side of the billing system. `BillService` validates requests,
//! writes to the ledger synchronously and then hands accrual work to the
//! per-bill accrual process through the `AccrualSignaler` port.
//!
//! # Emission discipline
//!
//! - Exactly one accrual event follows each durable line item insert or
//!   tombstone, addressed to the owning bill's process.
//! - Emission is fire-and-forget: a failure is logged at `warn` and never
//!   fails the request.
//! - Creating and closing a bill emit no accrual events. Creation starts the
//!   bill's process; closing asks it to retire.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{BillId, CurrencyId, CustomerId, LineItemId, PortError};

use crate::bill::{Bill, CreateBillRequest};
use crate::currency::{normalize_code, CreateCurrencyRequest, Currency};
use crate::customer::{CreateCustomerRequest, Customer};
use crate::error::BillingError;
use crate::events::AccrualEvent;
use crate::invoice::Invoice;
use crate::line_item::{AddLineItemRequest, LineItem};
use crate::ports::{AccrualSignaler, CurrencyPort, CustomerPort, LedgerStore};

/// Maps a store not-found onto a domain error, keeping everything else
fn or_not_found(error: PortError, not_found: BillingError) -> BillingError {
    if error.is_not_found() {
        not_found
    } else {
        BillingError::Store(error)
    }
}

/// Maps a store conflict onto a domain error, keeping everything else
fn or_conflict(error: PortError, conflict: BillingError) -> BillingError {
    if error.is_conflict() {
        conflict
    } else {
        BillingError::Store(error)
    }
}

/// Command service for bills and line items
#[derive(Clone)]
pub struct BillService {
    ledger: Arc<dyn LedgerStore>,
    customers: Arc<dyn CustomerPort>,
    currencies: Arc<dyn CurrencyPort>,
    signaler: Arc<dyn AccrualSignaler>,
}

impl BillService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        customers: Arc<dyn CustomerPort>,
        currencies: Arc<dyn CurrencyPort>,
        signaler: Arc<dyn AccrualSignaler>,
    ) -> Self {
        Self {
            ledger,
            customers,
            currencies,
            signaler,
        }
    }

    /// Opens a new bill and starts its accrual process
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed request or an inverted period
    /// - `CustomerNotFound` / `CurrencyNotFound` for dangling references
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_bill(&self, request: CreateBillRequest) -> Result<Bill, BillingError> {
        let period = request.validated_period()?;
        let code = normalize_code(&request.currency_code)?;

        self.customers
            .get_customer(request.customer_id)
            .await
            .map_err(|e| {
                or_not_found(e, BillingError::CustomerNotFound(request.customer_id.to_string()))
            })?;
        let currency = self
            .currencies
            .get_currency_by_code(&code)
            .await
            .map_err(|e| or_not_found(e, BillingError::CurrencyNotFound(code.clone())))?;

        let bill = Bill::open(request.description, request.customer_id, currency.id, period);
        let bill = self.ledger.create_bill(bill).await?;
        info!(bill_id = %bill.id, currency = %currency.code, "Bill created");

        if let Err(e) = self.signaler.start_process(&bill).await {
            warn!(bill_id = %bill.id, error = %e, "Failed to start accrual process");
        }

        Ok(bill)
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    pub async fn get_bill(&self, id: BillId) -> Result<Bill, BillingError> {
        self.ledger
            .get_bill(id)
            .await
            .map_err(|e| or_not_found(e, BillingError::BillNotFound(id)))
    }

    /// Lists all line items of a bill, removed ones included
    pub async fn list_line_items(&self, bill_id: BillId) -> Result<Vec<LineItem>, BillingError> {
        self.get_bill(bill_id).await?;
        Ok(self.ledger.get_line_items_by_bill(bill_id).await?)
    }

    /// Adds a line item to an open bill and emits `Added`
    ///
    /// The bill's total is not touched here; it converges once the accrual
    /// process has handled the event.
    ///
    /// # Errors
    ///
    /// - `BillNotFound` if the bill does not exist
    /// - `BillClosed` if the bill is closed, in which case nothing is emitted
    /// - `Validation` for a blank description, a non-positive amount or an
    ///   amount with more than four decimal places
    #[instrument(skip(self, request), fields(bill_id = %request.bill_id, amount = %request.amount))]
    pub async fn add_line_item(&self, request: AddLineItemRequest) -> Result<LineItem, BillingError> {
        request.validate()?;
        let bill = self.get_bill(request.bill_id).await?;
        bill.ensure_open()?;

        let item = LineItem::new(bill.id, request.description, request.amount)?;
        let item = self
            .ledger
            .create_line_item(item)
            .await
            .map_err(|e| or_conflict(e, BillingError::BillClosed(bill.id)))?;
        info!(line_item_id = %item.id, "Line item added");

        self.emit(AccrualEvent::added(bill.id, item.id)).await;
        Ok(item)
    }

    /// Tombstones a line item and emits `Removed`
    ///
    /// # Errors
    ///
    /// - `BillNotFound` / `LineItemNotFound` for unknown IDs
    /// - `BillClosed` if the bill is closed
    /// - `LineItemBillMismatch` if the item belongs to another bill
    /// - `LineItemAlreadyRemoved` on a second removal
    #[instrument(skip(self), fields(bill_id = %bill_id, line_item_id = %line_item_id))]
    pub async fn remove_line_item(
        &self,
        bill_id: BillId,
        line_item_id: LineItemId,
    ) -> Result<LineItem, BillingError> {
        let bill = self.get_bill(bill_id).await?;
        bill.ensure_open()?;

        let item = self
            .ledger
            .get_line_item(line_item_id)
            .await
            .map_err(|e| or_not_found(e, BillingError::LineItemNotFound(line_item_id)))?;
        if item.bill_id != bill_id {
            return Err(BillingError::LineItemBillMismatch {
                line_item_id,
                bill_id,
            });
        }
        if item.removed {
            return Err(BillingError::LineItemAlreadyRemoved(line_item_id));
        }

        let item = self
            .ledger
            .mark_line_item_removed(line_item_id)
            .await
            .map_err(|e| or_conflict(e, BillingError::LineItemAlreadyRemoved(line_item_id)))?;
        info!("Line item removed");

        self.emit(AccrualEvent::removed(bill_id, line_item_id)).await;
        Ok(item)
    }

    /// Closes a bill and asks its accrual process to retire
    ///
    /// # Errors
    ///
    /// - `BillNotFound` if the bill does not exist
    /// - `BillClosed` if it is already closed
    #[instrument(skip(self), fields(bill_id = %id))]
    pub async fn close_bill(&self, id: BillId) -> Result<Bill, BillingError> {
        let bill = self
            .ledger
            .close_bill(id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    BillingError::BillNotFound(id)
                } else {
                    or_conflict(e, BillingError::BillClosed(id))
                }
            })?;
        info!(total = %bill.total_amount, "Bill closed");

        if let Err(e) = self.signaler.retire_process(id).await {
            warn!(error = %e, "Failed to retire accrual process");
        }

        Ok(bill)
    }

    /// Renders the invoice for a bill
    #[instrument(skip(self), fields(bill_id = %id))]
    pub async fn get_invoice(&self, id: BillId) -> Result<Invoice, BillingError> {
        let bill = self.get_bill(id).await?;
        let items = self.ledger.get_line_items_by_bill(id).await?;
        let currency = self
            .currencies
            .get_currency(bill.currency_id)
            .await
            .map_err(|e| or_not_found(e, BillingError::CurrencyNotFound(bill.currency_id.to_string())))?;

        let invoice = Invoice::render(&bill, &items, currency.code);
        if !invoice.accrual_settled {
            warn!(
                recorded = %invoice.total_amount,
                expected = %invoice.line_item_total,
                "Invoice rendered before accrual settled"
            );
        }
        Ok(invoice)
    }

    async fn emit(&self, event: AccrualEvent) {
        if let Err(e) = self.signaler.signal(event).await {
            warn!(
                process_key = %event.process_key(),
                channel = event.kind().channel_name(),
                line_item_id = %event.line_item_id(),
                error = %e,
                "Failed to emit accrual event"
            );
        }
    }
}

/// Service for the customer directory
#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerPort>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerPort>) -> Self {
        Self { customers }
    }

    #[instrument(skip(self, request))]
    pub async fn create_customer(&self, request: CreateCustomerRequest) -> Result<Customer, BillingError> {
        let customer = request.into_customer()?;
        let email = customer.email.clone();
        let customer = self
            .customers
            .create_customer(customer)
            .await
            .map_err(|e| or_conflict(e, BillingError::AlreadyExists(format!("customer {}", email))))?;
        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, BillingError> {
        self.customers
            .get_customer(id)
            .await
            .map_err(|e| or_not_found(e, BillingError::CustomerNotFound(id.to_string())))
    }
}

/// Service for the currency directory
#[derive(Clone)]
pub struct CurrencyService {
    currencies: Arc<dyn CurrencyPort>,
}

impl CurrencyService {
    pub fn new(currencies: Arc<dyn CurrencyPort>) -> Self {
        Self { currencies }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_currency(&self, request: CreateCurrencyRequest) -> Result<Currency, BillingError> {
        let currency = request.into_currency()?;
        let code = currency.code.clone();
        let currency = self
            .currencies
            .create_currency(currency)
            .await
            .map_err(|e| or_conflict(e, BillingError::AlreadyExists(format!("currency {}", code))))?;
        info!(currency_id = %currency.id, "Currency registered");
        Ok(currency)
    }

    pub async fn get_currency(&self, id: CurrencyId) -> Result<Currency, BillingError> {
        self.currencies
            .get_currency(id)
            .await
            .map_err(|e| or_not_found(e, BillingError::CurrencyNotFound(id.to_string())))
    }

    pub async fn get_currency_by_code(&self, code: &str) -> Result<Currency, BillingError> {
        let code = normalize_code(code)?;
        self.currencies
            .get_currency_by_code(&code)
            .await
            .map_err(|e| or_not_found(e, BillingError::CurrencyNotFound(code.clone())))
    }
}
