//! Reconciliation activities
//!
//! The only code that writes `Bill::total_amount` after a bill is created.
//!
//! Activities do not apply deltas. Each invocation recomputes the total from
//! the bill's active line items and writes it only when it differs from the
//! stored value, so running an activity twice for the same event, or running
//! events in any order, converges on the same total.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use core_kernel::BillId;
use domain_billing::{Bill, LedgerStore, LedgerStoreExt, LineItem, LineItemSignal};

use crate::error::AccrualError;

/// Activities invoked by accrual processes
#[derive(Clone)]
pub struct ReconciliationActivities {
    ledger: Arc<dyn LedgerStore>,
}

impl ReconciliationActivities {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Reconciles a bill after one of its line items was added
    ///
    /// # Returns
    ///
    /// The reconciled total
    #[instrument(skip(self), fields(bill_id = %signal.bill_id, line_item_id = %signal.line_item_id))]
    pub async fn apply_addition(&self, signal: LineItemSignal) -> Result<Decimal, AccrualError> {
        let (bill, item) = self.load(signal).await?;
        if item.removed {
            debug!("Line item removed before its addition was applied");
        }
        self.reconcile(bill).await
    }

    /// Reconciles a bill after one of its line items was removed
    ///
    /// # Returns
    ///
    /// The reconciled total
    #[instrument(skip(self), fields(bill_id = %signal.bill_id, line_item_id = %signal.line_item_id))]
    pub async fn apply_removal(&self, signal: LineItemSignal) -> Result<Decimal, AccrualError> {
        let (bill, item) = self.load(signal).await?;
        if !item.removed {
            debug!("Removal applied for a line item that is still active");
        }
        self.reconcile(bill).await
    }

    /// Reconciles a bill without a triggering line item
    #[instrument(skip(self), fields(bill_id = %bill_id))]
    pub async fn recompute_total(&self, bill_id: BillId) -> Result<Decimal, AccrualError> {
        let bill = self.load_open_bill(bill_id).await?;
        self.reconcile(bill).await
    }

    async fn load(&self, signal: LineItemSignal) -> Result<(Bill, LineItem), AccrualError> {
        let bill = self.load_open_bill(signal.bill_id).await?;

        let item = self
            .ledger
            .get_line_item(signal.line_item_id)
            .await
            .map_err(|e| {
                AccrualError::or_not_found(e, AccrualError::LineItemNotFound(signal.line_item_id))
            })?;
        if item.bill_id != bill.id {
            return Err(AccrualError::LineItemMismatch {
                line_item_id: item.id,
                bill_id: bill.id,
            });
        }

        Ok((bill, item))
    }

    async fn load_open_bill(&self, bill_id: BillId) -> Result<Bill, AccrualError> {
        let bill = self
            .ledger
            .get_bill(bill_id)
            .await
            .map_err(|e| AccrualError::or_not_found(e, AccrualError::BillNotFound(bill_id)))?;
        if bill.is_closed() {
            return Err(AccrualError::BillClosed(bill_id));
        }
        Ok(bill)
    }

    async fn reconcile(&self, bill: Bill) -> Result<Decimal, AccrualError> {
        let total = self.ledger.accrued_total(bill.id).await?;
        if total == bill.total_amount {
            debug!(total = %total, "Total already reconciled");
            return Ok(total);
        }

        self.ledger
            .update_bill_total(bill.id, total)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AccrualError::BillClosed(bill.id)
                } else {
                    AccrualError::or_not_found(e, AccrualError::BillNotFound(bill.id))
                }
            })?;
        info!(previous = %bill.total_amount, total = %total, "Bill total reconciled");
        Ok(total)
    }
}
