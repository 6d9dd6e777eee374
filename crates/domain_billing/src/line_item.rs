//! Line items
//!
//! A line item is a single positive charge on a bill. Items are never
//! deleted; removal sets a tombstone flag that can not be cleared again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{BillId, LineItemId};

use crate::error::BillingError;

/// Decimal places stored for an amount (`NUMERIC(20, 4)`)
pub const AMOUNT_SCALE: u32 = 4;

/// A single charge on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub bill_id: BillId,
    pub description: String,
    /// Always strictly positive
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    /// Tombstone flag
    pub removed: bool,
}

impl LineItem {
    /// Creates a new line item for a bill
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the amount is not strictly positive or has
    /// more than `AMOUNT_SCALE` decimal places
    pub fn new(
        bill_id: BillId,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Result<Self, BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "line item amount must be positive, got {}",
                amount
            )));
        }
        // Trailing zeros do not count: 10.5000 is stored as-is
        if amount.normalize().scale() > AMOUNT_SCALE {
            return Err(BillingError::validation(format!(
                "line item amount {} has more than {} decimal places",
                amount, AMOUNT_SCALE
            )));
        }

        Ok(Self {
            id: LineItemId::new_v7(),
            bill_id,
            description: description.into(),
            amount,
            created_at: Utc::now(),
            removed: false,
        })
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// Sets the tombstone flag
    ///
    /// # Errors
    ///
    /// Returns `LineItemAlreadyRemoved` on a second removal
    pub fn mark_removed(&mut self) -> Result<(), BillingError> {
        if self.removed {
            return Err(BillingError::LineItemAlreadyRemoved(self.id));
        }
        self.removed = true;
        Ok(())
    }
}

/// Sum of the amounts of all non-removed line items
///
/// This is the authoritative value for a bill's total: the accrual process
/// converges `Bill::total_amount` onto it.
pub fn accrued_total<'a, I>(items: I) -> Decimal
where
    I: IntoIterator<Item = &'a LineItem>,
{
    items
        .into_iter()
        .filter(|item| item.is_active())
        .map(|item| item.amount)
        .sum()
}

/// Request to add a line item to a bill
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddLineItemRequest {
    pub bill_id: BillId,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    pub amount: Decimal,
}
