//! Bill aggregate
//!
//! A bill collects line items for one customer over a billing period. Its
//! running total is owned by the accrual process: nothing in this module
//! changes `total_amount` apart from the zero it starts with.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use core_kernel::{BillId, BillingPeriod, CurrencyId, CustomerId};

use crate::error::BillingError;

/// Bill lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Accepting line items
    Open,
    /// Soft-closed, immutable
    Closed,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Open => "open",
            BillStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(BillStatus::Open),
            "closed" => Ok(BillStatus::Closed),
            other => Err(BillingError::validation(format!("unknown bill status '{}'", other))),
        }
    }
}

/// A bill accruing charges for a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub id: BillId,
    /// Free-form description
    pub description: String,
    /// Customer being billed
    pub customer_id: CustomerId,
    /// Currency the bill is denominated in
    pub currency_id: CurrencyId,
    /// Lifecycle status
    pub status: BillStatus,
    /// Running total, maintained by the accrual process
    pub total_amount: Decimal,
    /// Period the bill covers
    pub period: BillingPeriod,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Opens a new bill with a zero total
    pub fn open(
        description: impl Into<String>,
        customer_id: CustomerId,
        currency_id: CurrencyId,
        period: BillingPeriod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BillId::new_v7(),
            description: description.into(),
            customer_id,
            currency_id,
            status: BillStatus::Open,
            total_amount: Decimal::ZERO,
            period,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == BillStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == BillStatus::Closed
    }

    /// Fails with `BillClosed` unless the bill is still open
    pub fn ensure_open(&self) -> Result<(), BillingError> {
        if self.is_closed() {
            return Err(BillingError::BillClosed(self.id));
        }
        Ok(())
    }

    /// Transitions the bill to closed
    ///
    /// # Errors
    ///
    /// Returns `BillClosed` if the bill is already closed
    pub fn close(&mut self) -> Result<(), BillingError> {
        self.ensure_open()?;
        self.status = BillStatus::Closed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Request to open a new bill
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBillRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    pub customer_id: CustomerId,
    /// ISO 4217 code, resolved to a currency record by the service
    #[validate(length(equal = 3))]
    pub currency_code: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl CreateBillRequest {
    /// Validates field constraints and returns the billing period
    pub fn validated_period(&self) -> Result<BillingPeriod, BillingError> {
        self.validate()?;
        Ok(BillingPeriod::new(self.period_start, self.period_end)?)
    }
}
