//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, Utc};
use core_kernel::{BillId, BillingPeriod, CurrencyId, CustomerId};
use domain_billing::{Bill, BillStatus, LineItem};
use rust_decimal::Decimal;

use crate::fixtures::{AmountFixtures, TemporalFixtures};

/// Builder for constructing test bills
pub struct TestBillBuilder {
    description: String,
    customer_id: CustomerId,
    currency_id: CurrencyId,
    period: BillingPeriod,
    status: BillStatus,
    total_amount: Decimal,
}

impl Default for TestBillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBillBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            description: "bill 01".to_string(),
            customer_id: CustomerId::new(),
            currency_id: CurrencyId::new(),
            period: TemporalFixtures::january(),
            status: BillStatus::Open,
            total_amount: Decimal::ZERO,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn with_currency(mut self, currency_id: CurrencyId) -> Self {
        self.currency_id = currency_id;
        self
    }

    /// Sets the period
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`
    pub fn with_period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.period = BillingPeriod::new(start, end).expect("Invalid test period");
        self
    }

    /// Presets a recorded total, e.g. to simulate drift
    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total_amount = total;
        self
    }

    pub fn closed(mut self) -> Self {
        self.status = BillStatus::Closed;
        self
    }

    pub fn build(self) -> Bill {
        let mut bill = Bill::open(self.description, self.customer_id, self.currency_id, self.period);
        bill.status = self.status;
        bill.total_amount = self.total_amount;
        bill
    }
}

/// Builder for constructing test line items
pub struct TestLineItemBuilder {
    bill_id: BillId,
    description: String,
    amount: Decimal,
    removed: bool,
}

impl TestLineItemBuilder {
    pub fn new(bill_id: BillId) -> Self {
        Self {
            bill_id,
            description: "usage".to_string(),
            amount: AmountFixtures::ten(),
            removed: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// # Panics
    ///
    /// Panics if the amount is not positive
    pub fn build(self) -> LineItem {
        let mut item = LineItem::new(self.bill_id, self.description, self.amount)
            .expect("Invalid test line item");
        item.removed = self.removed;
        item
    }
}
