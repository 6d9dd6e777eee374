//! Invoice rendering
//!
//! This module renders a bill and its line items into an invoice. The
//! invoice is a read model: it is assembled on demand and never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, CustomerId, LineItemId};

use crate::bill::{Bill, BillStatus};
use crate::line_item::{accrued_total, LineItem};

/// An invoice for a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Bill the invoice was rendered from
    pub bill_id: BillId,
    /// Bill description
    pub description: String,
    /// Customer being billed
    pub customer_id: CustomerId,
    /// ISO 4217 currency code
    pub currency_code: String,
    /// Bill status at render time
    pub status: BillStatus,
    /// Total recorded on the bill by the accrual process
    pub total_amount: Decimal,
    /// Sum of the active line items
    pub line_item_total: Decimal,
    /// False while accrual events are still in flight or have been lost
    pub accrual_settled: bool,
    /// Period start
    pub period_start: DateTime<Utc>,
    /// Period end
    pub period_end: DateTime<Utc>,
    /// Active line items, oldest first
    pub items: Vec<InvoiceItem>,
    /// Render timestamp
    pub rendered_at: DateTime<Utc>,
}

impl Invoice {
    /// Renders an invoice from a bill and all of its line items
    ///
    /// # Arguments
    ///
    /// * `bill` - The bill to render
    /// * `line_items` - Every line item of the bill, removed ones included
    /// * `currency_code` - Code of the bill's currency
    pub fn render(bill: &Bill, line_items: &[LineItem], currency_code: impl Into<String>) -> Self {
        let line_item_total = accrued_total(line_items);

        let mut items: Vec<InvoiceItem> = line_items
            .iter()
            .filter(|item| item.is_active())
            .map(InvoiceItem::from)
            .collect();
        items.sort_by_key(|item| item.created_at);

        Self {
            bill_id: bill.id,
            description: bill.description.clone(),
            customer_id: bill.customer_id,
            currency_code: currency_code.into(),
            status: bill.status,
            total_amount: bill.total_amount,
            line_item_total,
            accrual_settled: line_item_total == bill.total_amount,
            period_start: bill.period.start(),
            period_end: bill.period.end(),
            items,
            rendered_at: Utc::now(),
        }
    }

    /// Returns the number of charges on the invoice
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A line on an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub line_item_id: LineItemId,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&LineItem> for InvoiceItem {
    fn from(item: &LineItem) -> Self {
        Self {
            line_item_id: item.id,
            description: item.description.clone(),
            amount: item.amount,
            created_at: item.created_at,
        }
    }
}
