//! PostgreSQL Ledger Adapter
//!
//! Implements the billing domain's `LedgerStore` port over the bill and
//! line item repositories.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_billing::LedgerStore;
//! use std::sync::Arc;
//!
//! let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let bill = ledger.get_bill(bill_id).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, BillId, BillingPeriod, DomainPort, HealthCheckResult, HealthCheckable,
    LineItemId, PortError,
};
use domain_billing::{Bill, BillStatus, LedgerStore, LineItem};

use crate::error::DatabaseError;
use crate::repositories::{BillRepository, BillRow, LineItemRepository, LineItemRow};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed implementation of the LedgerStore trait
///
/// Lifecycle rules are enforced in SQL: every write that depends on the
/// bill being open is a single conditional statement, and a write that
/// matches no row is reported as `PortError::Conflict` (or `NotFound` when
/// the row is absent).
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    bills: BillRepository,
    line_items: LineItemRepository,
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            bills: BillRepository::new(pool.clone()),
            line_items: LineItemRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Performs a SELECT 1 round trip on the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    async fn create_bill(&self, bill: Bill) -> Result<Bill, PortError> {
        let row = self.bills.insert(&bill_to_row(&bill)).await?;
        debug!("Bill inserted");
        Ok(row_to_bill(row)?)
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
        let row = self.bills.get_by_id(*id.as_uuid()).await?;
        Ok(row_to_bill(row)?)
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    async fn close_bill(&self, id: BillId) -> Result<Bill, PortError> {
        let row = self.bills.close(*id.as_uuid()).await?;
        debug!("Bill closed");
        Ok(row_to_bill(row)?)
    }

    #[instrument(skip(self, item), fields(bill_id = %item.bill_id, line_item_id = %item.id))]
    async fn create_line_item(&self, item: LineItem) -> Result<LineItem, PortError> {
        let row = self.line_items.insert(&line_item_to_row(&item)).await?;
        debug!("Line item inserted");
        Ok(row_to_line_item(row))
    }

    #[instrument(skip(self), fields(line_item_id = %id))]
    async fn get_line_item(&self, id: LineItemId) -> Result<LineItem, PortError> {
        let row = self.line_items.get_by_id(*id.as_uuid()).await?;
        Ok(row_to_line_item(row))
    }

    #[instrument(skip(self), fields(bill_id = %bill_id))]
    async fn get_line_items_by_bill(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError> {
        let rows = self.line_items.list_by_bill(*bill_id.as_uuid()).await?;
        Ok(rows.into_iter().map(row_to_line_item).collect())
    }

    #[instrument(skip(self), fields(line_item_id = %id))]
    async fn mark_line_item_removed(&self, id: LineItemId) -> Result<LineItem, PortError> {
        let row = self.line_items.mark_removed(*id.as_uuid()).await?;
        debug!("Line item removed");
        Ok(row_to_line_item(row))
    }

    #[instrument(skip(self), fields(bill_id = %id, total = %total))]
    async fn update_bill_total(&self, id: BillId, total: Decimal) -> Result<Bill, PortError> {
        let row = self.bills.update_total(*id.as_uuid(), total).await?;
        Ok(row_to_bill(row)?)
    }

    #[instrument(skip(self))]
    async fn list_open_bills(&self) -> Result<Vec<Bill>, PortError> {
        let rows = self.bills.list_open().await?;
        debug!(count = rows.len(), "Listed open bills");
        rows.into_iter()
            .map(|row| row_to_bill(row).map_err(PortError::from))
            .collect()
    }
}

fn bill_to_row(bill: &Bill) -> BillRow {
    BillRow {
        bill_id: *bill.id.as_uuid(),
        description: bill.description.clone(),
        customer_id: *bill.customer_id.as_uuid(),
        currency_id: *bill.currency_id.as_uuid(),
        status: bill.status.as_str().to_string(),
        total_amount: bill.total_amount,
        period_start: bill.period.start(),
        period_end: bill.period.end(),
        created_at: bill.created_at,
        updated_at: bill.updated_at,
    }
}

fn row_to_bill(row: BillRow) -> Result<Bill, DatabaseError> {
    let status: BillStatus = row
        .status
        .parse()
        .map_err(|e| DatabaseError::CorruptRow(format!("bill {}: {}", row.bill_id, e)))?;
    let period = BillingPeriod::new(row.period_start, row.period_end)
        .map_err(|e| DatabaseError::CorruptRow(format!("bill {}: {}", row.bill_id, e)))?;

    Ok(Bill {
        id: BillId::from(row.bill_id),
        description: row.description,
        customer_id: row.customer_id.into(),
        currency_id: row.currency_id.into(),
        status,
        total_amount: row.total_amount,
        period,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn line_item_to_row(item: &LineItem) -> LineItemRow {
    LineItemRow {
        line_item_id: *item.id.as_uuid(),
        bill_id: *item.bill_id.as_uuid(),
        description: item.description.clone(),
        amount: item.amount,
        removed: item.removed,
        created_at: item.created_at,
    }
}

fn row_to_line_item(row: LineItemRow) -> LineItem {
    LineItem {
        id: LineItemId::from(row.line_item_id),
        bill_id: BillId::from(row.bill_id),
        description: row.description,
        amount: row.amount,
        created_at: row.created_at,
        removed: row.removed,
    }
}
