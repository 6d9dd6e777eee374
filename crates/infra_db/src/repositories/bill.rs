//! Bill repository implementation
//!
//! Database access for the `bills` table. State transitions are single
//! conditional statements on `status = 'open'`, so a closed bill can never
//! be reopened or have its total rewritten regardless of how writers race.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const BILL_COLUMNS: &str = "bill_id, description, customer_id, currency_id, status, \
     total_amount, period_start, period_end, created_at, updated_at";

/// Repository for bills
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: PgPool,
}

impl BillRepository {
    /// Creates a new BillRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a bill row
    pub async fn insert(&self, bill: &BillRow) -> Result<BillRow, DatabaseError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            INSERT INTO bills ({BILL_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill.bill_id)
        .bind(&bill.description)
        .bind(bill.customer_id)
        .bind(bill.currency_id)
        .bind(&bill.status)
        .bind(bill.total_amount)
        .bind(bill.period_start)
        .bind(bill.period_end)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Retrieves a bill by its identifier
    pub async fn get_by_id(&self, bill_id: Uuid) -> Result<BillRow, DatabaseError> {
        sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE bill_id = $1"
        ))
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Bill", bill_id))
    }

    /// Closes an open bill
    ///
    /// # Errors
    ///
    /// `Conflict` if the bill is already closed, `NotFound` if it does not exist
    pub async fn close(&self, bill_id: Uuid) -> Result<BillRow, DatabaseError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills
            SET status = 'closed', updated_at = NOW()
            WHERE bill_id = $1 AND status = 'open'
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => Err(self.closed_or_missing(bill_id).await),
        }
    }

    /// Overwrites the running total of an open bill
    ///
    /// # Errors
    ///
    /// `Conflict` if the bill is closed, `NotFound` if it does not exist
    pub async fn update_total(&self, bill_id: Uuid, total: Decimal) -> Result<BillRow, DatabaseError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills
            SET total_amount = $2, updated_at = NOW()
            WHERE bill_id = $1 AND status = 'open'
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill_id)
        .bind(total)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => Err(self.closed_or_missing(bill_id).await),
        }
    }

    /// Lists open bills, oldest first
    pub async fn list_open(&self) -> Result<Vec<BillRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE status = 'open' ORDER BY created_at, bill_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Explains why a conditional write on an open bill matched no row
    async fn closed_or_missing(&self, bill_id: Uuid) -> DatabaseError {
        match self.get_by_id(bill_id).await {
            Ok(_) => DatabaseError::conflict(format!("bill {} is closed", bill_id)),
            Err(e) => e,
        }
    }
}

/// Row in the `bills` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BillRow {
    pub bill_id: Uuid,
    pub description: String,
    pub customer_id: Uuid,
    pub currency_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
