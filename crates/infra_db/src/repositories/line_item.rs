//! Line item repository implementation
//!
//! Line items are append-only apart from the `removed` tombstone flag.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const LINE_ITEM_COLUMNS: &str = "line_item_id, bill_id, description, amount, removed, created_at";

/// Repository for line items
#[derive(Debug, Clone)]
pub struct LineItemRepository {
    pool: PgPool,
}

impl LineItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a line item if its bill is open
    ///
    /// The bill row is share-locked for the duration of the insert so a
    /// concurrent close waits for it rather than interleaving.
    ///
    /// # Errors
    ///
    /// `Conflict` if the bill is closed, `NotFound` if the bill does not exist
    pub async fn insert(&self, item: &LineItemRow) -> Result<LineItemRow, DatabaseError> {
        let row = sqlx::query_as::<_, LineItemRow>(&format!(
            r#"
            INSERT INTO line_items ({LINE_ITEM_COLUMNS})
            SELECT $1, b.bill_id, $3, $4, $5, $6
            FROM bills b
            WHERE b.bill_id = $2 AND b.status = 'open'
            FOR SHARE
            RETURNING {LINE_ITEM_COLUMNS}
            "#
        ))
        .bind(item.line_item_id)
        .bind(item.bill_id)
        .bind(&item.description)
        .bind(item.amount)
        .bind(item.removed)
        .bind(item.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row);
        }

        let status = sqlx::query_scalar::<_, String>("SELECT status FROM bills WHERE bill_id = $1")
            .bind(item.bill_id)
            .fetch_optional(&self.pool)
            .await?;
        match status {
            Some(_) => Err(DatabaseError::conflict(format!("bill {} is closed", item.bill_id))),
            None => Err(DatabaseError::not_found("Bill", item.bill_id)),
        }
    }

    pub async fn get_by_id(&self, line_item_id: Uuid) -> Result<LineItemRow, DatabaseError> {
        sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE line_item_id = $1"
        ))
        .bind(line_item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("LineItem", line_item_id))
    }

    /// Lists every line item of a bill in insertion order, removed ones included
    pub async fn list_by_bill(&self, bill_id: Uuid) -> Result<Vec<LineItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LineItemRow>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM line_items
            WHERE bill_id = $1
            ORDER BY created_at, line_item_id
            "#
        ))
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sets the tombstone flag
    ///
    /// # Errors
    ///
    /// `Conflict` if the item is already removed, `NotFound` if it does not exist
    pub async fn mark_removed(&self, line_item_id: Uuid) -> Result<LineItemRow, DatabaseError> {
        let row = sqlx::query_as::<_, LineItemRow>(&format!(
            r#"
            UPDATE line_items
            SET removed = TRUE
            WHERE line_item_id = $1 AND removed = FALSE
            RETURNING {LINE_ITEM_COLUMNS}
            "#
        ))
        .bind(line_item_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => {
                self.get_by_id(line_item_id).await?;
                Err(DatabaseError::conflict(format!(
                    "line item {} is already removed",
                    line_item_id
                )))
            }
        }
    }
}

/// Row in the `line_items` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LineItemRow {
    pub line_item_id: Uuid,
    pub bill_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
}
