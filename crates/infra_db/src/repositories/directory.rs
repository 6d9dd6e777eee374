//! Customer and currency repositories
//!
//! Both tables are plain reference data: insert once, read by key.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for customers
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a customer; a taken email yields `DuplicateEntry`
    pub async fn insert(&self, customer: &CustomerRow) -> Result<CustomerRow, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            INSERT INTO customers (customer_id, first_name, last_name, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING customer_id, first_name, last_name, email, created_at, updated_at
            "#,
        )
        .bind(customer.customer_id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_id(&self, customer_id: Uuid) -> Result<CustomerRow, DatabaseError> {
        sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT customer_id, first_name, last_name, email, created_at, updated_at
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Customer", customer_id))
    }
}

/// Repository for currencies
#[derive(Debug, Clone)]
pub struct CurrencyRepository {
    pool: PgPool,
}

impl CurrencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a currency; a taken code yields `DuplicateEntry`
    pub async fn insert(&self, currency: &CurrencyRow) -> Result<CurrencyRow, DatabaseError> {
        let row = sqlx::query_as::<_, CurrencyRow>(
            r#"
            INSERT INTO currencies (currency_id, code, name, symbol, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING currency_id, code, name, symbol, created_at, updated_at
            "#,
        )
        .bind(currency.currency_id)
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(&currency.symbol)
        .bind(currency.created_at)
        .bind(currency.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_id(&self, currency_id: Uuid) -> Result<CurrencyRow, DatabaseError> {
        sqlx::query_as::<_, CurrencyRow>(
            r#"
            SELECT currency_id, code, name, symbol, created_at, updated_at
            FROM currencies
            WHERE currency_id = $1
            "#,
        )
        .bind(currency_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Currency", currency_id))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<CurrencyRow, DatabaseError> {
        sqlx::query_as::<_, CurrencyRow>(
            r#"
            SELECT currency_id, code, name, symbol, created_at, updated_at
            FROM currencies
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Currency", code))
    }
}

/// Row in the `customers` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CustomerRow {
    pub customer_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row in the `currencies` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CurrencyRow {
    pub currency_id: Uuid,
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
