//! PostgreSQL adapter for the customer and currency directories

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{CurrencyId, CustomerId, DomainPort, PortError};
use domain_billing::{Currency, CurrencyPort, Customer, CustomerPort};

use crate::repositories::{CurrencyRepository, CurrencyRow, CustomerRepository, CustomerRow};

/// PostgreSQL-backed implementation of `CustomerPort` and `CurrencyPort`
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    customers: CustomerRepository,
    currencies: CurrencyRepository,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            customers: CustomerRepository::new(pool.clone()),
            currencies: CurrencyRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresDirectory {}

#[async_trait]
impl CustomerPort for PostgresDirectory {
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError> {
        let row = self
            .customers
            .insert(&CustomerRow {
                customer_id: *customer.id.as_uuid(),
                first_name: customer.first_name,
                last_name: customer.last_name,
                email: customer.email,
                created_at: customer.created_at,
                updated_at: customer.updated_at,
            })
            .await?;
        Ok(row_to_customer(row))
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        let row = self.customers.get_by_id(*id.as_uuid()).await?;
        Ok(row_to_customer(row))
    }
}

#[async_trait]
impl CurrencyPort for PostgresDirectory {
    #[instrument(skip(self, currency), fields(code = %currency.code))]
    async fn create_currency(&self, currency: Currency) -> Result<Currency, PortError> {
        let row = self
            .currencies
            .insert(&CurrencyRow {
                currency_id: *currency.id.as_uuid(),
                code: currency.code,
                name: currency.name,
                symbol: currency.symbol,
                created_at: currency.created_at,
                updated_at: currency.updated_at,
            })
            .await?;
        Ok(row_to_currency(row))
    }

    #[instrument(skip(self), fields(currency_id = %id))]
    async fn get_currency(&self, id: CurrencyId) -> Result<Currency, PortError> {
        let row = self.currencies.get_by_id(*id.as_uuid()).await?;
        Ok(row_to_currency(row))
    }

    #[instrument(skip(self))]
    async fn get_currency_by_code(&self, code: &str) -> Result<Currency, PortError> {
        let row = self.currencies.get_by_code(code).await?;
        Ok(row_to_currency(row))
    }
}

fn row_to_customer(row: CustomerRow) -> Customer {
    Customer {
        id: CustomerId::from(row.customer_id),
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn row_to_currency(row: CurrencyRow) -> Currency {
    Currency {
        id: CurrencyId::from(row.currency_id),
        code: row.code,
        name: row.name,
        symbol: row.symbol,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
