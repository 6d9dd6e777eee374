//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for bills, customers and currencies.
//! These fixtures are designed to be consistent and predictable for unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::BillingPeriod;
use domain_billing::ports::mock::{MockDirectory, MockLedgerStore, MockSignaler};
use domain_billing::{
    AccrualSignaler, BillService, CreateBillRequest, CreateCurrencyRequest, CreateCustomerRequest, Currency,
    CurrencyService, Customer, CustomerService, LedgerStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard period start (Jan 1, 2024)
    pub fn period_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Standard period end (Jan 31, 2024)
    pub fn period_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()
    }

    /// The January 2024 billing period
    pub fn january() -> BillingPeriod {
        BillingPeriod::new(Self::period_start(), Self::period_end())
            .expect("fixture period is valid")
    }
}

/// Fixture for line item amounts used across the accrual scenarios
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn ten() -> Decimal {
        dec!(10.0)
    }

    pub fn five() -> Decimal {
        dec!(5.0)
    }

    pub fn one() -> Decimal {
        dec!(1.0)
    }
}

/// Fixture for directory requests
pub struct DirectoryFixtures;

impl DirectoryFixtures {
    pub fn customer_request() -> CreateCustomerRequest {
        CreateCustomerRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    pub fn usd_request() -> CreateCurrencyRequest {
        CreateCurrencyRequest {
            code: "USD".to_string(),
            name: "US Dollar".to_string(),
            symbol: "$".to_string(),
        }
    }

    pub fn bill_request(customer: &Customer) -> CreateBillRequest {
        CreateBillRequest {
            description: "bill 01".to_string(),
            customer_id: customer.id,
            currency_code: "USD".to_string(),
            period_start: TemporalFixtures::period_start(),
            period_end: TemporalFixtures::period_end(),
        }
    }
}

/// In-memory adapters with one customer and one currency registered
pub struct InMemoryBilling {
    pub ledger: MockLedgerStore,
    pub directory: MockDirectory,
    pub customer: Customer,
    pub currency: Currency,
}

impl InMemoryBilling {
    /// Creates the adapters and registers the fixture customer and USD
    pub async fn seeded() -> Self {
        let ledger = MockLedgerStore::new();
        let directory = MockDirectory::new();

        let customer = CustomerService::new(Arc::new(directory.clone()))
            .create_customer(DirectoryFixtures::customer_request())
            .await
            .expect("Failed to create fixture customer");
        let currency = CurrencyService::new(Arc::new(directory.clone()))
            .create_currency(DirectoryFixtures::usd_request())
            .await
            .expect("Failed to create fixture currency");

        Self {
            ledger,
            directory,
            customer,
            currency,
        }
    }

    /// Builds a bill service over these adapters and the given signaler
    pub fn bill_service(&self, signaler: Arc<dyn AccrualSignaler>) -> BillService {
        self.bill_service_over(Arc::new(self.ledger.clone()), signaler)
    }

    /// Builds a bill service over a different ledger, e.g. a fault-injecting wrapper
    pub fn bill_service_over(
        &self,
        ledger: Arc<dyn LedgerStore>,
        signaler: Arc<dyn AccrualSignaler>,
    ) -> BillService {
        BillService::new(
            ledger,
            Arc::new(self.directory.clone()),
            Arc::new(self.directory.clone()),
            signaler,
        )
    }

    /// Builds a bill service whose signaler only records
    pub fn recording_service(&self) -> (BillService, MockSignaler) {
        let signaler = MockSignaler::new();
        (self.bill_service(Arc::new(signaler.clone())), signaler)
    }

    pub fn bill_request(&self) -> CreateBillRequest {
        DirectoryFixtures::bill_request(&self.customer)
    }
}
