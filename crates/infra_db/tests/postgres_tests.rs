//! PostgreSQL adapter tests
//!
//! These run against a disposable container and are ignored by default:
//!
//! ```text
//! cargo test -p infra_db -- --ignored
//! ```

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{BillId, LineItemId};
use domain_accrual::{AccrualConfig, AccrualRuntime};
use domain_billing::{
    AddLineItemRequest, BillService, BillingError, Currency, CurrencyPort, Customer, CustomerPort,
    LedgerStore, LedgerStoreExt,
};
use infra_db::{PostgresDirectory, PostgresLedgerStore};
use test_utils::{
    wait_for_total, DirectoryFixtures, TestBillBuilder, TestDatabase, TestLineItemBuilder,
    DEFAULT_SETTLE_TIMEOUT,
};

struct Fixture {
    db: TestDatabase,
    ledger: PostgresLedgerStore,
    directory: PostgresDirectory,
    customer: Customer,
    currency: Currency,
}

async fn fixture() -> Fixture {
    let db = TestDatabase::new().await.expect("Failed to start test database");
    let ledger = PostgresLedgerStore::new(db.pool().clone());
    let directory = PostgresDirectory::new(db.pool().clone());

    let customer = directory
        .create_customer(DirectoryFixtures::customer_request().into_customer().unwrap())
        .await
        .unwrap();
    let currency = directory
        .create_currency(DirectoryFixtures::usd_request().into_currency().unwrap())
        .await
        .unwrap();

    Fixture {
        db,
        ledger,
        directory,
        customer,
        currency,
    }
}

impl Fixture {
    fn bill_builder(&self) -> TestBillBuilder {
        TestBillBuilder::new()
            .with_customer(self.customer.id)
            .with_currency(self.currency.id)
    }
}

mod ledger_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_bill_round_trip() {
        let f = fixture().await;
        let bill = f.ledger.create_bill(f.bill_builder().build()).await.unwrap();

        let loaded = f.ledger.get_bill(bill.id).await.unwrap();
        assert_eq!(loaded.id, bill.id);
        assert!(loaded.is_open());
        assert_eq!(loaded.total_amount, dec!(0));

        let open = f.ledger.list_open_bills().await.unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_missing_rows_are_not_found() {
        let f = fixture().await;

        assert!(f.ledger.get_bill(BillId::new()).await.unwrap_err().is_not_found());
        assert!(f.ledger.close_bill(BillId::new()).await.unwrap_err().is_not_found());
        assert!(f
            .ledger
            .mark_line_item_removed(LineItemId::new())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(f
            .ledger
            .create_line_item(TestLineItemBuilder::new(BillId::new()).build())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_closed_bill_rejects_writes() {
        let f = fixture().await;
        let bill = f.ledger.create_bill(f.bill_builder().build()).await.unwrap();
        f.ledger.update_bill_total(bill.id, dec!(4.0)).await.unwrap();

        let closed = f.ledger.close_bill(bill.id).await.unwrap();
        assert!(closed.is_closed());

        assert!(f.ledger.close_bill(bill.id).await.unwrap_err().is_conflict());
        assert!(f
            .ledger
            .update_bill_total(bill.id, dec!(9.0))
            .await
            .unwrap_err()
            .is_conflict());
        assert!(f
            .ledger
            .create_line_item(TestLineItemBuilder::new(bill.id).build())
            .await
            .unwrap_err()
            .is_conflict());

        assert_eq!(f.ledger.get_bill(bill.id).await.unwrap().total_amount, dec!(4.0));
        assert!(f.ledger.list_open_bills().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_line_item_tombstone() {
        let f = fixture().await;
        let bill = f.ledger.create_bill(f.bill_builder().build()).await.unwrap();
        let ten = f
            .ledger
            .create_line_item(TestLineItemBuilder::new(bill.id).with_amount(dec!(10.0)).build())
            .await
            .unwrap();
        f.ledger
            .create_line_item(TestLineItemBuilder::new(bill.id).with_amount(dec!(5.0)).build())
            .await
            .unwrap();

        let removed = f.ledger.mark_line_item_removed(ten.id).await.unwrap();
        assert!(removed.removed);
        assert!(f.ledger.mark_line_item_removed(ten.id).await.unwrap_err().is_conflict());

        let items = f.ledger.get_line_items_by_bill(bill.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, ten.id);
        assert_eq!(f.ledger.accrued_total(bill.id).await.unwrap(), dec!(5.0));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_health_check() {
        use core_kernel::HealthCheckable;

        let f = fixture().await;
        assert!(f.ledger.health_check().await.is_healthy());
    }
}

mod directory_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_currency_lookup_by_code() {
        let f = fixture().await;

        let usd = f.directory.get_currency_by_code("USD").await.unwrap();
        assert_eq!(usd.id, f.currency.id);
        assert!(f.directory.get_currency_by_code("EUR").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_duplicates_conflict() {
        let f = fixture().await;

        let err = f
            .directory
            .create_currency(DirectoryFixtures::usd_request().into_currency().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = f
            .directory
            .create_customer(DirectoryFixtures::customer_request().into_customer().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let customer = f.directory.get_customer(f.customer.id).await.unwrap();
        assert_eq!(customer.email, f.customer.email);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_clear_data_empties_tables() {
        let f = fixture().await;
        f.db.clear_data().await.unwrap();

        assert!(f.directory.get_customer(f.customer.id).await.unwrap_err().is_not_found());
    }
}

mod accrual_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "requires docker"]
    async fn test_accrual_over_postgres() {
        let f = fixture().await;
        let ledger: Arc<dyn LedgerStore> = Arc::new(f.ledger.clone());
        let runtime = Arc::new(AccrualRuntime::new(ledger.clone(), AccrualConfig::default()));
        let service = BillService::new(
            ledger,
            Arc::new(f.directory.clone()),
            Arc::new(f.directory.clone()),
            runtime.clone(),
        );

        let bill = service
            .create_bill(DirectoryFixtures::bill_request(&f.customer))
            .await
            .unwrap();
        let add = |amount| AddLineItemRequest {
            bill_id: bill.id,
            description: "usage".to_string(),
            amount,
        };

        let ten = service.add_line_item(add(dec!(10.0))).await.unwrap();
        service.add_line_item(add(dec!(5.0))).await.unwrap();
        wait_for_total(&f.ledger, bill.id, dec!(15.0), DEFAULT_SETTLE_TIMEOUT).await;

        service.remove_line_item(bill.id, ten.id).await.unwrap();
        wait_for_total(&f.ledger, bill.id, dec!(5.0), DEFAULT_SETTLE_TIMEOUT).await;

        service.close_bill(bill.id).await.unwrap();
        let err = service.add_line_item(add(dec!(1.0))).await.unwrap_err();
        assert!(matches!(err, BillingError::BillClosed(_)));

        runtime.shutdown().await;
        assert_eq!(f.ledger.get_bill(bill.id).await.unwrap().total_amount, dec!(5.0));
    }
}
