//! Custom Test Assertions
//!
//! Accrual is asynchronous, so most assertions on a bill's total have to
//! poll until the accrual process has caught up.

use std::time::Duration;

use core_kernel::BillId;
use domain_billing::{Bill, LedgerStore, LedgerStoreExt};
use rust_decimal::Decimal;

/// How long `wait_for_total` polls before giving up
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls the ledger until the bill's recorded total equals `expected`
///
/// # Panics
///
/// Panics with the last observed total if `timeout` elapses first
pub async fn wait_for_total<L>(ledger: &L, bill_id: BillId, expected: Decimal, timeout: Duration) -> Bill
where
    L: LedgerStore + ?Sized,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let bill = ledger.get_bill(bill_id).await.expect("Failed to load bill");
        if bill.total_amount == expected {
            return bill;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "Bill {} total did not settle: expected={}, actual={}",
                bill_id, expected, bill.total_amount
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Polls until the recorded total equals the sum of the active line items
pub async fn wait_for_settled<L>(ledger: &L, bill_id: BillId, timeout: Duration) -> Bill
where
    L: LedgerStore + ?Sized,
{
    let expected = ledger
        .accrued_total(bill_id)
        .await
        .expect("Failed to sum line items");
    wait_for_total(ledger, bill_id, expected, timeout).await
}

/// Asserts that the total stays at `expected` for the whole `window`
///
/// Used to check that nothing changes a closed bill.
pub async fn assert_total_stays<L>(ledger: &L, bill_id: BillId, expected: Decimal, window: Duration)
where
    L: LedgerStore + ?Sized,
{
    let deadline = tokio::time::Instant::now() + window;
    while tokio::time::Instant::now() < deadline {
        let bill = ledger.get_bill(bill_id).await.expect("Failed to load bill");
        assert_eq!(
            bill.total_amount, expected,
            "Bill {} total changed unexpectedly",
            bill_id
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Asserts that a bill's recorded total matches its active line items
pub async fn assert_bill_settled<L>(ledger: &L, bill_id: BillId)
where
    L: LedgerStore + ?Sized,
{
    let bill = ledger.get_bill(bill_id).await.expect("Failed to load bill");
    let expected = ledger
        .accrued_total(bill_id)
        .await
        .expect("Failed to sum line items");
    assert_eq!(
        bill.total_amount, expected,
        "Bill {} recorded total differs from its line items",
        bill_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{TestBillBuilder, TestLineItemBuilder};
    use domain_billing::ports::mock::MockLedgerStore;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_wait_for_total_returns_once_reached() {
        let ledger = MockLedgerStore::new();
        let bill = ledger.create_bill(TestBillBuilder::new().build()).await.unwrap();

        let writer = ledger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer.update_bill_total(bill.id, dec!(7.0)).await.unwrap();
        });

        let settled = wait_for_total(&ledger, bill.id, dec!(7.0), DEFAULT_SETTLE_TIMEOUT).await;
        assert_eq!(settled.total_amount, dec!(7.0));
    }

    #[tokio::test]
    #[should_panic(expected = "did not settle")]
    async fn test_wait_for_total_panics_on_timeout() {
        let ledger = MockLedgerStore::new();
        let bill = ledger.create_bill(TestBillBuilder::new().build()).await.unwrap();
        wait_for_total(&ledger, bill.id, dec!(1.0), Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_assert_bill_settled() {
        let ledger = MockLedgerStore::new();
        let bill = ledger
            .create_bill(TestBillBuilder::new().with_total(dec!(10.0)).build())
            .await
            .unwrap();
        ledger
            .create_line_item(TestLineItemBuilder::new(bill.id).build())
            .await
            .unwrap();

        assert_bill_settled(&ledger, bill.id).await;
    }
}
