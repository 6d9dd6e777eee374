//! End-to-end tests for the accrual path: command service → runtime →
//! process → activities → ledger

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::BillId;
use domain_accrual::{
    AccrualAuditor, AccrualConfig, AccrualRuntime, ActivityOptions, RetryPolicy,
};
use domain_billing::ports::mock::MockLedgerStore;
use domain_billing::{
    AccrualEvent, AccrualSignaler, AddLineItemRequest, BillService, BillingError, LedgerStore,
    LedgerStoreExt, LineItem,
};
use test_utils::{
    accrual_script_strategy, assert_bill_settled, assert_total_stays, redelivery_strategy,
    wait_for_settled, wait_for_total, AccrualOp, AmountFixtures, FlakyLedgerStore, InMemoryBilling,
    TestBillBuilder, TestLineItemBuilder, DEFAULT_SETTLE_TIMEOUT,
};

fn fast_config() -> AccrualConfig {
    AccrualConfig {
        channel_capacity: 64,
        activity: ActivityOptions {
            start_to_close_timeout_ms: 200,
            retry: RetryPolicy {
                max_attempts: 4,
                initial_interval_ms: 5,
                backoff_coefficient: 2.0,
                maximum_interval_ms: 50,
            },
        },
        ..AccrualConfig::default()
    }
}

struct Harness {
    billing: InMemoryBilling,
    runtime: Arc<AccrualRuntime>,
    service: BillService,
}

async fn harness() -> Harness {
    let billing = InMemoryBilling::seeded().await;
    let runtime = Arc::new(AccrualRuntime::new(Arc::new(billing.ledger.clone()), fast_config()));
    let service = billing.bill_service(runtime.clone());
    Harness {
        billing,
        runtime,
        service,
    }
}

async fn add(service: &BillService, bill_id: BillId, amount: Decimal) -> LineItem {
    service
        .add_line_item(AddLineItemRequest {
            bill_id,
            description: "usage".to_string(),
            amount,
        })
        .await
        .unwrap()
}

// ============================================================================
// Scenario Tests
// ============================================================================

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_bill_lifecycle_scenarios() {
        let h = harness().await;
        let ledger = &h.billing.ledger;

        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();
        assert_eq!(bill.total_amount, Decimal::ZERO);
        assert!(h.runtime.is_running(bill.id).await);

        // A: first item
        let ten = add(&h.service, bill.id, AmountFixtures::ten()).await;
        wait_for_total(ledger, bill.id, dec!(10.0), DEFAULT_SETTLE_TIMEOUT).await;

        // B: second item
        add(&h.service, bill.id, AmountFixtures::five()).await;
        wait_for_total(ledger, bill.id, dec!(15.0), DEFAULT_SETTLE_TIMEOUT).await;

        // C: remove the first item
        h.service.remove_line_item(bill.id, ten.id).await.unwrap();
        wait_for_total(ledger, bill.id, dec!(5.0), DEFAULT_SETTLE_TIMEOUT).await;

        // D: close, then try to add
        h.service.close_bill(bill.id).await.unwrap();
        let err = h
            .service
            .add_line_item(AddLineItemRequest {
                bill_id: bill.id,
                description: "late".to_string(),
                amount: AmountFixtures::one(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::BillClosed(_)));
        assert_total_stays(ledger, bill.id, dec!(5.0), Duration::from_millis(50)).await;

        let invoice = h.service.get_invoice(bill.id).await.unwrap();
        assert!(invoice.accrual_settled);
        assert_eq!(invoice.item_count(), 1);

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_redelivered_addition_does_not_double_total() {
        let h = harness().await;
        let ledger = &h.billing.ledger;
        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();

        let ten = add(&h.service, bill.id, AmountFixtures::ten()).await;
        wait_for_total(ledger, bill.id, dec!(10.0), DEFAULT_SETTLE_TIMEOUT).await;

        // E: the substrate redelivers the same Added event
        for _ in 0..3 {
            h.runtime.signal(AccrualEvent::added(bill.id, ten.id)).await.unwrap();
        }
        h.runtime.shutdown().await;

        assert_eq!(ledger.get_bill(bill.id).await.unwrap().total_amount, dec!(10.0));
    }

    #[tokio::test]
    async fn test_redelivered_removal_is_harmless() {
        let h = harness().await;
        let ledger = &h.billing.ledger;
        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();

        let ten = add(&h.service, bill.id, dec!(10.0)).await;
        add(&h.service, bill.id, dec!(2.0)).await;
        h.service.remove_line_item(bill.id, ten.id).await.unwrap();
        h.runtime.signal(AccrualEvent::removed(bill.id, ten.id)).await.unwrap();
        h.runtime.shutdown().await;

        assert_eq!(ledger.get_bill(bill.id).await.unwrap().total_amount, dec!(2.0));
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_bill_ignores_late_events() {
        let h = harness().await;
        let ledger = &h.billing.ledger;
        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();
        add(&h.service, bill.id, dec!(10.0)).await;
        wait_for_total(ledger, bill.id, dec!(10.0), DEFAULT_SETTLE_TIMEOUT).await;

        // Written before close, announced after it
        let late = ledger
            .create_line_item(TestLineItemBuilder::new(bill.id).with_amount(dec!(3.0)).build())
            .await
            .unwrap();
        h.service.close_bill(bill.id).await.unwrap();
        h.runtime.signal(AccrualEvent::added(bill.id, late.id)).await.unwrap();

        assert_total_stays(ledger, bill.id, dec!(10.0), Duration::from_millis(50)).await;
        h.runtime.shutdown().await;
        assert_eq!(ledger.get_bill(bill.id).await.unwrap().total_amount, dec!(10.0));
    }

    #[tokio::test]
    async fn test_close_retires_process() {
        let h = harness().await;
        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();
        assert!(h.runtime.is_running(bill.id).await);

        h.service.close_bill(bill.id).await.unwrap();

        let deadline = tokio::time::Instant::now() + DEFAULT_SETTLE_TIMEOUT;
        while h.runtime.is_running(bill.id).await {
            assert!(tokio::time::Instant::now() < deadline, "process did not retire");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.runtime.live_processes().await, 0);
    }

    #[tokio::test]
    async fn test_recover_open_bills_after_restart() {
        let billing = InMemoryBilling::seeded().await;
        let (service, _signaler) = billing.recording_service();

        // Bills and items written while no runtime was running
        let bill = service.create_bill(billing.bill_request()).await.unwrap();
        add(&service, bill.id, dec!(4.0)).await;
        let closed = service.create_bill(billing.bill_request()).await.unwrap();
        service.close_bill(closed.id).await.unwrap();

        let ledger: Arc<dyn LedgerStore> = Arc::new(billing.ledger.clone());
        let runtime = Arc::new(AccrualRuntime::new(ledger.clone(), fast_config()));
        assert_eq!(runtime.recover_open_bills().await.unwrap(), 1);

        let report = AccrualAuditor::new(ledger, runtime.clone()).audit().await.unwrap();
        assert_eq!(report.drifted.len(), 1);

        wait_for_total(&billing.ledger, bill.id, dec!(4.0), DEFAULT_SETTLE_TIMEOUT).await;
        runtime.shutdown().await;
    }
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

mod failure_tests {
    use super::*;

    async fn flaky_harness() -> (InMemoryBilling, Arc<FlakyLedgerStore>, Arc<AccrualRuntime>, BillService) {
        let billing = InMemoryBilling::seeded().await;
        let flaky = Arc::new(FlakyLedgerStore::new(Arc::new(billing.ledger.clone())));
        let runtime = Arc::new(AccrualRuntime::new(flaky.clone(), fast_config()));
        let service = billing.bill_service_over(flaky.clone(), runtime.clone());
        (billing, flaky, runtime, service)
    }

    #[tokio::test]
    async fn test_transient_store_failures_are_retried() {
        let (billing, flaky, runtime, service) = flaky_harness().await;
        let bill = service.create_bill(billing.bill_request()).await.unwrap();

        flaky.fail_next_updates(2);
        add(&service, bill.id, dec!(10.0)).await;

        wait_for_total(&billing.ledger, bill.id, dec!(10.0), DEFAULT_SETTLE_TIMEOUT).await;
        assert_eq!(flaky.update_calls(), 3);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_timed_out_attempt_is_retried() {
        let (billing, flaky, runtime, service) = flaky_harness().await;
        let bill = service.create_bill(billing.bill_request()).await.unwrap();

        // Reads made by the command service itself also count
        add(&service, bill.id, dec!(1.0)).await;
        wait_for_total(&billing.ledger, bill.id, dec!(1.0), DEFAULT_SETTLE_TIMEOUT).await;

        flaky.slow_next_reads(1, Duration::from_millis(500));
        runtime.signal(AccrualEvent::added(bill.id, add_direct(&billing, bill.id, dec!(2.0)).await.id))
            .await
            .unwrap();

        wait_for_total(&billing.ledger, bill.id, dec!(3.0), DEFAULT_SETTLE_TIMEOUT).await;
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_permanent_failure_is_logged_and_process_keeps_listening() {
        let (billing, flaky, runtime, service) = flaky_harness().await;
        let bill = service.create_bill(billing.bill_request()).await.unwrap();

        flaky.fail_updates_permanently(true);
        add(&service, bill.id, dec!(10.0)).await;
        assert_total_stays(&billing.ledger, bill.id, Decimal::ZERO, Duration::from_millis(100)).await;
        assert_eq!(flaky.update_calls(), 1);

        flaky.fail_updates_permanently(false);
        add(&service, bill.id, dec!(5.0)).await;
        wait_for_total(&billing.ledger, bill.id, dec!(15.0), DEFAULT_SETTLE_TIMEOUT).await;
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_lost_events_are_repaired_by_auditor() {
        let billing = InMemoryBilling::seeded().await;
        let (service, signaler) = billing.recording_service();
        signaler.fail_all(true);

        let bill = service.create_bill(billing.bill_request()).await.unwrap();
        let ten = add(&service, bill.id, dec!(10.0)).await;
        add(&service, bill.id, dec!(7.5)).await;
        service.remove_line_item(bill.id, ten.id).await.unwrap();
        assert!(signaler.events().await.is_empty());

        let ledger: Arc<dyn LedgerStore> = Arc::new(billing.ledger.clone());
        let runtime = Arc::new(AccrualRuntime::new(ledger.clone(), fast_config()));
        let auditor = AccrualAuditor::new(ledger, runtime.clone());

        let report = auditor.audit().await.unwrap();
        assert_eq!(report.drifted[0].expected, dec!(7.5));

        wait_for_total(&billing.ledger, bill.id, dec!(7.5), DEFAULT_SETTLE_TIMEOUT).await;
        assert!(auditor.audit().await.unwrap().is_clean());
        runtime.shutdown().await;
    }

    async fn add_direct(billing: &InMemoryBilling, bill_id: BillId, amount: Decimal) -> LineItem {
        billing
            .ledger
            .create_line_item(TestLineItemBuilder::new(bill_id).with_amount(amount).build())
            .await
            .unwrap()
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_changes_to_one_bill_lose_no_updates() {
        let h = harness().await;
        let bill = h.service.create_bill(h.billing.bill_request()).await.unwrap();

        let mut tasks = Vec::new();
        for i in 1..=40 {
            let service = h.service.clone();
            tasks.push(tokio::spawn(async move {
                let item = add(&service, bill.id, Decimal::new(i, 1)).await;
                if i % 4 == 0 {
                    service.remove_line_item(bill.id, item.id).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let settled = wait_for_settled(&h.billing.ledger, bill.id, DEFAULT_SETTLE_TIMEOUT).await;
        // 0.1 + ... + 4.0 minus every fourth
        assert_eq!(settled.total_amount, dec!(82.0) - dec!(22.0));
        h.runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bills_accrue_in_parallel() {
        let h = harness().await;

        let mut bills = Vec::new();
        for _ in 0..20 {
            bills.push(h.service.create_bill(h.billing.bill_request()).await.unwrap());
        }

        let mut tasks = Vec::new();
        for bill in &bills {
            let service = h.service.clone();
            let bill_id = bill.id;
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    add(&service, bill_id, dec!(1.5)).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        h.runtime.shutdown().await;
        for bill in &bills {
            assert_bill_settled(&h.billing.ledger, bill.id).await;
            assert_eq!(
                h.billing.ledger.get_bill(bill.id).await.unwrap().total_amount,
                dec!(7.5)
            );
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

/// Deterministic Fisher-Yates shuffle driven by a xorshift seed
fn shuffle<T>(items: &mut [T], mut seed: u64) {
    seed |= 1;
    for i in (1..items.len()).rev() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let j = (seed % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_total_converges_for_any_delivery_order(
        script in accrual_script_strategy(12),
        redelivery in redelivery_strategy(6),
        seed in any::<u64>(),
        flush_every in 1usize..5,
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let (recorded, expected) = rt.block_on(async move {
            let ledger = MockLedgerStore::new();
            let bill = ledger.create_bill(TestBillBuilder::new().build()).await.unwrap();
            let runtime = AccrualRuntime::new(Arc::new(ledger.clone()), fast_config());

            let mut items: Vec<LineItem> = Vec::new();
            let mut emitted: Vec<AccrualEvent> = Vec::new();
            let mut pending: Vec<AccrualEvent> = Vec::new();

            for (step, op) in script.into_iter().enumerate() {
                match op {
                    AccrualOp::Add(amount) => {
                        let item = ledger
                            .create_line_item(TestLineItemBuilder::new(bill.id).with_amount(amount).build())
                            .await
                            .unwrap();
                        pending.push(AccrualEvent::added(bill.id, item.id));
                        items.push(item);
                    }
                    AccrualOp::Remove(n) => {
                        if items.is_empty() {
                            continue;
                        }
                        let id = items[n % items.len()].id;
                        if ledger.mark_line_item_removed(id).await.is_ok() {
                            pending.push(AccrualEvent::removed(bill.id, id));
                        }
                    }
                }

                if step % flush_every == 0 {
                    shuffle(&mut pending, seed.wrapping_add(step as u64));
                    for event in pending.drain(..) {
                        runtime.signal(event).await.unwrap();
                        emitted.push(event);
                    }
                }
            }

            for i in redelivery {
                if !emitted.is_empty() {
                    pending.push(emitted[i % emitted.len()]);
                }
            }
            shuffle(&mut pending, seed);
            for event in pending {
                runtime.signal(event).await.unwrap();
            }

            runtime.shutdown().await;
            let recorded = ledger.get_bill(bill.id).await.unwrap().total_amount;
            let expected = ledger.accrued_total(bill.id).await.unwrap();
            (recorded, expected)
        });

        prop_assert_eq!(recorded, expected);
    }
}
