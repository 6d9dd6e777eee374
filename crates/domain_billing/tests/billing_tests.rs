//! Comprehensive tests for domain_billing

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BillId, BillingPeriod, CurrencyId, CustomerId, LineItemId};

use domain_billing::bill::{Bill, BillStatus, CreateBillRequest};
use domain_billing::events::{AccrualEvent, AccrualEventKind, ProcessKey};
use domain_billing::invoice::Invoice;
use domain_billing::line_item::{accrued_total, LineItem};
use domain_billing::BillingError;

fn period() -> BillingPeriod {
    BillingPeriod::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap(),
    )
    .unwrap()
}

// ============================================================================
// Bill Tests
// ============================================================================

mod bill_tests {
    use super::*;

    #[test]
    fn test_bill_open_defaults() {
        let customer_id = CustomerId::new();
        let currency_id = CurrencyId::new();
        let bill = Bill::open("March usage", customer_id, currency_id, period());

        assert_eq!(bill.description, "March usage");
        assert_eq!(bill.customer_id, customer_id);
        assert_eq!(bill.currency_id, currency_id);
        assert_eq!(bill.status, BillStatus::Open);
        assert_eq!(bill.total_amount, Decimal::ZERO);
        assert!(bill.ensure_open().is_ok());
    }

    #[test]
    fn test_bill_ids_are_unique() {
        let a = Bill::open("a", CustomerId::new(), CurrencyId::new(), period());
        let b = Bill::open("b", CustomerId::new(), CurrencyId::new(), period());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_closed_bill_guard() {
        let mut bill = Bill::open("March usage", CustomerId::new(), CurrencyId::new(), period());
        bill.close().unwrap();

        assert!(matches!(bill.ensure_open(), Err(BillingError::BillClosed(id)) if id == bill.id));
        assert!(bill.close().unwrap_err().is_conflict());
    }

    #[test]
    fn test_bill_serializes_status_in_snake_case() {
        let bill = Bill::open("March usage", CustomerId::new(), CurrencyId::new(), period());
        let json = serde_json::to_value(&bill).unwrap();
        assert_eq!(json["status"], "open");
    }

    #[test]
    fn test_create_request_accepts_single_instant_period() {
        let now = Utc::now();
        let request = CreateBillRequest {
            description: "point in time".to_string(),
            customer_id: CustomerId::new(),
            currency_code: "USD".to_string(),
            period_start: now,
            period_end: now,
        };
        let period = request.validated_period().unwrap();
        assert_eq!(period.start(), period.end());
    }

    #[test]
    fn test_create_request_rejects_inverted_period() {
        let now = Utc::now();
        let request = CreateBillRequest {
            description: "backwards".to_string(),
            customer_id: CustomerId::new(),
            currency_code: "USD".to_string(),
            period_start: now,
            period_end: now - Duration::seconds(1),
        };
        assert!(matches!(request.validated_period(), Err(BillingError::Validation(_))));
    }
}

// ============================================================================
// Line Item Tests
// ============================================================================

mod line_item_tests {
    use super::*;

    #[test]
    fn test_line_item_belongs_to_bill() {
        let bill_id = BillId::new();
        let item = LineItem::new(bill_id, "compute", dec!(0.01)).unwrap();
        assert_eq!(item.bill_id, bill_id);
        assert!(!item.removed);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = LineItem::new(BillId::new(), "free tier", Decimal::ZERO).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn test_scenario_totals() {
        let bill_id = BillId::new();
        let mut ten = LineItem::new(bill_id, "a", dec!(10.0)).unwrap();
        let five = LineItem::new(bill_id, "b", dec!(5.0)).unwrap();

        assert_eq!(accrued_total(std::slice::from_ref(&ten)), dec!(10.0));
        assert_eq!(accrued_total([&ten, &five]), dec!(15.0));

        ten.mark_removed().unwrap();
        assert_eq!(accrued_total([&ten, &five]), dec!(5.0));
    }
}

// ============================================================================
// Event Tests
// ============================================================================

mod event_tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(AccrualEventKind::Added.channel_name(), "ADD_BILL_ITEM_CHANNEL");
        assert_eq!(AccrualEventKind::Removed.channel_name(), "REMOVE_BILL_ITEM_CHANNEL");
    }

    #[test]
    fn test_events_for_same_bill_share_process_key() {
        let bill_id = BillId::new();
        let added = AccrualEvent::added(bill_id, LineItemId::new());
        let removed = AccrualEvent::removed(bill_id, LineItemId::new());

        assert_eq!(added.process_key(), removed.process_key());
        assert_eq!(added.process_key(), ProcessKey::for_bill(bill_id));
        assert!(added.process_key().as_str().starts_with("BILL-"));
    }

    #[test]
    fn test_events_for_different_bills_have_distinct_keys() {
        let a = AccrualEvent::added(BillId::new(), LineItemId::new());
        let b = AccrualEvent::added(BillId::new(), LineItemId::new());
        assert_ne!(a.process_key(), b.process_key());
    }
}

// ============================================================================
// Invoice Tests
// ============================================================================

mod invoice_tests {
    use super::*;

    #[test]
    fn test_invoice_orders_items_oldest_first() {
        let mut bill = Bill::open("March usage", CustomerId::new(), CurrencyId::new(), period());
        let mut first = LineItem::new(bill.id, "first", dec!(1.0)).unwrap();
        let second = LineItem::new(bill.id, "second", dec!(2.0)).unwrap();
        first.created_at = second.created_at - Duration::minutes(5);
        bill.total_amount = dec!(3.0);

        let invoice = Invoice::render(&bill, &[second.clone(), first.clone()], "GBP");

        assert_eq!(invoice.items[0].line_item_id, first.id);
        assert_eq!(invoice.items[1].line_item_id, second.id);
        assert!(invoice.accrual_settled);
        assert_eq!(invoice.period_start, period().start());
    }

    #[test]
    fn test_empty_bill_invoice_is_settled() {
        let bill = Bill::open("March usage", CustomerId::new(), CurrencyId::new(), period());
        let invoice = Invoice::render(&bill, &[], "USD");
        assert_eq!(invoice.item_count(), 0);
        assert!(invoice.accrual_settled);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_accrued_total_is_order_independent(
        amounts in prop::collection::vec((1i64..100_000, any::<bool>()), 0..40),
    ) {
        let bill_id = BillId::new();
        let mut items: Vec<LineItem> = amounts
            .iter()
            .map(|(cents, removed)| {
                let mut item = LineItem::new(bill_id, "x", Decimal::new(*cents, 2)).unwrap();
                item.removed = *removed;
                item
            })
            .collect();

        let expected: Decimal = amounts
            .iter()
            .filter(|(_, removed)| !removed)
            .map(|(cents, _)| Decimal::new(*cents, 2))
            .sum();

        prop_assert_eq!(accrued_total(&items), expected);
        items.reverse();
        prop_assert_eq!(accrued_total(&items), expected);
    }
}
