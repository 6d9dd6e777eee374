//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::BillingPeriod;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// One step of a generated line item history
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccrualOp {
    /// Add a line item with this amount
    Add(Decimal),
    /// Remove the n-th added line item, modulo the number added so far
    Remove(usize),
}

/// Strategy for generating valid line item amounts (0.01 to 1000.00)
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for generating add/remove histories
///
/// Adds outnumber removals roughly three to one so histories keep a
/// non-trivial set of active items.
pub fn accrual_script_strategy(max_ops: usize) -> impl Strategy<Value = Vec<AccrualOp>> {
    let op = prop_oneof![
        3 => amount_strategy().prop_map(AccrualOp::Add),
        1 => any::<usize>().prop_map(AccrualOp::Remove),
    ];
    prop::collection::vec(op, 1..=max_ops.max(1))
}

/// Strategy for generating indices used to redeliver events
pub fn redelivery_strategy(max_events: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<usize>(), 0..=max_events)
}

/// Strategy for generating timestamps in 2024
pub fn timestamp_2024_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..366 * 24 * 3600).prop_map(|secs| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    })
}

/// Strategy for generating valid billing periods
pub fn period_strategy() -> impl Strategy<Value = BillingPeriod> {
    (timestamp_2024_strategy(), 0i64..90).prop_map(|(start, days)| {
        BillingPeriod::new(start, start + Duration::days(days)).unwrap()
    })
}
