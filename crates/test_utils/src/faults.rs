//! Fault Injection
//!
//! `FlakyLedgerStore` wraps another `LedgerStore` and injects failures and
//! latency into the calls the accrual process depends on, so retry and
//! timeout behaviour can be exercised without a real database.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use core_kernel::{
    AdapterHealth, BillId, DomainPort, HealthCheckResult, HealthCheckable, LineItemId, PortError,
};
use domain_billing::{Bill, LedgerStore, LineItem};
use rust_decimal::Decimal;

/// Ledger store wrapper with controllable faults
pub struct FlakyLedgerStore {
    inner: Arc<dyn LedgerStore>,
    transient_update_failures: AtomicU32,
    permanent_update_failure: AtomicBool,
    slow_reads: AtomicU32,
    read_delay_ms: AtomicU64,
    update_calls: AtomicU32,
}

impl FlakyLedgerStore {
    pub fn new(inner: Arc<dyn LedgerStore>) -> Self {
        Self {
            inner,
            transient_update_failures: AtomicU32::new(0),
            permanent_update_failure: AtomicBool::new(false),
            slow_reads: AtomicU32::new(0),
            read_delay_ms: AtomicU64::new(0),
            update_calls: AtomicU32::new(0),
        }
    }

    /// The next `count` calls to `update_bill_total` fail with a connection error
    pub fn fail_next_updates(&self, count: u32) {
        self.transient_update_failures.store(count, Ordering::SeqCst);
    }

    /// Every call to `update_bill_total` fails with an internal error
    pub fn fail_updates_permanently(&self, failing: bool) {
        self.permanent_update_failure.store(failing, Ordering::SeqCst);
    }

    /// The next `count` calls to `get_bill` sleep for `delay` first
    pub fn slow_next_reads(&self, count: u32, delay: Duration) {
        self.read_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
        self.slow_reads.store(count, Ordering::SeqCst);
    }

    /// Number of `update_bill_total` calls seen so far, failed ones included
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl DomainPort for FlakyLedgerStore {}

#[async_trait]
impl HealthCheckable for FlakyLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: "flaky-ledger-store".to_string(),
            status: AdapterHealth::Degraded,
            latency_ms: 0,
            message: Some("Fault-injecting test adapter".to_string()),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn create_bill(&self, bill: Bill) -> Result<Bill, PortError> {
        self.inner.create_bill(bill).await
    }

    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
        if Self::take_one(&self.slow_reads) {
            let delay = self.read_delay_ms.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.get_bill(id).await
    }

    async fn close_bill(&self, id: BillId) -> Result<Bill, PortError> {
        self.inner.close_bill(id).await
    }

    async fn create_line_item(&self, item: LineItem) -> Result<LineItem, PortError> {
        self.inner.create_line_item(item).await
    }

    async fn get_line_item(&self, id: LineItemId) -> Result<LineItem, PortError> {
        self.inner.get_line_item(id).await
    }

    async fn get_line_items_by_bill(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError> {
        self.inner.get_line_items_by_bill(bill_id).await
    }

    async fn mark_line_item_removed(&self, id: LineItemId) -> Result<LineItem, PortError> {
        self.inner.mark_line_item_removed(id).await
    }

    async fn update_bill_total(&self, id: BillId, total: Decimal) -> Result<Bill, PortError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent_update_failure.load(Ordering::SeqCst) {
            return Err(PortError::internal("injected permanent failure"));
        }
        if Self::take_one(&self.transient_update_failures) {
            return Err(PortError::connection("injected connection failure"));
        }
        self.inner.update_bill_total(id, total).await
    }

    async fn list_open_bills(&self) -> Result<Vec<Bill>, PortError> {
        self.inner.list_open_bills().await
    }
}
