//! Drift audit
//!
//! Accrual events are emitted best effort, so a lost event leaves a bill's
//! recorded total behind its line items until something else touches the
//! bill. The auditor compares every open bill against its active line items
//! and sends `Resync` to the owning process when they disagree. Repairs go
//! through the process so they never race with its own reconciliations.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use core_kernel::BillId;
use domain_billing::{LedgerStore, LedgerStoreExt};

use crate::error::AccrualError;
use crate::runtime::AccrualRuntime;

/// A bill whose recorded total disagrees with its line items
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillDrift {
    pub bill_id: BillId,
    pub recorded: Decimal,
    pub expected: Decimal,
}

/// Outcome of one audit pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub bills_checked: usize,
    pub drifted: Vec<BillDrift>,
    /// Bills that could not be checked or resynced
    pub failures: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.failures == 0
    }
}

pub struct AccrualAuditor {
    ledger: Arc<dyn LedgerStore>,
    runtime: Arc<AccrualRuntime>,
}

impl AccrualAuditor {
    pub fn new(ledger: Arc<dyn LedgerStore>, runtime: Arc<AccrualRuntime>) -> Self {
        Self { ledger, runtime }
    }

    /// Checks every open bill once and requests a resync for each drifted one
    #[instrument(skip(self))]
    pub async fn audit(&self) -> Result<AuditReport, AccrualError> {
        let bills = self.ledger.list_open_bills().await?;
        let mut report = AuditReport {
            bills_checked: bills.len(),
            ..AuditReport::default()
        };

        for bill in bills {
            let expected = match self.ledger.accrued_total(bill.id).await {
                Ok(total) => total,
                Err(e) => {
                    warn!(bill_id = %bill.id, error = %e, "Could not audit bill");
                    report.failures += 1;
                    continue;
                }
            };
            if expected == bill.total_amount {
                continue;
            }

            warn!(
                bill_id = %bill.id,
                recorded = %bill.total_amount,
                expected = %expected,
                "Bill total drifted from line items"
            );
            if let Err(e) = self.runtime.resync(bill.id).await {
                error!(bill_id = %bill.id, error = %e, "Resync request failed");
                report.failures += 1;
            }
            report.drifted.push(BillDrift {
                bill_id: bill.id,
                recorded: bill.total_amount,
                expected,
            });
        }

        info!(
            checked = report.bills_checked,
            drifted = report.drifted.len(),
            failures = report.failures,
            "Accrual audit finished"
        );
        Ok(report)
    }

    /// Audits immediately, then every `interval` until `shutdown` flips to true
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.audit().await {
                        error!(error = %e, "Accrual audit failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Accrual auditor stopped");
                        break;
                    }
                }
            }
        }
    }
}
