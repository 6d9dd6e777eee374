//! Worker wiring
//!
//! Builds the command services over the storage ports, hosts the accrual
//! runtime they signal, and runs the periodic auditor.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use domain_accrual::{AccrualAuditor, AccrualConfig, AccrualError, AccrualRuntime};
use domain_billing::{
    BillService, CurrencyPort, CurrencyService, CustomerPort, CustomerService, LedgerStore,
};
use infra_db::{DatabasePool, PostgresDirectory, PostgresLedgerStore};

struct AuditorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A running billing worker
pub struct Worker {
    config: AccrualConfig,
    ledger: Arc<dyn LedgerStore>,
    runtime: Arc<AccrualRuntime>,
    bills: BillService,
    customers: CustomerService,
    currencies: CurrencyService,
    auditor: Option<AuditorTask>,
}

impl Worker {
    /// Wires the services and the accrual runtime over the given ports
    pub fn new(
        config: AccrualConfig,
        ledger: Arc<dyn LedgerStore>,
        customers: Arc<dyn CustomerPort>,
        currencies: Arc<dyn CurrencyPort>,
    ) -> Self {
        let runtime = Arc::new(AccrualRuntime::new(ledger.clone(), config.clone()));
        let bills = BillService::new(
            ledger.clone(),
            customers.clone(),
            currencies.clone(),
            runtime.clone(),
        );

        Self {
            config,
            ledger,
            runtime,
            bills,
            customers: CustomerService::new(customers),
            currencies: CurrencyService::new(currencies),
            auditor: None,
        }
    }

    /// Wires the worker over the PostgreSQL adapters
    pub fn postgres(config: AccrualConfig, pool: DatabasePool) -> Self {
        let directory = Arc::new(PostgresDirectory::new(pool.clone()));
        Self::new(
            config,
            Arc::new(PostgresLedgerStore::new(pool)),
            directory.clone(),
            directory,
        )
    }

    pub fn bills(&self) -> &BillService {
        &self.bills
    }

    pub fn customers(&self) -> &CustomerService {
        &self.customers
    }

    pub fn currencies(&self) -> &CurrencyService {
        &self.currencies
    }

    pub fn runtime(&self) -> &Arc<AccrualRuntime> {
        &self.runtime
    }

    /// Resumes processes for open bills and starts the auditor
    ///
    /// The auditor's first pass runs immediately, repairing totals that
    /// drifted while no worker was running.
    ///
    /// # Returns
    ///
    /// The number of open bills recovered
    pub async fn start(&mut self) -> Result<usize, AccrualError> {
        let recovered = self.runtime.recover_open_bills().await?;

        if self.auditor.is_none() {
            let (shutdown, receiver) = watch::channel(false);
            let auditor = AccrualAuditor::new(self.ledger.clone(), self.runtime.clone());
            let handle = tokio::spawn(auditor.run(self.config.audit_interval(), receiver));
            self.auditor = Some(AuditorTask { shutdown, handle });
        }

        info!(
            recovered,
            task_queue = %self.config.task_queue,
            audit_interval_secs = self.config.audit_interval_secs,
            "Billing worker started"
        );
        Ok(recovered)
    }

    /// Stops the auditor, then drains and stops every accrual process
    pub async fn shutdown(mut self) {
        if let Some(auditor) = self.auditor.take() {
            // Err means the auditor already exited
            let _ = auditor.shutdown.send(true);
            if let Err(e) = auditor.handle.await {
                warn!(error = %e, "Accrual auditor task failed");
            }
        }

        self.runtime.shutdown().await;
        info!("Billing worker stopped");
    }
}
