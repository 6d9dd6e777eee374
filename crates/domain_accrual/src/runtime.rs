//! Accrual runtime
//!
//! Hosts one `AccrualProcess` per bill and routes events to it by bill ID.
//! The runtime is constructed once at startup and shared as
//! `Arc<dyn AccrualSignaler>` with the command side.
//!
//! Addressing a bill that has no live process spawns one first
//! (signal-with-start). This covers bills created before a restart, bills
//! whose start request was lost, and processes that retired.
//!
//! Entries of finished tasks are pruned from the registry whenever it is
//! locked, so its size follows the number of live bills.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use core_kernel::{BillId, DomainPort, PortError};
use domain_billing::{AccrualEvent, AccrualSignaler, Bill, LedgerStore};

use crate::activities::ReconciliationActivities;
use crate::config::AccrualConfig;
use crate::error::AccrualError;
use crate::process::{AccrualProcess, ControlMessage, ProcessHandle, ProcessSender};
use crate::retry::ActivityExecutor;

/// Registry and router for accrual processes
pub struct AccrualRuntime {
    config: AccrualConfig,
    ledger: Arc<dyn LedgerStore>,
    activities: Arc<ReconciliationActivities>,
    executor: ActivityExecutor,
    processes: Mutex<HashMap<BillId, ProcessHandle>>,
    accepting: AtomicBool,
}

impl AccrualRuntime {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: AccrualConfig) -> Self {
        let activities = Arc::new(ReconciliationActivities::new(ledger.clone()));
        let executor = ActivityExecutor::new(config.activity.clone());
        Self {
            config,
            ledger,
            activities,
            executor,
            processes: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    /// Returns the sender of the bill's live process, spawning one if needed
    async fn ensure_process(&self, bill_id: BillId) -> Result<ProcessSender, AccrualError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(AccrualError::ProcessUnavailable(format!(
                "runtime on {} is shut down",
                self.config.task_queue
            )));
        }

        let mut processes = self.processes.lock().await;
        prune_finished(&mut processes);
        if let Some(handle) = processes.get(&bill_id) {
            if !handle.is_stopped() {
                return Ok(handle.sender());
            }
        }

        let handle = self.spawn(bill_id);
        let sender = handle.sender();
        if let Some(stale) = processes.insert(bill_id, handle) {
            debug!(process_key = %stale.key(), "Replaced stopped accrual process");
            // Let the stale task finish draining in the background
            tokio::spawn(stale.join());
        }
        Ok(sender)
    }

    fn spawn(&self, bill_id: BillId) -> ProcessHandle {
        AccrualProcess::spawn(
            bill_id,
            &self.config.task_queue,
            self.activities.clone(),
            self.executor.clone(),
            self.config.channel_capacity,
        )
    }

    /// Drops a registry entry if it still points at the given process
    async fn forget(&self, bill_id: BillId, sender: &ProcessSender) {
        let mut processes = self.processes.lock().await;
        let matches = processes
            .get(&bill_id)
            .map(|handle| handle.sender().same_process(sender))
            .unwrap_or(false);
        if matches {
            if let Some(stale) = processes.remove(&bill_id) {
                tokio::spawn(stale.join());
            }
        }
    }

    /// Delivers an event to its bill's process
    ///
    /// If the process retires between lookup and send, a fresh process is
    /// started and the send is attempted once more.
    #[instrument(skip(self), fields(process_key = %event.process_key(), channel = event.kind().channel_name()))]
    pub async fn deliver(&self, event: AccrualEvent) -> Result<(), AccrualError> {
        let bill_id = event.bill_id();
        let sender = self.ensure_process(bill_id).await?;
        let event = match sender.send_event(event).await {
            Ok(()) => return Ok(()),
            Err(event) => event,
        };

        self.forget(bill_id, &sender).await;
        let sender = self.ensure_process(bill_id).await?;
        sender.send_event(event).await.map_err(|_| {
            AccrualError::ProcessUnavailable(format!("process for bill {} rejected event", bill_id))
        })
    }

    /// Asks the bill's process to recompute its total
    pub async fn resync(&self, bill_id: BillId) -> Result<(), AccrualError> {
        let sender = self.ensure_process(bill_id).await?;
        if sender.send_control(ControlMessage::Resync).await.is_ok() {
            return Ok(());
        }

        self.forget(bill_id, &sender).await;
        let sender = self.ensure_process(bill_id).await?;
        sender
            .send_control(ControlMessage::Resync)
            .await
            .map_err(|_| AccrualError::ProcessUnavailable(format!("process for bill {} rejected resync", bill_id)))
    }

    /// Asks the bill's process to drain its queue and exit
    ///
    /// Does nothing if no process is running.
    pub async fn retire(&self, bill_id: BillId) -> Result<(), AccrualError> {
        let sender = {
            let mut processes = self.processes.lock().await;
            prune_finished(&mut processes);
            match processes.get(&bill_id) {
                Some(handle) if !handle.is_stopped() => handle.sender(),
                _ => return Ok(()),
            }
        };

        if sender.send_control(ControlMessage::Retire).await.is_err() {
            debug!(bill_id = %bill_id, "Accrual process already stopped");
        }
        Ok(())
    }

    /// Starts a process for every open bill
    ///
    /// Run at startup so processes lost with the previous worker resume
    /// before any new events arrive.
    #[instrument(skip(self))]
    pub async fn recover_open_bills(&self) -> Result<usize, AccrualError> {
        let bills = self.ledger.list_open_bills().await?;
        for bill in &bills {
            self.ensure_process(bill.id).await?;
        }
        info!(count = bills.len(), "Recovered accrual processes for open bills");
        Ok(bills.len())
    }

    /// Returns true if the bill has a process that accepts messages
    pub async fn is_running(&self, bill_id: BillId) -> bool {
        self.processes
            .lock()
            .await
            .get(&bill_id)
            .map(|handle| !handle.is_stopped())
            .unwrap_or(false)
    }

    /// Number of processes that accept messages
    pub async fn live_processes(&self) -> usize {
        let mut processes = self.processes.lock().await;
        prune_finished(&mut processes);
        processes.values().filter(|handle| !handle.is_stopped()).count()
    }

    /// Number of registry entries, including processes still draining
    pub async fn registered_processes(&self) -> usize {
        let mut processes = self.processes.lock().await;
        prune_finished(&mut processes);
        processes.len()
    }

    /// Stops accepting events, closes every channel and waits for all
    /// processes to handle what is already queued
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let handles: Vec<ProcessHandle> = {
            let mut processes = self.processes.lock().await;
            processes.drain().map(|(_, handle)| handle).collect()
        };

        info!(count = handles.len(), "Shutting down accrual processes");
        for handle in handles {
            handle.join().await;
        }
        info!("Accrual runtime stopped");
    }
}

/// Removes the entries of tasks that have returned
fn prune_finished(processes: &mut HashMap<BillId, ProcessHandle>) {
    let before = processes.len();
    processes.retain(|_, handle| !handle.is_finished());
    let pruned = before - processes.len();
    if pruned > 0 {
        debug!(pruned, remaining = processes.len(), "Pruned finished accrual processes");
    }
}

impl DomainPort for AccrualRuntime {}

#[async_trait]
impl AccrualSignaler for AccrualRuntime {
    async fn start_process(&self, bill: &Bill) -> Result<(), PortError> {
        self.ensure_process(bill.id).await?;
        info!(
            process_key = %domain_billing::ProcessKey::for_bill(bill.id),
            task_queue = %self.config.task_queue,
            "Accrual process ready"
        );
        Ok(())
    }

    async fn signal(&self, event: AccrualEvent) -> Result<(), PortError> {
        self.deliver(event).await.map_err(|e| {
            warn!(process_key = %event.process_key(), error = %e, "Accrual delivery failed");
            PortError::from(e)
        })
    }

    async fn retire_process(&self, bill_id: BillId) -> Result<(), PortError> {
        Ok(self.retire(bill_id).await?)
    }
}
