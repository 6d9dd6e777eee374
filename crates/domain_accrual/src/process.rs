//! Accrual process
//!
//! One `AccrualProcess` runs per bill as a tokio task. It owns three bounded
//! receivers: one per accrual event category and one for control messages.
//! The loop takes exactly one message at a time, so reconciliations of a bill
//! never overlap. When several channels are ready `select!` picks one at
//! random.
//!
//! The loop ends when:
//!
//! - every sender has been dropped (runtime shutdown), after the buffered
//!   messages have been handled
//! - a `Retire` control message arrives
//! - an activity reports the bill as closed or missing
//!
//! In the last two cases the receivers are closed first and everything
//! already queued is handled before the task exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

use core_kernel::BillId;
use domain_billing::{AccrualEvent, LineItemSignal, ProcessKey};

use crate::activities::ReconciliationActivities;
use crate::error::AccrualError;
use crate::retry::ActivityExecutor;

/// Lifecycle messages for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Recompute the bill's total from its line items
    Resync,
    /// Handle whatever is queued, then exit
    Retire,
}

/// Why a process task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Retired,
    BillClosed,
    BillNotFound,
    ChannelsClosed,
}

/// Sending half of a process's channels
#[derive(Debug, Clone)]
pub struct ProcessSender {
    added: mpsc::Sender<LineItemSignal>,
    removed: mpsc::Sender<LineItemSignal>,
    control: mpsc::Sender<ControlMessage>,
}

impl ProcessSender {
    /// Queues an event on the channel for its category
    ///
    /// Waits for capacity when the channel is full. Returns the event back if
    /// the process no longer accepts messages.
    pub async fn send_event(&self, event: AccrualEvent) -> Result<(), AccrualEvent> {
        let sent = match event {
            AccrualEvent::Added(signal) => self.added.send(signal).await,
            AccrualEvent::Removed(signal) => self.removed.send(signal).await,
        };
        sent.map_err(|_| event)
    }

    pub async fn send_control(&self, message: ControlMessage) -> Result<(), ControlMessage> {
        self.control.send(message).await.map_err(|_| message)
    }

    /// Returns true if both senders feed the same process
    pub fn same_process(&self, other: &ProcessSender) -> bool {
        self.control.same_channel(&other.control)
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

/// Handle to a running process
#[derive(Debug)]
pub struct ProcessHandle {
    bill_id: BillId,
    key: ProcessKey,
    sender: ProcessSender,
    task: JoinHandle<ProcessExit>,
}

impl ProcessHandle {
    pub fn bill_id(&self) -> BillId {
        self.bill_id
    }

    pub fn key(&self) -> &ProcessKey {
        &self.key
    }

    pub fn sender(&self) -> ProcessSender {
        self.sender.clone()
    }

    /// Returns true once the process no longer accepts messages
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished() || self.sender.is_closed()
    }

    /// Returns true once the task has returned
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drops this handle's senders and waits for the task to end
    pub async fn join(self) -> Option<ProcessExit> {
        let Self { key, sender, task, .. } = self;
        drop(sender);
        match task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                error!(process_key = %key, error = %e, "Accrual process task failed");
                None
            }
        }
    }
}

enum Step {
    Continue,
    Stop(ProcessExit),
}

/// Event loop for one bill
pub struct AccrualProcess {
    bill_id: BillId,
    activities: Arc<ReconciliationActivities>,
    executor: ActivityExecutor,
    added: mpsc::Receiver<LineItemSignal>,
    removed: mpsc::Receiver<LineItemSignal>,
    control: mpsc::Receiver<ControlMessage>,
}

impl AccrualProcess {
    /// Spawns the process for a bill on the current tokio runtime
    pub fn spawn(
        bill_id: BillId,
        task_queue: &str,
        activities: Arc<ReconciliationActivities>,
        executor: ActivityExecutor,
        capacity: usize,
    ) -> ProcessHandle {
        let capacity = capacity.max(1);
        let (added_tx, added) = mpsc::channel(capacity);
        let (removed_tx, removed) = mpsc::channel(capacity);
        let (control_tx, control) = mpsc::channel(capacity);

        let key = ProcessKey::for_bill(bill_id);
        let process = Self {
            bill_id,
            activities,
            executor,
            added,
            removed,
            control,
        };

        let span = tracing::info_span!("accrual_process", process_key = %key, task_queue = %task_queue);
        let task = tokio::spawn(process.run().instrument(span));

        ProcessHandle {
            bill_id,
            key,
            sender: ProcessSender {
                added: added_tx,
                removed: removed_tx,
                control: control_tx,
            },
            task,
        }
    }

    async fn run(mut self) -> ProcessExit {
        info!("Accrual process started");

        let exit = loop {
            tokio::select! {
                Some(signal) = self.added.recv() => {
                    if let Step::Stop(exit) = self.handle(AccrualEvent::Added(signal)).await {
                        self.drain().await;
                        break exit;
                    }
                }
                Some(signal) = self.removed.recv() => {
                    if let Step::Stop(exit) = self.handle(AccrualEvent::Removed(signal)).await {
                        self.drain().await;
                        break exit;
                    }
                }
                Some(message) = self.control.recv() => match message {
                    ControlMessage::Resync => {
                        if let Step::Stop(exit) = self.resync().await {
                            self.drain().await;
                            break exit;
                        }
                    }
                    ControlMessage::Retire => {
                        self.drain().await;
                        break ProcessExit::Retired;
                    }
                },
                else => break ProcessExit::ChannelsClosed,
            }
        };

        info!(exit = ?exit, "Accrual process stopped");
        exit
    }

    async fn handle(&self, event: AccrualEvent) -> Step {
        let activities = self.activities.clone();
        let result = match event {
            AccrualEvent::Added(signal) => {
                self.executor
                    .execute("apply_addition", move |_| {
                        let activities = activities.clone();
                        async move { activities.apply_addition(signal).await }
                    })
                    .await
            }
            AccrualEvent::Removed(signal) => {
                self.executor
                    .execute("apply_removal", move |_| {
                        let activities = activities.clone();
                        async move { activities.apply_removal(signal).await }
                    })
                    .await
            }
        };

        match result {
            Ok(total) => {
                debug!(
                    channel = event.kind().channel_name(),
                    line_item_id = %event.line_item_id(),
                    total = %total,
                    "Accrual event applied"
                );
                Step::Continue
            }
            Err(e) => {
                error!(
                    channel = event.kind().channel_name(),
                    line_item_id = %event.line_item_id(),
                    error = %e,
                    "Accrual activity failed"
                );
                step_after(&e)
            }
        }
    }

    async fn resync(&self) -> Step {
        let activities = self.activities.clone();
        let bill_id = self.bill_id;
        let result = self
            .executor
            .execute("recompute_total", move |_| {
                let activities = activities.clone();
                async move { activities.recompute_total(bill_id).await }
            })
            .await;

        match result {
            Ok(total) => {
                info!(total = %total, "Bill total resynchronised");
                Step::Continue
            }
            Err(e) => {
                error!(error = %e, "Resync failed");
                step_after(&e)
            }
        }
    }

    /// Stops accepting messages and handles everything already queued
    async fn drain(&mut self) {
        self.added.close();
        self.removed.close();
        self.control.close();

        // A `Stop` from a queued event is not acted on: the receivers are
        // already closed and the loop exits once the queue is empty. Failures
        // were logged by `handle`.
        let mut drained = 0usize;
        while let Ok(signal) = self.added.try_recv() {
            self.handle(AccrualEvent::Added(signal)).await;
            drained += 1;
        }
        while let Ok(signal) = self.removed.try_recv() {
            self.handle(AccrualEvent::Removed(signal)).await;
            drained += 1;
        }
        while let Ok(message) = self.control.try_recv() {
            if message == ControlMessage::Resync {
                self.resync().await;
            }
        }

        if drained > 0 {
            debug!(drained, "Drained queued accrual events");
        }
    }
}

fn step_after(error: &AccrualError) -> Step {
    match error {
        AccrualError::BillClosed(_) => Step::Stop(ProcessExit::BillClosed),
        AccrualError::BillNotFound(_) => Step::Stop(ProcessExit::BillNotFound),
        _ => Step::Continue,
    }
}
