//! Accrual events
//!
//! Accrual events are the messages the command side sends to a bill's
//! accrual process after a line item has been durably added or removed.
//! They are transient: nothing persists them, and the receiving side must
//! tolerate duplicates and reordering.

use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BillId, LineItemId};

/// Channel carrying `Added` events
pub const ADD_ITEM_CHANNEL: &str = "ADD_BILL_ITEM_CHANNEL";

/// Channel carrying `Removed` events
pub const REMOVE_ITEM_CHANNEL: &str = "REMOVE_BILL_ITEM_CHANNEL";

/// Prefix of every accrual process key
pub const PROCESS_KEY_PREFIX: &str = "BILL";

/// Payload shared by both event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemSignal {
    pub bill_id: BillId,
    pub line_item_id: LineItemId,
}

impl LineItemSignal {
    pub fn new(bill_id: BillId, line_item_id: LineItemId) -> Self {
        Self { bill_id, line_item_id }
    }
}

/// Which of the two event categories an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualEventKind {
    Added,
    Removed,
}

impl AccrualEventKind {
    /// Name of the channel events of this kind travel on
    pub fn channel_name(&self) -> &'static str {
        match self {
            AccrualEventKind::Added => ADD_ITEM_CHANNEL,
            AccrualEventKind::Removed => REMOVE_ITEM_CHANNEL,
        }
    }
}

/// A line item was added to or removed from a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "signal", rename_all = "snake_case")]
pub enum AccrualEvent {
    Added(LineItemSignal),
    Removed(LineItemSignal),
}

impl AccrualEvent {
    pub fn added(bill_id: BillId, line_item_id: LineItemId) -> Self {
        AccrualEvent::Added(LineItemSignal::new(bill_id, line_item_id))
    }

    pub fn removed(bill_id: BillId, line_item_id: LineItemId) -> Self {
        AccrualEvent::Removed(LineItemSignal::new(bill_id, line_item_id))
    }

    pub fn kind(&self) -> AccrualEventKind {
        match self {
            AccrualEvent::Added(_) => AccrualEventKind::Added,
            AccrualEvent::Removed(_) => AccrualEventKind::Removed,
        }
    }

    pub fn signal(&self) -> &LineItemSignal {
        match self {
            AccrualEvent::Added(signal) | AccrualEvent::Removed(signal) => signal,
        }
    }

    pub fn bill_id(&self) -> BillId {
        self.signal().bill_id
    }

    pub fn line_item_id(&self) -> LineItemId {
        self.signal().line_item_id
    }

    /// Key of the process instance this event is addressed to
    pub fn process_key(&self) -> ProcessKey {
        ProcessKey::for_bill(self.bill_id())
    }
}

/// Address of a bill's accrual process instance
///
/// The key is derived deterministically from the bill ID as
/// `BILL-<uuid>`, so any component can address a process without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessKey(String);

impl ProcessKey {
    pub fn for_bill(bill_id: BillId) -> Self {
        Self(format!("{}-{}", PROCESS_KEY_PREFIX, bill_id.as_uuid()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
