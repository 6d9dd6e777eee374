//! Accrual errors

use core_kernel::{BillId, LineItemId, PortError};
use thiserror::Error;

/// Errors raised by reconciliation activities and the accrual runtime
#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    #[error("Already-closed bill cannot be updated: {0}")]
    BillClosed(BillId),

    #[error("Line item not found: {0}")]
    LineItemNotFound(LineItemId),

    #[error("Line item {line_item_id} does not belong to bill {bill_id}")]
    LineItemMismatch {
        line_item_id: LineItemId,
        bill_id: BillId,
    },

    /// A single attempt ran past its start-to-close timeout
    #[error("Activity {activity} timed out after {timeout_ms}ms")]
    Timeout {
        activity: &'static str,
        timeout_ms: u64,
    },

    /// The runtime is shut down or the process could not be reached
    #[error("Accrual process unavailable: {0}")]
    ProcessUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl AccrualError {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AccrualError::Timeout { .. } => true,
            AccrualError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Maps a store not-found onto the given error, keeping everything else
    pub(crate) fn or_not_found(error: PortError, not_found: AccrualError) -> AccrualError {
        if error.is_not_found() {
            not_found
        } else {
            AccrualError::Store(error)
        }
    }
}

impl From<AccrualError> for PortError {
    fn from(error: AccrualError) -> Self {
        match error {
            AccrualError::Store(e) => e,
            AccrualError::ProcessUnavailable(_) => PortError::ServiceUnavailable {
                service: "accrual-runtime".to_string(),
            },
            AccrualError::BillNotFound(id) => PortError::not_found("Bill", id),
            AccrualError::LineItemNotFound(id) => PortError::not_found("LineItem", id),
            AccrualError::Timeout {
                activity,
                timeout_ms,
            } => PortError::Timeout {
                operation: activity.to_string(),
                duration_ms: timeout_ms,
            },
            other => PortError::conflict(other.to_string()),
        }
    }
}
