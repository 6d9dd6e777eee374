//! Billing domain errors

use core_kernel::{BillId, LineItemId, PortError, TemporalError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Bill not found
    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    /// Line item not found
    #[error("Line item not found: {0}")]
    LineItemNotFound(LineItemId),

    /// Customer not found
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Currency not found
    #[error("Currency not found: {0}")]
    CurrencyNotFound(String),

    /// Bill is closed and can no longer change
    #[error("Bill is closed: {0}")]
    BillClosed(BillId),

    /// Line item was already removed
    #[error("Line item already removed: {0}")]
    LineItemAlreadyRemoved(LineItemId),

    /// Line item belongs to another bill
    #[error("Line item {line_item_id} does not belong to bill {bill_id}")]
    LineItemBillMismatch {
        line_item_id: LineItemId,
        bill_id: BillId,
    },

    /// Entity already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Request failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying store failure
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    /// Returns true for the not-found family of client errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::BillNotFound(_)
                | BillingError::LineItemNotFound(_)
                | BillingError::CustomerNotFound(_)
                | BillingError::CurrencyNotFound(_)
        )
    }

    /// Returns true for the conflict family of client errors
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::BillClosed(_)
                | BillingError::LineItemAlreadyRemoved(_)
                | BillingError::LineItemBillMismatch { .. }
                | BillingError::AlreadyExists(_)
        )
    }

    /// Returns true if the failure came from the store and may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, BillingError::Store(e) if e.is_transient())
    }
}

impl From<TemporalError> for BillingError {
    fn from(error: TemporalError) -> Self {
        BillingError::Validation(error.to_string())
    }
}

impl From<validator::ValidationErrors> for BillingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BillingError::Validation(errors.to_string())
    }
}
