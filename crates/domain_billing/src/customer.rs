//! Customers that bills are raised against

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::CustomerId;

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Request to register a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
}

impl CreateCustomerRequest {
    /// Validates the request and builds the customer record
    pub fn into_customer(self) -> Result<Customer, BillingError> {
        self.validate()?;
        let now = Utc::now();
        Ok(Customer {
            id: CustomerId::new_v7(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email.to_lowercase(),
            created_at: now,
            updated_at: now,
        })
    }
}
