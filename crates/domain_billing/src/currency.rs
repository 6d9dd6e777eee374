//! Currencies bills are denominated in
//!
//! Currencies are reference records rather than a closed enum: operators can
//! register new ones at runtime and bills refer to them by ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::CurrencyId;

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    /// ISO 4217 code, unique
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a currency
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCurrencyRequest {
    #[validate(length(equal = 3))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 8))]
    pub symbol: String,
}

impl CreateCurrencyRequest {
    /// Validates the request and builds the currency record
    pub fn into_currency(self) -> Result<Currency, BillingError> {
        self.validate()?;
        let code = normalize_code(&self.code)?;
        let now = Utc::now();
        Ok(Currency {
            id: CurrencyId::new_v7(),
            code,
            name: self.name,
            symbol: self.symbol,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Upper-cases a currency code and checks it is three ASCII letters
pub fn normalize_code(code: &str) -> Result<String, BillingError> {
    let trimmed = code.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(BillingError::validation(format!(
            "currency code must be three letters, got '{}'",
            code
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}
