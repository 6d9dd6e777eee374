//! Core Kernel - Foundational types and utilities for the billing service
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Strongly-typed identifiers for bills, line items, customers and currencies
//! - Billing period types with start/end validation
//! - Port error types and marker traits for the hexagonal architecture

pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use temporal::{BillingPeriod, TemporalError};
pub use identifiers::{BillId, LineItemId, CustomerId, CurrencyId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
