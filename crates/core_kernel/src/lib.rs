//! Core Kernel - Foundational types and utilities for the bookkeeping system
//!
//! This crate provides the fundamental building blocks used across the workspace:
//! - Money and rate types with precise decimal arithmetic and the shared
//!   currency tolerance
//! - Strongly-typed identifiers for every ledger entity
//! - The error taxonomy every layer maps its failures onto
//! - Port markers shared by the ledger adapters

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Rate, MoneyError, TOLERANCE};
pub use identifiers::{
    OrganizationId, AccountId, JournalEntryId, JournalLineId, InvoiceId,
    PaymentId, AllocationId, RetentionId, RetentionSettingId, ContactId,
    PurchaseOrderId, PurchaseOrderItemId, UserId,
};
pub use error::{CoreError, ErrorKind};
pub use ports::{
    DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth, OperationMetadata,
};
