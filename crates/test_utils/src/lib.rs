//! Test Utilities Crate
//!
//! Shared test infrastructure for the ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built amounts and dates, and seeded books for any store
//! - `builders`: Builders for invoice, payment and purchase order requests
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Assertion helpers for ledger types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
