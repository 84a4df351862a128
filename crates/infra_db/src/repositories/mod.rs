//! Repository implementations
//!
//! Repositories hold the SQL and the row types; adapters in
//! [`crate::adapters`] wrap them behind the domain ports.

pub mod ledger;

pub use ledger::LedgerRepository;
