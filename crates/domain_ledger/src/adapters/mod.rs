//! Ledger store adapters that live with the domain
//!
//! The PostgreSQL store lives in `infra_db`.

#[cfg(any(test, feature = "memory"))]
pub mod memory;

#[cfg(any(test, feature = "memory"))]
pub use memory::InMemoryLedgerStore;
