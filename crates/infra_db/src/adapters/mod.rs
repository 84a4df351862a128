//! Domain Adapters
//!
//! Implementations of the domain ports on PostgreSQL. Each adapter
//! translates between domain models and the row types of
//! [`crate::repositories`] and owns the transaction boundaries.
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_ledger::LedgerPort;
//!
//! let adapter = PostgresLedgerAdapter::new(pool);
//! let invoice = adapter.get_invoice(org, invoice_id).await?;
//! ```

pub mod ledger;

pub use ledger::PostgresLedgerAdapter;
