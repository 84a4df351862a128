//! HTTP request handlers
//!
//! Each handler resolves the caller's organization through [`crate::auth::Tenant`],
//! checks the permission the route needs and delegates to the ledger port.

pub mod accounts;
pub mod health;
pub mod invoices;
pub mod journal;
pub mod payments;
pub mod purchase_orders;
pub mod statements;
