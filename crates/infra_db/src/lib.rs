//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the bookkeeping domain using SQLx.
//!
//! # Architecture
//!
//! - [`repositories`] hold the SQL and row types, bound to one connection
//! - [`adapters`] implement the domain ports and own transactions
//! - [`pool`] opens the connection pool and applies the migrations
//!
//! Row locks (`SELECT ... FOR UPDATE`) on invoices, payments and purchase
//! orders serialize concurrent allocations against the same document.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresLedgerAdapter;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
