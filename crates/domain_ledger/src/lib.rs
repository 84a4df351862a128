//! Ledger Domain - Double-Entry Bookkeeping Core
//!
//! This crate implements the bookkeeping engine of the accounting platform:
//! balanced journal entries, ledger views derived from journal lines,
//! allocation of payments and retentions against invoices, and contact
//! statements.
//!
//! # Double-Entry Accounting Principles
//!
//! Every journal entry carries balanced debits and credits:
//! - Debits increase asset/expense accounts
//! - Credits increase liability/equity/income accounts
//! - The sum of all debits equals the sum of all credits within 0.01
//!
//! Balances are never stored. The general ledger and account ledgers are
//! recomputed from journal lines on every read, and the journal is
//! append-only: corrections are posted as reversing entries.
//!
//! # Layout
//!
//! Pure rules live next to the entities (`journal`, `invoice`, `payment`,
//! `retention`, `statement`). Stores implement [`ports::LedgerPort`] and run
//! those rules inside a single transaction per operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{NewJournalEntry, LedgerPortExt};
//!
//! let entry = NewJournalEntry::new(date, "Cash sale")
//!     .debit(cash_account, amount)
//!     .credit(sales_account, amount);
//!
//! store.create_journal_entry(org, entry).await?;
//! let ledger = store.general_ledger(org).await?;
//! ```

pub mod account;
pub mod adapters;
pub mod config;
pub mod error;
pub mod invoice;
pub mod journal;
pub mod ledger;
pub mod payment;
pub mod ports;
pub mod purchase_order;
pub mod retention;
pub mod statement;

pub use account::{
    Account, AccountType, AccountUpdate, AccountUsage, ChartNode, NewAccount, StandardChart,
    UsageReason, UsageVerdict,
};
pub use config::{AccountRole, AccountingConfig};
pub use error::{LedgerError, LedgerResult};
pub use invoice::{Invoice, InvoiceFlow, InvoiceStatus, NewInvoice};
pub use journal::{JournalEntry, JournalLine, NewJournalEntry, NewJournalLine};
pub use ledger::{AccountActivity, AccountLedger, GeneralLedger, LedgerPosting, LedgerTotals};
pub use payment::{
    AllocationSource, NewAllocation, NewPayment, Payment, PaymentAllocation, PaymentMethod,
    PaymentReceipt, PaymentType,
};
pub use ports::{LedgerPort, LedgerPortExt};
pub use purchase_order::{
    NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus,
};
pub use retention::{
    Certificate, NewRetentionSetting, Retention, RetentionPlan, RetentionRequest, RetentionSetting,
};
pub use statement::{ContactStatement, StatementSummary, TimelineEntry, TimelineKind};
