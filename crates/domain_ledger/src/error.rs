//! Ledger domain errors

use thiserror::Error;

use core_kernel::{
    AccountId, ErrorKind, InvoiceId, JournalEntryId, Money, PaymentId, PurchaseOrderId,
    RetentionId, RetentionSettingId,
};

use crate::account::UsageReason;
use crate::invoice::InvoiceFlow;

/// Result alias used throughout the ledger domain
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Journal entry debits and credits differ by more than the tolerance
    #[error("Unbalanced journal entry: debits={debits}, credits={credits}")]
    UnbalancedEntry { debits: Money, credits: Money },

    /// Journal entry without lines
    #[error("Journal entry has no lines")]
    EmptyEntry,

    /// A journal line carries a negative debit or credit
    #[error("Journal line {position} has a negative amount")]
    NegativeLineAmount { position: usize },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Allocation larger than the invoice's remaining balance
    #[error("Allocation of {requested} exceeds remaining balance {remaining}")]
    AllocationExceedsBalance { requested: Money, remaining: Money },

    /// Allocations of a payment add up to more than the payment itself
    #[error("Allocations total {allocated} exceeds payment amount {amount}")]
    AllocationExceedsPayment { allocated: Money, amount: Money },

    /// Retention larger than the invoice's remaining balance
    #[error("Retention of {requested} exceeds remaining balance {remaining}")]
    ExceedsRemaining { requested: Money, remaining: Money },

    /// Invoice total larger than what is left to invoice on the order
    #[error("Invoice total {requested} exceeds remaining order amount {remaining}")]
    ExceedsOrderRemaining { requested: Money, remaining: Money },

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    #[error("Invoice {0} has no contact")]
    ContactRequired(InvoiceId),

    #[error("Accounting configuration missing for organization")]
    ConfigMissing,

    #[error("Retention setting not found: {0}")]
    SettingNotFound(RetentionSettingId),

    /// Retention setting restricted to the other invoice flow
    #[error("Retention setting applies to {setting} invoices, invoice is {invoice}")]
    FlowMismatch { setting: InvoiceFlow, invoice: InvoiceFlow },

    #[error("No rate given and retention setting {0} has no default rate")]
    NoRate(RetentionSettingId),

    #[error("Retention accounts are not configured for {flow} invoices")]
    AccountsNotConfigured { flow: InvoiceFlow },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account {account_id} is in use: {reason}")]
    AccountInUse { account_id: AccountId, reason: UsageReason },

    /// Re-parenting would make an account its own ancestor
    #[error("Moving account {0} under the requested parent would create a cycle")]
    AccountCycle(AccountId),

    #[error("Account code already exists: {0}")]
    DuplicateAccountCode(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Retention not found: {0}")]
    RetentionNotFound(RetentionId),

    #[error("Retention {0} already has an allocation")]
    RetentionAlreadyAllocated(RetentionId),

    #[error("Retention {retention} belongs to invoice {expected}, not {invoice}")]
    RetentionInvoiceMismatch {
        retention: RetentionId,
        expected: InvoiceId,
        invoice: InvoiceId,
    },

    #[error("Journal entry not found: {0}")]
    JournalEntryNotFound(JournalEntryId),

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(PurchaseOrderId),

    #[error("Purchase order {0} is not approved or has nothing left to invoice")]
    PurchaseOrderNotInvoiceable(PurchaseOrderId),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Wraps a storage failure
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage(message.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        LedgerError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::UnbalancedEntry { .. }
            | LedgerError::EmptyEntry
            | LedgerError::NegativeLineAmount { .. }
            | LedgerError::NonPositiveAmount(_)
            | LedgerError::MissingField(_)
            | LedgerError::ContactRequired(_)
            | LedgerError::FlowMismatch { .. }
            | LedgerError::NoRate(_)
            | LedgerError::AccountCycle(_) => ErrorKind::Validation,

            LedgerError::InvoiceNotFound(_)
            | LedgerError::SettingNotFound(_)
            | LedgerError::AccountNotFound(_)
            | LedgerError::PaymentNotFound(_)
            | LedgerError::RetentionNotFound(_)
            | LedgerError::JournalEntryNotFound(_)
            | LedgerError::PurchaseOrderNotFound(_) => ErrorKind::NotFound,

            LedgerError::AllocationExceedsBalance { .. }
            | LedgerError::AllocationExceedsPayment { .. }
            | LedgerError::ExceedsRemaining { .. }
            | LedgerError::ExceedsOrderRemaining { .. }
            | LedgerError::DuplicateAccountCode(_)
            | LedgerError::RetentionAlreadyAllocated(_)
            | LedgerError::RetentionInvoiceMismatch { .. } => ErrorKind::Conflict,

            LedgerError::ConfigMissing | LedgerError::AccountsNotConfigured { .. } => {
                ErrorKind::Configuration
            }

            LedgerError::AccountInUse { .. }
            | LedgerError::PurchaseOrderNotInvoiceable(_)
            | LedgerError::InvalidStateTransition { .. } => ErrorKind::State,

            LedgerError::Storage(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable machine-readable code, also the message id for localized text
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UnbalancedEntry { .. } => "unbalanced-entry",
            LedgerError::EmptyEntry => "empty-entry",
            LedgerError::NegativeLineAmount { .. } => "negative-line-amount",
            LedgerError::NonPositiveAmount(_) => "non-positive-amount",
            LedgerError::MissingField(_) => "missing-field",
            LedgerError::AllocationExceedsBalance { .. } => "allocation-exceeds-balance",
            LedgerError::AllocationExceedsPayment { .. } => "allocation-exceeds-payment",
            LedgerError::ExceedsRemaining { .. } => "exceeds-remaining",
            LedgerError::ExceedsOrderRemaining { .. } => "exceeds-order-remaining",
            LedgerError::InvoiceNotFound(_) => "invoice-not-found",
            LedgerError::ContactRequired(_) => "contact-required",
            LedgerError::ConfigMissing => "config-missing",
            LedgerError::SettingNotFound(_) => "setting-not-found",
            LedgerError::FlowMismatch { .. } => "flow-mismatch",
            LedgerError::NoRate(_) => "no-rate",
            LedgerError::AccountsNotConfigured { .. } => "accounts-not-configured",
            LedgerError::AccountNotFound(_) => "account-not-found",
            LedgerError::AccountInUse { .. } => "account-in-use",
            LedgerError::AccountCycle(_) => "account-cycle",
            LedgerError::DuplicateAccountCode(_) => "duplicate-account-code",
            LedgerError::PaymentNotFound(_) => "payment-not-found",
            LedgerError::RetentionNotFound(_) => "retention-not-found",
            LedgerError::RetentionAlreadyAllocated(_) => "retention-already-allocated",
            LedgerError::RetentionInvoiceMismatch { .. } => "retention-invoice-mismatch",
            LedgerError::JournalEntryNotFound(_) => "journal-entry-not-found",
            LedgerError::PurchaseOrderNotFound(_) => "purchase-order-not-found",
            LedgerError::PurchaseOrderNotInvoiceable(_) => "purchase-order-not-invoiceable",
            LedgerError::InvalidStateTransition { .. } => "invalid-state-transition",
            LedgerError::Storage(_) => "storage",
        }
    }
}
