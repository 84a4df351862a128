//! Ledger Port
//!
//! The port trait every ledger store implements. Operations take the
//! organization id explicitly; rows belonging to another organization are
//! reported as not found.
//!
//! Each mutating operation is atomic: either every row it writes is
//! persisted or none is.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::ports::{LedgerPort, LedgerPortExt};
//!
//! async fn post_sale(port: &dyn LedgerPort, org: OrganizationId) -> LedgerResult<()> {
//!     let entry = NewJournalEntry::new(today, "Cash sale")
//!         .debit(cash, amount)
//!         .credit(sales, amount);
//!     port.create_journal_entry(org, entry).await?;
//!     let ledger = port.general_ledger(org).await?;
//!     assert!(ledger.totals.is_balanced());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    AccountId, ContactId, DomainPort, InvoiceId, JournalEntryId, Money, OrganizationId,
    PaymentId, PurchaseOrderId,
};

use crate::account::{
    build_chart, Account, AccountUpdate, AccountUsage, ChartNode, NewAccount, UsageVerdict,
};
use crate::config::AccountingConfig;
use crate::error::LedgerResult;
use crate::invoice::{Invoice, NewInvoice};
use crate::journal::{JournalEntry, NewJournalEntry};
use crate::ledger::{AccountActivity, AccountLedger, GeneralLedger, LedgerPosting};
use crate::payment::{AllocationSource, NewPayment, Payment, PaymentAllocation, PaymentReceipt};
use crate::purchase_order::{NewPurchaseOrder, PurchaseOrder};
use crate::retention::{NewRetentionSetting, Retention, RetentionRequest, RetentionSetting};
use crate::statement::{build_statement, ContactStatement, StatementSources};

/// Port for bookkeeping persistence and the operations that need it
#[async_trait]
pub trait LedgerPort: DomainPort {
    // ------------------------------------------------------------------
    // Account registry
    // ------------------------------------------------------------------

    /// Creates an account; the code must be unique within the organization
    async fn create_account(
        &self,
        org: OrganizationId,
        account: NewAccount,
    ) -> LedgerResult<Account>;

    async fn get_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<Account>;

    /// Lists the organization's accounts ordered by code
    async fn list_accounts(&self, org: OrganizationId) -> LedgerResult<Vec<Account>>;

    /// Applies a partial update; code and type are frozen while in use
    async fn update_account(
        &self,
        org: OrganizationId,
        id: AccountId,
        update: AccountUpdate,
    ) -> LedgerResult<Account>;

    /// Deletes an account that is not in use
    async fn delete_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<()>;

    /// Everything that references the account
    async fn account_usage(&self, org: OrganizationId, id: AccountId) -> LedgerResult<AccountUsage>;

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    async fn get_accounting_config(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Option<AccountingConfig>>;

    /// Inserts or replaces the organization's configuration
    async fn save_accounting_config(
        &self,
        org: OrganizationId,
        config: AccountingConfig,
    ) -> LedgerResult<AccountingConfig>;

    async fn create_retention_setting(
        &self,
        org: OrganizationId,
        setting: NewRetentionSetting,
    ) -> LedgerResult<RetentionSetting>;

    async fn list_retention_settings(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Vec<RetentionSetting>>;

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    /// Validates and persists a balanced entry with all its lines
    async fn create_journal_entry(
        &self,
        org: OrganizationId,
        entry: NewJournalEntry,
    ) -> LedgerResult<JournalEntry>;

    async fn get_journal_entry(
        &self,
        org: OrganizationId,
        id: JournalEntryId,
    ) -> LedgerResult<JournalEntry>;

    /// Lists entries ordered by date, then creation
    async fn list_journal_entries(&self, org: OrganizationId) -> LedgerResult<Vec<JournalEntry>>;

    /// Debit and credit totals for every account of the organization
    async fn account_activity(&self, org: OrganizationId) -> LedgerResult<Vec<AccountActivity>>;

    /// Lines posted to one account
    async fn account_postings(
        &self,
        org: OrganizationId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerPosting>>;

    // ------------------------------------------------------------------
    // Invoices, payments and allocations
    // ------------------------------------------------------------------

    /// Persists an invoice with nothing allocated, registering it on its
    /// purchase order when it has one
    async fn create_invoice(
        &self,
        org: OrganizationId,
        invoice: NewInvoice,
    ) -> LedgerResult<Invoice>;

    async fn get_invoice(&self, org: OrganizationId, id: InvoiceId) -> LedgerResult<Invoice>;

    /// Applies `amount` from `source` to the invoice under a row lock
    async fn apply_allocation(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
        amount: Money,
        source: AllocationSource,
        notes: Option<String>,
    ) -> LedgerResult<Invoice>;

    async fn list_allocations(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<PaymentAllocation>>;

    /// Persists a payment and all its allocations together
    async fn record_payment(
        &self,
        org: OrganizationId,
        payment: NewPayment,
    ) -> LedgerResult<PaymentReceipt>;

    async fn get_payment(&self, org: OrganizationId, id: PaymentId) -> LedgerResult<Payment>;

    // ------------------------------------------------------------------
    // Retentions
    // ------------------------------------------------------------------

    /// Records a retention with its journal entry and allocation, all or nothing
    async fn record_retention(
        &self,
        org: OrganizationId,
        request: RetentionRequest,
    ) -> LedgerResult<Retention>;

    async fn list_retentions(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<Retention>>;

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Loads the rows a contact statement is built from
    async fn statement_sources(
        &self,
        org: OrganizationId,
        contact_id: ContactId,
    ) -> LedgerResult<StatementSources>;

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    async fn create_purchase_order(
        &self,
        org: OrganizationId,
        order: NewPurchaseOrder,
    ) -> LedgerResult<PurchaseOrder>;

    async fn get_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder>;

    async fn approve_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder>;

    async fn reject_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder>;
}

/// Extension trait for LedgerPort with derived views
#[async_trait]
pub trait LedgerPortExt: LedgerPort {
    /// Per-account debit, credit and balance plus totals, recomputed on each call
    async fn general_ledger(&self, org: OrganizationId) -> LedgerResult<GeneralLedger> {
        Ok(GeneralLedger::from_activity(self.account_activity(org).await?))
    }

    /// One account's postings with a running balance
    async fn account_ledger(
        &self,
        org: OrganizationId,
        account_id: AccountId,
    ) -> LedgerResult<AccountLedger> {
        let account = self.get_account(org, account_id).await?;
        let postings = self.account_postings(org, account_id).await?;
        Ok(AccountLedger::build(account, postings))
    }

    async fn contact_statement(
        &self,
        org: OrganizationId,
        contact_id: ContactId,
    ) -> LedgerResult<ContactStatement> {
        let sources = self.statement_sources(org, contact_id).await?;
        Ok(build_statement(contact_id, sources))
    }

    async fn is_account_in_use(
        &self,
        org: OrganizationId,
        account_id: AccountId,
    ) -> LedgerResult<UsageVerdict> {
        Ok(self.account_usage(org, account_id).await?.verdict())
    }

    async fn chart_of_accounts(&self, org: OrganizationId) -> LedgerResult<Vec<ChartNode>> {
        Ok(build_chart(self.list_accounts(org).await?))
    }

    /// Posts the offsetting entry of `entry_id`; the original stays untouched
    async fn reverse_journal_entry(
        &self,
        org: OrganizationId,
        entry_id: JournalEntryId,
        date: NaiveDate,
        reason: &str,
    ) -> LedgerResult<JournalEntry> {
        let original = self.get_journal_entry(org, entry_id).await?;
        self.create_journal_entry(org, original.reversal(date, reason)).await
    }
}

// Blanket implementation for all LedgerPort implementors
impl<T: LedgerPort + ?Sized> LedgerPortExt for T {}
