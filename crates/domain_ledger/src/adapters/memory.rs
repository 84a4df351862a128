//! In-memory ledger store
//!
//! Keeps every organization's rows in one process-local state guarded by a
//! mutex. Writers work on a copy of the state and swap it in only when the
//! whole operation succeeded, so a failed operation leaves nothing behind.
//! Useful for tests and for running the API without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use core_kernel::{
    AccountId, ContactId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId,
    JournalEntryId, Money, OrganizationId, PaymentId, PurchaseOrderId, RetentionId,
    RetentionSettingId,
};

use crate::account::{apply_account_update, Account, AccountUpdate, AccountUsage, NewAccount};
use crate::config::AccountingConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::invoice::{Invoice, NewInvoice};
use crate::journal::{JournalEntry, NewJournalEntry};
use crate::ledger::{aggregate, postings_for, AccountActivity, LedgerPosting};
use crate::payment::{
    plan_payment, AllocationSource, NewPayment, Payment, PaymentAllocation, PaymentReceipt,
};
use crate::ports::LedgerPort;
use crate::purchase_order::{NewPurchaseOrder, PurchaseOrder};
use crate::retention::{
    plan_retention, NewRetentionSetting, Retention, RetentionRequest, RetentionSetting,
};
use crate::statement::StatementSources;

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    configs: HashMap<OrganizationId, AccountingConfig>,
    settings: HashMap<RetentionSettingId, RetentionSetting>,
    entries: Vec<JournalEntry>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    allocations: Vec<PaymentAllocation>,
    retentions: HashMap<RetentionId, Retention>,
    purchase_orders: HashMap<PurchaseOrderId, PurchaseOrder>,
}

impl LedgerState {
    fn account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<&Account> {
        self.accounts
            .get(&id)
            .filter(|a| a.organization_id == org)
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn org_accounts(&self, org: OrganizationId) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .values()
            .filter(|a| a.organization_id == org)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    fn org_entries(&self, org: OrganizationId) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(move |e| e.organization_id == org)
    }

    fn invoice(&self, org: OrganizationId, id: InvoiceId) -> Option<&Invoice> {
        self.invoices.get(&id).filter(|i| i.organization_id == org)
    }

    fn usage(&self, org: OrganizationId, id: AccountId) -> AccountUsage {
        AccountUsage {
            journal_lines: self
                .org_entries(org)
                .flat_map(|e| e.lines.iter())
                .filter(|l| l.account_id == id)
                .count() as u64,
            children: self
                .accounts
                .values()
                .filter(|a| a.organization_id == org && a.parent_id == Some(id))
                .count() as u64,
            config_roles: self
                .configs
                .get(&org)
                .map(|c| c.roles_referencing(id))
                .unwrap_or_default(),
            retention_settings: self
                .settings
                .values()
                .filter(|s| s.organization_id == org && s.references(id))
                .count() as u64,
        }
    }
}

/// In-memory implementation of [`LedgerPort`]
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&LedgerState) -> LedgerResult<T> + Send,
    {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Runs `f` against a copy of the state and commits it only on success
    async fn transact<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut LedgerState) -> LedgerResult<T> + Send,
    {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let result = f(&mut draft)?;
        *state = draft;
        Ok(result)
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-ledger-store", 0)
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedgerStore {
    async fn create_account(
        &self,
        org: OrganizationId,
        account: NewAccount,
    ) -> LedgerResult<Account> {
        self.transact(|state| {
            account.validate()?;
            let code = account.code.trim();
            if state
                .accounts
                .values()
                .any(|a| a.organization_id == org && a.code == code)
            {
                return Err(LedgerError::DuplicateAccountCode(code.to_string()));
            }
            if let Some(parent) = account.parent_id {
                state.account(org, parent)?;
            }
            let account = Account::from_new(org, account);
            state.accounts.insert(account.id, account.clone());
            Ok(account)
        })
        .await
    }

    async fn get_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<Account> {
        self.read(|state| state.account(org, id).cloned()).await
    }

    async fn list_accounts(&self, org: OrganizationId) -> LedgerResult<Vec<Account>> {
        self.read(|state| Ok(state.org_accounts(org))).await
    }

    async fn update_account(
        &self,
        org: OrganizationId,
        id: AccountId,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        self.transact(|state| {
            let current = state.account(org, id)?.clone();
            let usage = state.usage(org, id);
            let updated = apply_account_update(&current, update, &usage, &state.org_accounts(org))?;
            state.accounts.insert(id, updated.clone());
            Ok(updated)
        })
        .await
    }

    async fn delete_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<()> {
        self.transact(|state| {
            state.account(org, id)?;
            state.usage(org, id).ensure_unused(id)?;
            state.accounts.remove(&id);
            Ok(())
        })
        .await
    }

    async fn account_usage(
        &self,
        org: OrganizationId,
        id: AccountId,
    ) -> LedgerResult<AccountUsage> {
        self.read(|state| {
            state.account(org, id)?;
            Ok(state.usage(org, id))
        })
        .await
    }

    async fn get_accounting_config(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Option<AccountingConfig>> {
        self.read(|state| Ok(state.configs.get(&org).cloned())).await
    }

    async fn save_accounting_config(
        &self,
        org: OrganizationId,
        mut config: AccountingConfig,
    ) -> LedgerResult<AccountingConfig> {
        self.transact(|state| {
            for account in config.referenced_accounts() {
                state.account(org, account)?;
            }
            config.organization_id = org;
            config.updated_at = Some(Utc::now());
            state.configs.insert(org, config.clone());
            Ok(config)
        })
        .await
    }

    async fn create_retention_setting(
        &self,
        org: OrganizationId,
        setting: NewRetentionSetting,
    ) -> LedgerResult<RetentionSetting> {
        self.transact(|state| {
            for account in setting.referenced_accounts() {
                state.account(org, account)?;
            }
            let setting = setting.into_setting(org)?;
            state.settings.insert(setting.id, setting.clone());
            Ok(setting)
        })
        .await
    }

    async fn list_retention_settings(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Vec<RetentionSetting>> {
        self.read(|state| {
            let mut settings: Vec<RetentionSetting> = state
                .settings
                .values()
                .filter(|s| s.organization_id == org)
                .cloned()
                .collect();
            settings.sort_by(|a, b| a.code.cmp(&b.code));
            Ok(settings)
        })
        .await
    }

    async fn create_journal_entry(
        &self,
        org: OrganizationId,
        entry: NewJournalEntry,
    ) -> LedgerResult<JournalEntry> {
        self.transact(|state| {
            entry.validate()?;
            for account in entry.account_ids() {
                state.account(org, account)?;
            }
            let entry = entry.into_entry(org)?;
            debug!(entry_id = %entry.id, lines = entry.lines.len(), "journal entry stored");
            state.entries.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    async fn get_journal_entry(
        &self,
        org: OrganizationId,
        id: JournalEntryId,
    ) -> LedgerResult<JournalEntry> {
        self.read(|state| {
            state
                .org_entries(org)
                .find(|e| e.id == id)
                .cloned()
                .ok_or(LedgerError::JournalEntryNotFound(id))
        })
        .await
    }

    async fn list_journal_entries(&self, org: OrganizationId) -> LedgerResult<Vec<JournalEntry>> {
        self.read(|state| {
            let mut entries: Vec<JournalEntry> = state.org_entries(org).cloned().collect();
            entries.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
            Ok(entries)
        })
        .await
    }

    async fn account_activity(&self, org: OrganizationId) -> LedgerResult<Vec<AccountActivity>> {
        self.read(|state| Ok(aggregate(&state.org_accounts(org), state.org_entries(org))))
            .await
    }

    async fn account_postings(
        &self,
        org: OrganizationId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerPosting>> {
        self.read(|state| {
            state.account(org, account_id)?;
            Ok(postings_for(account_id, state.org_entries(org)))
        })
        .await
    }

    async fn create_invoice(
        &self,
        org: OrganizationId,
        invoice: NewInvoice,
    ) -> LedgerResult<Invoice> {
        self.transact(|state| {
            let invoice = invoice.into_invoice(org)?;
            if let Some(order_id) = invoice.purchase_order_id {
                let order = state
                    .purchase_orders
                    .get_mut(&order_id)
                    .filter(|o| o.organization_id == org)
                    .ok_or(LedgerError::PurchaseOrderNotFound(order_id))?;
                order.register_invoice(invoice.total_amount)?;
            }
            state.invoices.insert(invoice.id, invoice.clone());
            Ok(invoice)
        })
        .await
    }

    async fn get_invoice(&self, org: OrganizationId, id: InvoiceId) -> LedgerResult<Invoice> {
        self.read(|state| state.invoice(org, id).cloned().ok_or(LedgerError::InvoiceNotFound(id)))
            .await
    }

    async fn apply_allocation(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
        amount: Money,
        source: AllocationSource,
        notes: Option<String>,
    ) -> LedgerResult<Invoice> {
        self.transact(|state| {
            let mut invoice = state
                .invoice(org, invoice_id)
                .cloned()
                .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

            match source {
                AllocationSource::Payment(payment_id) => {
                    let payment = state
                        .payments
                        .get(&payment_id)
                        .filter(|p| p.organization_id == org)
                        .ok_or(LedgerError::PaymentNotFound(payment_id))?;
                    let allocated: Money = state
                        .allocations
                        .iter()
                        .filter(|a| a.payment_id == Some(payment_id))
                        .map(|a| a.amount)
                        .sum::<Money>()
                        + amount;
                    if allocated.exceeds(&payment.amount) {
                        return Err(LedgerError::AllocationExceedsPayment {
                            allocated,
                            amount: payment.amount,
                        });
                    }
                }
                AllocationSource::Retention(retention_id) => {
                    let retention = state
                        .retentions
                        .get(&retention_id)
                        .filter(|r| r.organization_id == org)
                        .ok_or(LedgerError::RetentionNotFound(retention_id))?;
                    if retention.invoice_id != invoice_id {
                        return Err(LedgerError::RetentionInvoiceMismatch {
                            retention: retention_id,
                            expected: retention.invoice_id,
                            invoice: invoice_id,
                        });
                    }
                    if state
                        .allocations
                        .iter()
                        .any(|a| a.retention_id == Some(retention_id))
                    {
                        return Err(LedgerError::RetentionAlreadyAllocated(retention_id));
                    }
                }
            }

            invoice.apply_allocation(amount)?;
            state
                .allocations
                .push(PaymentAllocation::new(org, invoice_id, amount, source, notes));
            state.invoices.insert(invoice_id, invoice.clone());
            Ok(invoice)
        })
        .await
    }

    async fn list_allocations(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<PaymentAllocation>> {
        self.read(|state| {
            state
                .invoice(org, invoice_id)
                .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;
            Ok(state
                .allocations
                .iter()
                .filter(|a| a.invoice_id == invoice_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn record_payment(
        &self,
        org: OrganizationId,
        payment: NewPayment,
    ) -> LedgerResult<PaymentReceipt> {
        self.transact(|state| {
            let invoices = payment
                .invoice_ids()
                .into_iter()
                .filter_map(|id| state.invoice(org, id).cloned())
                .collect();
            let receipt = plan_payment(org, payment, invoices)?;

            state.payments.insert(receipt.payment.id, receipt.payment.clone());
            state.allocations.extend(receipt.allocations.iter().cloned());
            for invoice in &receipt.invoices {
                state.invoices.insert(invoice.id, invoice.clone());
            }
            Ok(receipt)
        })
        .await
    }

    async fn get_payment(&self, org: OrganizationId, id: PaymentId) -> LedgerResult<Payment> {
        self.read(|state| {
            state
                .payments
                .get(&id)
                .filter(|p| p.organization_id == org)
                .cloned()
                .ok_or(LedgerError::PaymentNotFound(id))
        })
        .await
    }

    async fn record_retention(
        &self,
        org: OrganizationId,
        request: RetentionRequest,
    ) -> LedgerResult<Retention> {
        self.transact(|state| {
            let invoice = state.invoice(org, request.invoice_id).cloned();
            let setting_id = request.retention_setting_id;
            let plan = plan_retention(
                org,
                request,
                invoice,
                state.configs.get(&org),
                state.settings.get(&setting_id),
                Utc::now().date_naive(),
            )?;

            state.entries.push(plan.journal_entry);
            state.allocations.push(plan.allocation);
            state.invoices.insert(plan.invoice.id, plan.invoice);
            state.retentions.insert(plan.retention.id, plan.retention.clone());
            Ok(plan.retention)
        })
        .await
    }

    async fn list_retentions(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<Retention>> {
        self.read(|state| {
            state
                .invoice(org, invoice_id)
                .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;
            let mut retentions: Vec<Retention> = state
                .retentions
                .values()
                .filter(|r| r.invoice_id == invoice_id)
                .cloned()
                .collect();
            retentions.sort_by_key(|r| r.created_at);
            Ok(retentions)
        })
        .await
    }

    async fn statement_sources(
        &self,
        org: OrganizationId,
        contact_id: ContactId,
    ) -> LedgerResult<StatementSources> {
        self.read(|state| {
            let invoices: Vec<Invoice> = state
                .invoices
                .values()
                .filter(|i| i.organization_id == org && i.contact_id == Some(contact_id))
                .cloned()
                .collect();
            let invoice_ids: HashSet<InvoiceId> = invoices.iter().map(|i| i.id).collect();

            let allocations: Vec<PaymentAllocation> = state
                .allocations
                .iter()
                .filter(|a| invoice_ids.contains(&a.invoice_id))
                .cloned()
                .collect();
            let allocated_payments: HashSet<PaymentId> =
                allocations.iter().filter_map(|a| a.payment_id).collect();

            let mut payments: Vec<Payment> = state
                .payments
                .values()
                .filter(|p| p.organization_id == org)
                .filter(|p| {
                    p.contact_id == Some(contact_id)
                        || p.invoice_id.is_some_and(|id| invoice_ids.contains(&id))
                        || allocated_payments.contains(&p.id)
                })
                .cloned()
                .collect();
            payments.sort_by_key(|p| p.created_at);

            Ok(StatementSources {
                invoices,
                payments,
                allocations,
            })
        })
        .await
    }

    async fn create_purchase_order(
        &self,
        org: OrganizationId,
        order: NewPurchaseOrder,
    ) -> LedgerResult<PurchaseOrder> {
        self.transact(|state| {
            let order = order.into_order(org)?;
            state.purchase_orders.insert(order.id, order.clone());
            Ok(order)
        })
        .await
    }

    async fn get_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        self.read(|state| {
            state
                .purchase_orders
                .get(&id)
                .filter(|o| o.organization_id == org)
                .cloned()
                .ok_or(LedgerError::PurchaseOrderNotFound(id))
        })
        .await
    }

    async fn approve_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        self.transact(|state| {
            let order = state
                .purchase_orders
                .get_mut(&id)
                .filter(|o| o.organization_id == org)
                .ok_or(LedgerError::PurchaseOrderNotFound(id))?;
            order.approve()?;
            Ok(order.clone())
        })
        .await
    }

    async fn reject_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        self.transact(|state| {
            let order = state
                .purchase_orders
                .get_mut(&id)
                .filter(|o| o.organization_id == org)
                .ok_or(LedgerError::PurchaseOrderNotFound(id))?;
            order.reject()?;
            Ok(order.clone())
        })
        .await
    }
}
