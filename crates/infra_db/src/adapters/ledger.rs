//! PostgreSQL Ledger Adapter
//!
//! Implements [`LedgerPort`] on top of [`LedgerRepository`]. Every mutating
//! operation opens one transaction, loads and locks the rows it depends on,
//! runs the domain rules and writes the result; any failure rolls the whole
//! operation back when the transaction is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_ledger::{LedgerPort, LedgerPortExt};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn LedgerPort> = Arc::new(PostgresLedgerAdapter::new(pool));
//! let ledger = port.general_ledger(org).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use core_kernel::{
    AccountId, ContactId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId,
    JournalEntryId, Money, OrganizationId, PaymentId, PurchaseOrderId,
};
use domain_ledger::account::apply_account_update;
use domain_ledger::payment::plan_payment;
use domain_ledger::retention::plan_retention;
use domain_ledger::statement::StatementSources;
use domain_ledger::{
    Account, AccountActivity, AccountUpdate, AccountUsage, AccountingConfig, AllocationSource,
    Invoice, JournalEntry, LedgerError, LedgerPort, LedgerPosting, LedgerResult, NewAccount,
    NewInvoice, NewJournalEntry, NewPayment, NewPurchaseOrder, NewRetentionSetting, Payment,
    PaymentAllocation, PaymentReceipt, PurchaseOrder, Retention, RetentionRequest,
    RetentionSetting,
};

use crate::error::DatabaseError;
use crate::repositories::ledger::{LedgerRepository, ACCOUNT_CODE_KEY};

const ADAPTER_ID: &str = "postgres-ledger-adapter";

/// PostgreSQL-backed implementation of the LedgerPort trait
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    pool: PgPool,
}

impl PostgresLedgerAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await.map_err(DatabaseError::from)?)
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> LedgerResult<()> {
        Ok(tx.commit().await.map_err(DatabaseError::from)?)
    }

    async fn acquire(&self) -> LedgerResult<sqlx::pool::PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await.map_err(DatabaseError::from)?)
    }

    /// Fails with `AccountNotFound` for the first of `ids` outside the organization
    async fn ensure_accounts(
        repo: &mut LedgerRepository<'_>,
        org: OrganizationId,
        ids: &[AccountId],
    ) -> LedgerResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let wanted: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let found: HashSet<Uuid> = repo
            .existing_accounts(org.into(), &wanted)
            .await?
            .into_iter()
            .collect();
        match ids.iter().find(|id| !found.contains(id.as_uuid())) {
            Some(missing) => Err(LedgerError::AccountNotFound(*missing)),
            None => Ok(()),
        }
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(
                ADAPTER_ID,
                latency_ms,
                format!("Database error: {}", e),
            ),
        }
    }
}

#[async_trait]
impl LedgerPort for PostgresLedgerAdapter {
    // ------------------------------------------------------------------
    // Account registry
    // ------------------------------------------------------------------

    #[instrument(skip(self, account), fields(org = %org, code = %account.code))]
    async fn create_account(
        &self,
        org: OrganizationId,
        account: NewAccount,
    ) -> LedgerResult<Account> {
        account.validate()?;
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        if let Some(parent) = account.parent_id {
            Self::ensure_accounts(&mut repo, org, &[parent]).await?;
        }

        let account = Account::from_new(org, account);
        repo.insert_account(&account).await.map_err(|e| {
            if e.violates(ACCOUNT_CODE_KEY) {
                LedgerError::DuplicateAccountCode(account.code.clone())
            } else {
                e.into()
            }
        })?;

        Self::commit(tx).await?;
        info!(account_id = %account.id, "account created");
        Ok(account)
    }

    #[instrument(skip(self), fields(org = %org, account_id = %id))]
    async fn get_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<Account> {
        let mut conn = self.acquire().await?;
        LedgerRepository::new(&mut conn)
            .find_account(org.into(), id.into())
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    #[instrument(skip(self), fields(org = %org))]
    async fn list_accounts(&self, org: OrganizationId) -> LedgerResult<Vec<Account>> {
        let mut conn = self.acquire().await?;
        Ok(LedgerRepository::new(&mut conn).list_accounts(org.into()).await?)
    }

    #[instrument(skip(self, update), fields(org = %org, account_id = %id))]
    async fn update_account(
        &self,
        org: OrganizationId,
        id: AccountId,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let current = repo
            .find_account(org.into(), id.into())
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let usage = repo.account_usage(org.into(), id.into()).await?;
        let accounts = repo.list_accounts(org.into()).await?;

        let updated = apply_account_update(&current, update, &usage, &accounts)?;
        repo.update_account(&updated).await.map_err(|e| {
            if e.violates(ACCOUNT_CODE_KEY) {
                LedgerError::DuplicateAccountCode(updated.code.clone())
            } else {
                e.into()
            }
        })?;

        Self::commit(tx).await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(org = %org, account_id = %id))]
    async fn delete_account(&self, org: OrganizationId, id: AccountId) -> LedgerResult<()> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        repo.find_account(org.into(), id.into())
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        repo.account_usage(org.into(), id.into())
            .await?
            .ensure_unused(id)?;
        repo.delete_account(org.into(), id.into()).await?;

        Self::commit(tx).await?;
        info!("account deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(org = %org, account_id = %id))]
    async fn account_usage(
        &self,
        org: OrganizationId,
        id: AccountId,
    ) -> LedgerResult<AccountUsage> {
        let mut conn = self.acquire().await?;
        let mut repo = LedgerRepository::new(&mut conn);
        repo.find_account(org.into(), id.into())
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        Ok(repo.account_usage(org.into(), id.into()).await?)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(org = %org))]
    async fn get_accounting_config(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Option<AccountingConfig>> {
        let mut conn = self.acquire().await?;
        Ok(LedgerRepository::new(&mut conn).find_config(org.into()).await?)
    }

    #[instrument(skip(self, config), fields(org = %org))]
    async fn save_accounting_config(
        &self,
        org: OrganizationId,
        mut config: AccountingConfig,
    ) -> LedgerResult<AccountingConfig> {
        config.organization_id = org;
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        Self::ensure_accounts(&mut repo, org, &config.referenced_accounts()).await?;
        let saved = repo.upsert_config(&config).await?;

        Self::commit(tx).await?;
        Ok(saved)
    }

    #[instrument(skip(self, setting), fields(org = %org, code = %setting.code))]
    async fn create_retention_setting(
        &self,
        org: OrganizationId,
        setting: NewRetentionSetting,
    ) -> LedgerResult<RetentionSetting> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        Self::ensure_accounts(&mut repo, org, &setting.referenced_accounts()).await?;
        let setting = setting.into_setting(org)?;
        repo.insert_retention_setting(&setting).await?;

        Self::commit(tx).await?;
        Ok(setting)
    }

    #[instrument(skip(self), fields(org = %org))]
    async fn list_retention_settings(
        &self,
        org: OrganizationId,
    ) -> LedgerResult<Vec<RetentionSetting>> {
        let mut conn = self.acquire().await?;
        Ok(LedgerRepository::new(&mut conn)
            .list_retention_settings(org.into())
            .await?)
    }

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    #[instrument(skip(self, entry), fields(org = %org, lines = entry.lines.len()))]
    async fn create_journal_entry(
        &self,
        org: OrganizationId,
        entry: NewJournalEntry,
    ) -> LedgerResult<JournalEntry> {
        entry.validate()?;
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        Self::ensure_accounts(&mut repo, org, &entry.account_ids()).await?;
        let entry = entry.into_entry(org)?;
        repo.insert_journal_entry(&entry).await?;

        Self::commit(tx).await?;
        debug!(entry_id = %entry.id, "journal entry stored");
        Ok(entry)
    }

    #[instrument(skip(self), fields(org = %org, entry_id = %id))]
    async fn get_journal_entry(
        &self,
        org: OrganizationId,
        id: JournalEntryId,
    ) -> LedgerResult<JournalEntry> {
        let mut conn = self.acquire().await?;
        LedgerRepository::new(&mut conn)
            .find_journal_entry(org.into(), id.into())
            .await?
            .ok_or(LedgerError::JournalEntryNotFound(id))
    }

    #[instrument(skip(self), fields(org = %org))]
    async fn list_journal_entries(&self, org: OrganizationId) -> LedgerResult<Vec<JournalEntry>> {
        let mut conn = self.acquire().await?;
        Ok(LedgerRepository::new(&mut conn)
            .list_journal_entries(org.into())
            .await?)
    }

    #[instrument(skip(self), fields(org = %org))]
    async fn account_activity(&self, org: OrganizationId) -> LedgerResult<Vec<AccountActivity>> {
        let mut conn = self.acquire().await?;
        Ok(LedgerRepository::new(&mut conn)
            .account_activity(org.into())
            .await?)
    }

    #[instrument(skip(self), fields(org = %org, account_id = %account_id))]
    async fn account_postings(
        &self,
        org: OrganizationId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerPosting>> {
        let mut conn = self.acquire().await?;
        let mut repo = LedgerRepository::new(&mut conn);
        repo.find_account(org.into(), account_id.into())
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        Ok(repo.account_postings(org.into(), account_id.into()).await?)
    }

    // ------------------------------------------------------------------
    // Invoices, payments and allocations
    // ------------------------------------------------------------------

    #[instrument(skip(self, invoice), fields(org = %org, flow = %invoice.flow))]
    async fn create_invoice(
        &self,
        org: OrganizationId,
        invoice: NewInvoice,
    ) -> LedgerResult<Invoice> {
        let invoice = invoice.into_invoice(org)?;
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        if let Some(order_id) = invoice.purchase_order_id {
            let mut order = repo
                .find_purchase_order(org.into(), order_id.into(), true)
                .await?
                .ok_or(LedgerError::PurchaseOrderNotFound(order_id))?;
            order.register_invoice(invoice.total_amount)?;
            repo.update_purchase_order(&order).await?;
        }
        repo.insert_invoice(&invoice).await?;

        Self::commit(tx).await?;
        info!(invoice_id = %invoice.id, total = %invoice.total_amount, "invoice created");
        Ok(invoice)
    }

    #[instrument(skip(self), fields(org = %org, invoice_id = %id))]
    async fn get_invoice(&self, org: OrganizationId, id: InvoiceId) -> LedgerResult<Invoice> {
        let mut conn = self.acquire().await?;
        LedgerRepository::new(&mut conn)
            .find_invoice(org.into(), id.into())
            .await?
            .ok_or(LedgerError::InvoiceNotFound(id))
    }

    #[instrument(skip(self, notes), fields(org = %org, invoice_id = %invoice_id, amount = %amount))]
    async fn apply_allocation(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
        amount: Money,
        source: AllocationSource,
        notes: Option<String>,
    ) -> LedgerResult<Invoice> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let mut invoice = repo
            .lock_invoice(org.into(), invoice_id.into())
            .await?
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

        match source {
            AllocationSource::Payment(payment_id) => {
                let payment = repo
                    .lock_payment(org.into(), payment_id.into())
                    .await?
                    .ok_or(LedgerError::PaymentNotFound(payment_id))?;
                let allocated = repo.allocated_from_payment(payment_id.into()).await? + amount;
                if allocated.exceeds(&payment.amount) {
                    return Err(LedgerError::AllocationExceedsPayment {
                        allocated,
                        amount: payment.amount,
                    });
                }
            }
            AllocationSource::Retention(retention_id) => {
                let retention = repo
                    .find_retention(org.into(), retention_id.into())
                    .await?
                    .ok_or(LedgerError::RetentionNotFound(retention_id))?;
                if retention.invoice_id != invoice_id {
                    return Err(LedgerError::RetentionInvoiceMismatch {
                        retention: retention_id,
                        expected: retention.invoice_id,
                        invoice: invoice_id,
                    });
                }
                if repo.retention_is_allocated(retention_id.into()).await? {
                    return Err(LedgerError::RetentionAlreadyAllocated(retention_id));
                }
            }
        }

        invoice.apply_allocation(amount)?;
        let allocation = PaymentAllocation::new(org, invoice_id, amount, source, notes);
        repo.insert_allocation(&allocation).await?;
        repo.update_invoice_allocated(&invoice).await?;

        Self::commit(tx).await?;
        debug!(remaining = %invoice.amount_remaining(), "allocation applied");
        Ok(invoice)
    }

    #[instrument(skip(self), fields(org = %org, invoice_id = %invoice_id))]
    async fn list_allocations(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<PaymentAllocation>> {
        let mut conn = self.acquire().await?;
        let mut repo = LedgerRepository::new(&mut conn);
        repo.find_invoice(org.into(), invoice_id.into())
            .await?
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;
        Ok(repo
            .allocations_for_invoices(org.into(), &[invoice_id.into()])
            .await?)
    }

    #[instrument(
        skip(self, payment),
        fields(org = %org, amount = %payment.amount, allocations = payment.allocations.len())
    )]
    async fn record_payment(
        &self,
        org: OrganizationId,
        payment: NewPayment,
    ) -> LedgerResult<PaymentReceipt> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let ids: Vec<Uuid> = payment.invoice_ids().into_iter().map(Uuid::from).collect();
        let invoices = repo.lock_invoices(org.into(), &ids).await?;
        let receipt = plan_payment(org, payment, invoices)?;

        repo.insert_payment(&receipt.payment).await?;
        for allocation in &receipt.allocations {
            repo.insert_allocation(allocation).await?;
        }
        for invoice in &receipt.invoices {
            repo.update_invoice_allocated(invoice).await?;
        }

        Self::commit(tx).await?;
        info!(payment_id = %receipt.payment.id, "payment recorded");
        Ok(receipt)
    }

    #[instrument(skip(self), fields(org = %org, payment_id = %id))]
    async fn get_payment(&self, org: OrganizationId, id: PaymentId) -> LedgerResult<Payment> {
        let mut conn = self.acquire().await?;
        LedgerRepository::new(&mut conn)
            .find_payment(org.into(), id.into())
            .await?
            .ok_or(LedgerError::PaymentNotFound(id))
    }

    // ------------------------------------------------------------------
    // Retentions
    // ------------------------------------------------------------------

    #[instrument(skip(self, request), fields(org = %org, invoice_id = %request.invoice_id))]
    async fn record_retention(
        &self,
        org: OrganizationId,
        request: RetentionRequest,
    ) -> LedgerResult<Retention> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let invoice = repo
            .lock_invoice(org.into(), request.invoice_id.into())
            .await?;
        let config = repo.find_config(org.into()).await?;
        let setting = repo
            .find_retention_setting(org.into(), request.retention_setting_id.into())
            .await?;

        let plan = plan_retention(
            org,
            request,
            invoice,
            config.as_ref(),
            setting.as_ref(),
            Utc::now().date_naive(),
        )?;

        repo.insert_journal_entry(&plan.journal_entry).await?;
        repo.insert_retention(&plan.retention).await?;
        repo.insert_allocation(&plan.allocation).await?;
        repo.update_invoice_allocated(&plan.invoice).await?;

        Self::commit(tx).await?;
        info!(
            retention_id = %plan.retention.id,
            amount = %plan.retention.amount,
            "retention recorded"
        );
        Ok(plan.retention)
    }

    #[instrument(skip(self), fields(org = %org, invoice_id = %invoice_id))]
    async fn list_retentions(
        &self,
        org: OrganizationId,
        invoice_id: InvoiceId,
    ) -> LedgerResult<Vec<Retention>> {
        let mut conn = self.acquire().await?;
        let mut repo = LedgerRepository::new(&mut conn);
        repo.find_invoice(org.into(), invoice_id.into())
            .await?
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;
        Ok(repo
            .retentions_for_invoice(org.into(), invoice_id.into())
            .await?)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(org = %org, contact_id = %contact_id))]
    async fn statement_sources(
        &self,
        org: OrganizationId,
        contact_id: ContactId,
    ) -> LedgerResult<StatementSources> {
        // One snapshot for the three reads
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let invoices = repo
            .invoices_for_contact(org.into(), contact_id.into())
            .await?;
        let invoice_ids: Vec<Uuid> = invoices.iter().map(|i| i.id.into()).collect();

        let allocations = repo.allocations_for_invoices(org.into(), &invoice_ids).await?;
        let payment_ids: Vec<Uuid> = allocations
            .iter()
            .filter_map(|a| a.payment_id)
            .map(Uuid::from)
            .collect();

        let payments = repo
            .payments_for_statement(org.into(), contact_id.into(), &invoice_ids, &payment_ids)
            .await?;

        Self::commit(tx).await?;
        Ok(StatementSources {
            invoices,
            payments,
            allocations,
        })
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    #[instrument(skip(self, order), fields(org = %org, number = %order.number))]
    async fn create_purchase_order(
        &self,
        org: OrganizationId,
        order: NewPurchaseOrder,
    ) -> LedgerResult<PurchaseOrder> {
        let order = order.into_order(org)?;
        let mut tx = self.begin().await?;
        LedgerRepository::new(&mut tx)
            .insert_purchase_order(&order)
            .await?;
        Self::commit(tx).await?;
        Ok(order)
    }

    #[instrument(skip(self), fields(org = %org, purchase_order_id = %id))]
    async fn get_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        let mut conn = self.acquire().await?;
        LedgerRepository::new(&mut conn)
            .find_purchase_order(org.into(), id.into(), false)
            .await?
            .ok_or(LedgerError::PurchaseOrderNotFound(id))
    }

    #[instrument(skip(self), fields(org = %org, purchase_order_id = %id))]
    async fn approve_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let mut order = repo
            .find_purchase_order(org.into(), id.into(), true)
            .await?
            .ok_or(LedgerError::PurchaseOrderNotFound(id))?;
        order.approve()?;
        repo.update_purchase_order(&order).await?;

        Self::commit(tx).await?;
        Ok(order)
    }

    #[instrument(skip(self), fields(org = %org, purchase_order_id = %id))]
    async fn reject_purchase_order(
        &self,
        org: OrganizationId,
        id: PurchaseOrderId,
    ) -> LedgerResult<PurchaseOrder> {
        let mut tx = self.begin().await?;
        let mut repo = LedgerRepository::new(&mut tx);

        let mut order = repo
            .find_purchase_order(org.into(), id.into(), true)
            .await?
            .ok_or(LedgerError::PurchaseOrderNotFound(id))?;
        order.reject()?;
        repo.update_purchase_order(&order).await?;

        Self::commit(tx).await?;
        Ok(order)
    }
}
