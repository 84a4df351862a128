//! Ledger repository
//!
//! Raw SQL access to the bookkeeping tables. A [`LedgerRepository`] borrows a
//! single connection, normally the one of an open transaction, so that the
//! adapter can run several statements atomically. Every query is scoped by
//! `organization_id`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use uuid::Uuid;

use core_kernel::{Money, Rate};
use domain_ledger::{
    Account, AccountActivity, AccountType, AccountUsage, AccountingConfig, Invoice, InvoiceFlow,
    JournalEntry, JournalLine, LedgerPosting, Payment, PaymentAllocation, PaymentMethod,
    PaymentType, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Retention,
    RetentionSetting,
};

use crate::error::DatabaseError;

/// Name of the unique index on account codes
pub const ACCOUNT_CODE_KEY: &str = "accounts_org_code_key";

// ============================================================================
// Enum mirrors of the PostgreSQL enum types
// ============================================================================

macro_rules! db_enum {
    ($db:ident, $domain:ident, $type_name:tt, [$($variant:ident),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
        #[sqlx(type_name = $type_name, rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $db {
            $($variant),+
        }

        impl From<$domain> for $db {
            fn from(value: $domain) -> Self {
                match value {
                    $($domain::$variant => $db::$variant),+
                }
            }
        }

        impl From<$db> for $domain {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => $domain::$variant),+
                }
            }
        }
    };
}

db_enum!(DbAccountType, AccountType, "account_type", [Asset, Liability, Equity, Income, Expense]);
db_enum!(DbInvoiceFlow, InvoiceFlow, "invoice_flow", [Sale, Purchase]);
db_enum!(DbPaymentType, PaymentType, "payment_type", [Incoming, Outgoing]);
db_enum!(
    DbPaymentMethod,
    PaymentMethod,
    "payment_method",
    [Cash, BankTransfer, Check, Card, Other]
);
db_enum!(
    DbPurchaseOrderStatus,
    PurchaseOrderStatus,
    "purchase_order_status",
    [Draft, Approved, Rejected]
);

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: DbAccountType,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            code: row.code,
            name: row.name,
            account_type: row.account_type.into(),
            parent_id: row.parent_id.map(Into::into),
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    #[sqlx(flatten)]
    pub account: AccountRow,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct UsageRow {
    pub journal_lines: i64,
    pub children: i64,
    pub retention_settings: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ConfigRow {
    pub organization_id: Uuid,
    pub sales_account_id: Option<Uuid>,
    pub sales_vat_account_id: Option<Uuid>,
    pub receivables_account_id: Option<Uuid>,
    pub purchases_account_id: Option<Uuid>,
    pub purchases_vat_account_id: Option<Uuid>,
    pub payables_account_id: Option<Uuid>,
    pub cash_account_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for AccountingConfig {
    fn from(row: ConfigRow) -> Self {
        AccountingConfig {
            organization_id: row.organization_id.into(),
            sales_account_id: row.sales_account_id.map(Into::into),
            sales_vat_account_id: row.sales_vat_account_id.map(Into::into),
            receivables_account_id: row.receivables_account_id.map(Into::into),
            purchases_account_id: row.purchases_account_id.map(Into::into),
            purchases_vat_account_id: row.purchases_vat_account_id.map(Into::into),
            payables_account_id: row.payables_account_id.map(Into::into),
            cash_account_id: row.cash_account_id.map(Into::into),
            bank_account_id: row.bank_account_id.map(Into::into),
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RetentionSettingRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub code: String,
    pub applies_to: Option<DbInvoiceFlow>,
    pub default_rate: Option<Decimal>,
    pub receivable_account_id: Option<Uuid>,
    pub payable_account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<RetentionSettingRow> for RetentionSetting {
    fn from(row: RetentionSettingRow) -> Self {
        RetentionSetting {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            name: row.name,
            code: row.code,
            applies_to: row.applies_to.map(Into::into),
            default_rate: row.default_rate.map(Rate::from_percentage),
            receivable_account_id: row.receivable_account_id.map(Into::into),
            payable_account_id: row.payable_account_id.map(Into::into),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JournalEntryRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntryRow {
    fn into_entry(self, lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry {
            id: self.id.into(),
            organization_id: self.organization_id.into(),
            date: self.date,
            description: self.description,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            lines,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JournalLineRow {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub position: i32,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
}

impl From<JournalLineRow> for JournalLine {
    fn from(row: JournalLineRow) -> Self {
        JournalLine {
            id: row.id.into(),
            entry_id: row.entry_id.into(),
            account_id: row.account_id.into(),
            position: row.position,
            debit: Money::new(row.debit),
            credit: Money::new(row.credit),
            description: row.description,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PostingRow {
    pub entry_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub position: i32,
    pub entry_created_at: DateTime<Utc>,
}

impl From<PostingRow> for LedgerPosting {
    fn from(row: PostingRow) -> Self {
        LedgerPosting {
            entry_id: row.entry_id.into(),
            date: row.date,
            description: row.description,
            debit: Money::new(row.debit),
            credit: Money::new(row.credit),
            position: row.position,
            entry_created_at: row.entry_created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub flow: DbInvoiceFlow,
    pub letter: String,
    pub point_of_sale: i32,
    pub number: i64,
    pub date: NaiveDate,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_allocated: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            contact_id: row.contact_id.map(Into::into),
            purchase_order_id: row.purchase_order_id.map(Into::into),
            flow: row.flow.into(),
            letter: row.letter,
            point_of_sale: row.point_of_sale,
            number: row.number,
            date: row.date,
            net_amount: Money::new(row.net_amount),
            vat_amount: Money::new(row.vat_amount),
            total_amount: Money::new(row.total_amount),
            amount_allocated: Money::new(row.amount_allocated),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub payment_type: DbPaymentType,
    pub method: DbPaymentMethod,
    pub date: Option<NaiveDate>,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            contact_id: row.contact_id.map(Into::into),
            invoice_id: row.invoice_id.map(Into::into),
            payment_type: row.payment_type.into(),
            method: row.method.into(),
            date: row.date,
            amount: Money::new(row.amount),
            reference: row.reference,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AllocationRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub retention_id: Option<Uuid>,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AllocationRow> for PaymentAllocation {
    fn from(row: AllocationRow) -> Self {
        PaymentAllocation {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            invoice_id: row.invoice_id.into(),
            payment_id: row.payment_id.map(Into::into),
            retention_id: row.retention_id.map(Into::into),
            amount: Money::new(row.amount),
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RetentionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub invoice_id: Uuid,
    pub contact_id: Uuid,
    pub retention_setting_id: Uuid,
    pub setting_name: String,
    pub setting_code: String,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub certificate_number: Option<String>,
    pub certificate_date: Option<NaiveDate>,
    pub journal_entry_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<RetentionRow> for Retention {
    fn from(row: RetentionRow) -> Self {
        Retention {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            invoice_id: row.invoice_id.into(),
            contact_id: row.contact_id.into(),
            retention_setting_id: row.retention_setting_id.into(),
            setting_name: row.setting_name,
            setting_code: row.setting_code,
            base_amount: Money::new(row.base_amount),
            rate: Rate::from_percentage(row.rate),
            amount: Money::new(row.amount),
            certificate_number: row.certificate_number,
            certificate_date: row.certificate_date,
            journal_entry_id: row.journal_entry_id.into(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrderRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub number: String,
    pub date: NaiveDate,
    pub status: DbPurchaseOrderStatus,
    pub subtotal: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub invoiced_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrderRow {
    fn into_order(self, items: Vec<PurchaseOrderItem>) -> PurchaseOrder {
        PurchaseOrder {
            id: self.id.into(),
            organization_id: self.organization_id.into(),
            contact_id: self.contact_id.map(Into::into),
            number: self.number,
            date: self.date,
            status: self.status.into(),
            items,
            subtotal: Money::new(self.subtotal),
            vat_rate: Rate::from_percentage(self.vat_rate),
            vat_amount: Money::new(self.vat_amount),
            total_amount: Money::new(self.total_amount),
            invoiced_amount: Money::new(self.invoiced_amount),
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrderItemRow {
    pub id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        PurchaseOrderItem {
            id: row.id.into(),
            description: row.description,
            quantity: row.quantity,
            unit_price: Money::new(row.unit_price),
            line_total: Money::new(row.line_total),
        }
    }
}

// ============================================================================
// Column lists
// ============================================================================

const ACCOUNT_COLUMNS: &str =
    "id, organization_id, code, name, account_type, parent_id, description, is_active, created_at";

const INVOICE_COLUMNS: &str = "id, organization_id, contact_id, purchase_order_id, flow, letter, \
     point_of_sale, number, date, net_amount, vat_amount, total_amount, amount_allocated, \
     created_at";

const PAYMENT_COLUMNS: &str = "id, organization_id, contact_id, invoice_id, payment_type, method, \
     date, amount, reference, notes, created_at";

const ALLOCATION_COLUMNS: &str =
    "id, organization_id, invoice_id, payment_id, retention_id, amount, notes, created_at";

const RETENTION_COLUMNS: &str = "id, organization_id, invoice_id, contact_id, \
     retention_setting_id, setting_name, setting_code, base_amount, rate, amount, \
     certificate_number, certificate_date, journal_entry_id, created_at";

const SETTING_COLUMNS: &str = "id, organization_id, name, code, applies_to, default_rate, \
     receivable_account_id, payable_account_id, created_at";

const ORDER_COLUMNS: &str = "id, organization_id, contact_id, number, date, status, subtotal, \
     vat_rate, vat_amount, total_amount, invoiced_amount, notes, created_at";

// ============================================================================
// Repository
// ============================================================================

/// SQL access bound to one connection
#[derive(Debug)]
pub struct LedgerRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> LedgerRepository<'c> {
    /// Wraps a connection or an open transaction (`&mut *tx`)
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    pub async fn insert_account(&mut self, account: &Account) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, organization_id, code, name, account_type,
                parent_id, description, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.organization_id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(DbAccountType::from(account.account_type))
        .bind(account.parent_id.map(Uuid::from))
        .bind(&account.description)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn find_account(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Account>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Those of `ids` that are accounts of the organization
    pub async fn existing_accounts(
        &mut self,
        org: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, DatabaseError> {
        let found = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM accounts WHERE organization_id = $1 AND id = ANY($2)",
        )
        .bind(org)
        .bind(ids)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(found)
    }

    pub async fn list_accounts(&mut self, org: Uuid) -> Result<Vec<Account>, DatabaseError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE organization_id = $1 ORDER BY code"
        ))
        .bind(org)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_account(&mut self, account: &Account) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET code = $3, name = $4, account_type = $5, parent_id = $6,
                description = $7, is_active = $8
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(account.organization_id.as_uuid())
        .bind(account.id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(DbAccountType::from(account.account_type))
        .bind(account.parent_id.map(Uuid::from))
        .bind(&account.description)
        .bind(account.is_active)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn delete_account(&mut self, org: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM accounts WHERE organization_id = $1 AND id = $2")
            .bind(org)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Counts everything that references the account
    pub async fn account_usage(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<AccountUsage, DatabaseError> {
        let counts = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM journal_lines
                  WHERE organization_id = $1 AND account_id = $2) AS journal_lines,
                (SELECT COUNT(*) FROM accounts
                  WHERE organization_id = $1 AND parent_id = $2) AS children,
                (SELECT COUNT(*) FROM retention_settings
                  WHERE organization_id = $1
                    AND (receivable_account_id = $2 OR payable_account_id = $2))
                  AS retention_settings
            "#,
        )
        .bind(org)
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;

        let config_roles = self
            .find_config(org)
            .await?
            .map(|c| c.roles_referencing(id.into()))
            .unwrap_or_default();

        Ok(AccountUsage {
            journal_lines: counts.journal_lines.max(0) as u64,
            children: counts.children.max(0) as u64,
            config_roles,
            retention_settings: counts.retention_settings.max(0) as u64,
        })
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub async fn find_config(
        &mut self,
        org: Uuid,
    ) -> Result<Option<AccountingConfig>, DatabaseError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT organization_id, sales_account_id, sales_vat_account_id,
                   receivables_account_id, purchases_account_id, purchases_vat_account_id,
                   payables_account_id, cash_account_id, bank_account_id, updated_at
            FROM accounting_configs
            WHERE organization_id = $1
            "#,
        )
        .bind(org)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn upsert_config(
        &mut self,
        config: &AccountingConfig,
    ) -> Result<AccountingConfig, DatabaseError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            INSERT INTO accounting_configs (
                organization_id, sales_account_id, sales_vat_account_id,
                receivables_account_id, purchases_account_id, purchases_vat_account_id,
                payables_account_id, cash_account_id, bank_account_id, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (organization_id) DO UPDATE SET
                sales_account_id = EXCLUDED.sales_account_id,
                sales_vat_account_id = EXCLUDED.sales_vat_account_id,
                receivables_account_id = EXCLUDED.receivables_account_id,
                purchases_account_id = EXCLUDED.purchases_account_id,
                purchases_vat_account_id = EXCLUDED.purchases_vat_account_id,
                payables_account_id = EXCLUDED.payables_account_id,
                cash_account_id = EXCLUDED.cash_account_id,
                bank_account_id = EXCLUDED.bank_account_id,
                updated_at = EXCLUDED.updated_at
            RETURNING organization_id, sales_account_id, sales_vat_account_id,
                      receivables_account_id, purchases_account_id, purchases_vat_account_id,
                      payables_account_id, cash_account_id, bank_account_id, updated_at
            "#,
        )
        .bind(config.organization_id.as_uuid())
        .bind(config.sales_account_id.map(Uuid::from))
        .bind(config.sales_vat_account_id.map(Uuid::from))
        .bind(config.receivables_account_id.map(Uuid::from))
        .bind(config.purchases_account_id.map(Uuid::from))
        .bind(config.purchases_vat_account_id.map(Uuid::from))
        .bind(config.payables_account_id.map(Uuid::from))
        .bind(config.cash_account_id.map(Uuid::from))
        .bind(config.bank_account_id.map(Uuid::from))
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(row.into())
    }

    pub async fn insert_retention_setting(
        &mut self,
        setting: &RetentionSetting,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO retention_settings (
                id, organization_id, name, code, applies_to, default_rate,
                receivable_account_id, payable_account_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(setting.id.as_uuid())
        .bind(setting.organization_id.as_uuid())
        .bind(&setting.name)
        .bind(&setting.code)
        .bind(setting.applies_to.map(DbInvoiceFlow::from))
        .bind(setting.default_rate.map(|r| r.as_percentage()))
        .bind(setting.receivable_account_id.map(Uuid::from))
        .bind(setting.payable_account_id.map(Uuid::from))
        .bind(setting.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn find_retention_setting(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<RetentionSetting>, DatabaseError> {
        let row = sqlx::query_as::<_, RetentionSettingRow>(&format!(
            "SELECT {SETTING_COLUMNS} FROM retention_settings \
             WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_retention_settings(
        &mut self,
        org: Uuid,
    ) -> Result<Vec<RetentionSetting>, DatabaseError> {
        let rows = sqlx::query_as::<_, RetentionSettingRow>(&format!(
            "SELECT {SETTING_COLUMNS} FROM retention_settings \
             WHERE organization_id = $1 ORDER BY code"
        ))
        .bind(org)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    /// Inserts the entry header and all its lines
    pub async fn insert_journal_entry(
        &mut self,
        entry: &JournalEntry,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO journal_entries (
                id, organization_id, date, description, reference_type, reference_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.organization_id.as_uuid())
        .bind(entry.date)
        .bind(&entry.description)
        .bind(&entry.reference_type)
        .bind(entry.reference_id)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        for line in &entry.lines {
            sqlx::query(
                r#"
                INSERT INTO journal_lines (
                    id, entry_id, organization_id, account_id, position, debit, credit, description
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(entry.id.as_uuid())
            .bind(entry.organization_id.as_uuid())
            .bind(line.account_id.as_uuid())
            .bind(line.position)
            .bind(line.debit.amount())
            .bind(line.credit.amount())
            .bind(&line.description)
            .execute(&mut *self.conn)
            .await?;
        }
        Ok(())
    }

    pub async fn find_journal_entry(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<JournalEntry>, DatabaseError> {
        let Some(header) = sqlx::query_as::<_, JournalEntryRow>(
            r#"
            SELECT id, organization_id, date, description, reference_type, reference_id, created_at
            FROM journal_entries
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, JournalLineRow>(
            r#"
            SELECT id, entry_id, account_id, position, debit, credit, description
            FROM journal_lines
            WHERE entry_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(Some(header.into_entry(lines.into_iter().map(Into::into).collect())))
    }

    /// All entries of the organization by date, then creation
    pub async fn list_journal_entries(
        &mut self,
        org: Uuid,
    ) -> Result<Vec<JournalEntry>, DatabaseError> {
        let headers = sqlx::query_as::<_, JournalEntryRow>(
            r#"
            SELECT id, organization_id, date, description, reference_type, reference_id, created_at
            FROM journal_entries
            WHERE organization_id = $1
            ORDER BY date, created_at
            "#,
        )
        .bind(org)
        .fetch_all(&mut *self.conn)
        .await?;

        let rows = sqlx::query_as::<_, JournalLineRow>(
            r#"
            SELECT id, entry_id, account_id, position, debit, credit, description
            FROM journal_lines
            WHERE organization_id = $1
            ORDER BY entry_id, position
            "#,
        )
        .bind(org)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<JournalLine>> = HashMap::new();
        for row in rows {
            lines.entry(row.entry_id).or_default().push(row.into());
        }

        Ok(headers
            .into_iter()
            .map(|h| {
                let entry_lines = lines.remove(&h.id).unwrap_or_default();
                h.into_entry(entry_lines)
            })
            .collect())
    }

    /// Debit and credit sums per account, every account included
    pub async fn account_activity(
        &mut self,
        org: Uuid,
    ) -> Result<Vec<AccountActivity>, DatabaseError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT a.id, a.organization_id, a.code, a.name, a.account_type, a.parent_id,
                   a.description, a.is_active, a.created_at,
                   COALESCE(SUM(l.debit), 0) AS debit,
                   COALESCE(SUM(l.credit), 0) AS credit
            FROM accounts a
            LEFT JOIN journal_lines l
              ON l.account_id = a.id AND l.organization_id = a.organization_id
            WHERE a.organization_id = $1
            GROUP BY a.id
            ORDER BY a.code
            "#,
        )
        .bind(org)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AccountActivity {
                account: row.account.into(),
                debit: Money::new(row.debit),
                credit: Money::new(row.credit),
            })
            .collect())
    }

    pub async fn account_postings(
        &mut self,
        org: Uuid,
        account_id: Uuid,
    ) -> Result<Vec<LedgerPosting>, DatabaseError> {
        let rows = sqlx::query_as::<_, PostingRow>(
            r#"
            SELECT l.entry_id, e.date,
                   COALESCE(l.description, e.description) AS description,
                   l.debit, l.credit, l.position,
                   e.created_at AS entry_created_at
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE l.organization_id = $1 AND l.account_id = $2
            ORDER BY e.date, e.created_at, l.position
            "#,
        )
        .bind(org)
        .bind(account_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    pub async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(invoice.id.as_uuid())
        .bind(invoice.organization_id.as_uuid())
        .bind(invoice.contact_id.map(Uuid::from))
        .bind(invoice.purchase_order_id.map(Uuid::from))
        .bind(DbInvoiceFlow::from(invoice.flow))
        .bind(&invoice.letter)
        .bind(invoice.point_of_sale)
        .bind(invoice.number)
        .bind(invoice.date)
        .bind(invoice.net_amount.amount())
        .bind(invoice.vat_amount.amount())
        .bind(invoice.total_amount.amount())
        .bind(invoice.amount_allocated.amount())
        .bind(invoice.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn find_invoice(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Invoice>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Loads invoices and holds their row locks until the transaction ends
    ///
    /// Rows are locked in id order so concurrent writers cannot deadlock.
    pub async fn lock_invoices(
        &mut self,
        org: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Invoice>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE organization_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE"
        ))
        .bind(org)
        .bind(ids)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn lock_invoice(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Invoice>, DatabaseError> {
        Ok(self.lock_invoices(org, &[id]).await?.pop())
    }

    pub async fn update_invoice_allocated(
        &mut self,
        invoice: &Invoice,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE invoices SET amount_allocated = $3 WHERE organization_id = $1 AND id = $2",
        )
        .bind(invoice.organization_id.as_uuid())
        .bind(invoice.id.as_uuid())
        .bind(invoice.amount_allocated.amount())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn invoices_for_contact(
        &mut self,
        org: Uuid,
        contact_id: Uuid,
    ) -> Result<Vec<Invoice>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE organization_id = $1 AND contact_id = $2 ORDER BY date DESC"
        ))
        .bind(org)
        .bind(contact_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Payments and allocations
    // ------------------------------------------------------------------

    pub async fn insert_payment(&mut self, payment: &Payment) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.organization_id.as_uuid())
        .bind(payment.contact_id.map(Uuid::from))
        .bind(payment.invoice_id.map(Uuid::from))
        .bind(DbPaymentType::from(payment.payment_type))
        .bind(DbPaymentMethod::from(payment.method))
        .bind(payment.date)
        .bind(payment.amount.amount())
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn find_payment(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Loads a payment and locks it so its allocations are serialized
    pub async fn lock_payment(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE organization_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Payments linked to the contact directly, through `invoice_ids`, or
    /// through `payment_ids`
    pub async fn payments_for_statement(
        &mut self,
        org: Uuid,
        contact_id: Uuid,
        invoice_ids: &[Uuid],
        payment_ids: &[Uuid],
    ) -> Result<Vec<Payment>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE organization_id = $1 \
               AND (contact_id = $2 OR invoice_id = ANY($3) OR id = ANY($4)) \
             ORDER BY created_at"
        ))
        .bind(org)
        .bind(contact_id)
        .bind(invoice_ids)
        .bind(payment_ids)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn insert_allocation(
        &mut self,
        allocation: &PaymentAllocation,
    ) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO payment_allocations ({ALLOCATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(allocation.id.as_uuid())
        .bind(allocation.organization_id.as_uuid())
        .bind(allocation.invoice_id.as_uuid())
        .bind(allocation.payment_id.map(Uuid::from))
        .bind(allocation.retention_id.map(Uuid::from))
        .bind(allocation.amount.amount())
        .bind(&allocation.notes)
        .bind(allocation.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn allocations_for_invoices(
        &mut self,
        org: Uuid,
        invoice_ids: &[Uuid],
    ) -> Result<Vec<PaymentAllocation>, DatabaseError> {
        let rows = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM payment_allocations \
             WHERE organization_id = $1 AND invoice_id = ANY($2) ORDER BY created_at"
        ))
        .bind(org)
        .bind(invoice_ids)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Sum already allocated from one payment
    pub async fn allocated_from_payment(
        &mut self,
        payment_id: Uuid,
    ) -> Result<Money, DatabaseError> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payment_allocations WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(Money::new(total))
    }

    pub async fn retention_is_allocated(
        &mut self,
        retention_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payment_allocations WHERE retention_id = $1)",
        )
        .bind(retention_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Retentions
    // ------------------------------------------------------------------

    pub async fn insert_retention(&mut self, retention: &Retention) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO retentions ({RETENTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(retention.id.as_uuid())
        .bind(retention.organization_id.as_uuid())
        .bind(retention.invoice_id.as_uuid())
        .bind(retention.contact_id.as_uuid())
        .bind(retention.retention_setting_id.as_uuid())
        .bind(&retention.setting_name)
        .bind(&retention.setting_code)
        .bind(retention.base_amount.amount())
        .bind(retention.rate.as_percentage())
        .bind(retention.amount.amount())
        .bind(&retention.certificate_number)
        .bind(retention.certificate_date)
        .bind(retention.journal_entry_id.as_uuid())
        .bind(retention.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn find_retention(
        &mut self,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Retention>, DatabaseError> {
        let row = sqlx::query_as::<_, RetentionRow>(&format!(
            "SELECT {RETENTION_COLUMNS} FROM retentions WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn retentions_for_invoice(
        &mut self,
        org: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Retention>, DatabaseError> {
        let rows = sqlx::query_as::<_, RetentionRow>(&format!(
            "SELECT {RETENTION_COLUMNS} FROM retentions \
             WHERE organization_id = $1 AND invoice_id = $2 ORDER BY created_at"
        ))
        .bind(org)
        .bind(invoice_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    pub async fn insert_purchase_order(
        &mut self,
        order: &PurchaseOrder,
    ) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO purchase_orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(order.id.as_uuid())
        .bind(order.organization_id.as_uuid())
        .bind(order.contact_id.map(Uuid::from))
        .bind(&order.number)
        .bind(order.date)
        .bind(DbPurchaseOrderStatus::from(order.status))
        .bind(order.subtotal.amount())
        .bind(order.vat_rate.as_percentage())
        .bind(order.vat_amount.amount())
        .bind(order.total_amount.amount())
        .bind(order.invoiced_amount.amount())
        .bind(&order.notes)
        .bind(order.created_at)
        .execute(&mut *self.conn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (
                    id, purchase_order_id, organization_id, position,
                    description, quantity, unit_price, line_total
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(order.organization_id.as_uuid())
            .bind(position as i32)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price.amount())
            .bind(item.line_total.amount())
            .execute(&mut *self.conn)
            .await?;
        }
        Ok(())
    }

    /// Loads an order with its items, optionally locking the order row
    pub async fn find_purchase_order(
        &mut self,
        org: Uuid,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<PurchaseOrder>, DatabaseError> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let Some(header) = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders \
             WHERE organization_id = $1 AND id = $2{lock}"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, PurchaseOrderItemRow>(
            r#"
            SELECT id, description, quantity, unit_price, line_total
            FROM purchase_order_items
            WHERE purchase_order_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(Some(header.into_order(items.into_iter().map(Into::into).collect())))
    }

    /// Persists status and invoiced amount
    pub async fn update_purchase_order(
        &mut self,
        order: &PurchaseOrder,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = $3, invoiced_amount = $4
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(order.organization_id.as_uuid())
        .bind(order.id.as_uuid())
        .bind(DbPurchaseOrderStatus::from(order.status))
        .bind(order.invoiced_amount.amount())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
