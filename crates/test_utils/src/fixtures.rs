//! Pre-built Test Fixtures
//!
//! Ready-to-use amounts, dates and identifiers, plus a seeded set of books
//! (standard chart, accounting configuration and one retention setting) that
//! any ledger store can be primed with.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use core_kernel::{AccountId, ContactId, Money, OrganizationId, Rate};
use domain_ledger::{
    AccountRole, AccountingConfig, InvoiceFlow, LedgerPort, LedgerResult, NewRetentionSetting,
    RetentionSetting, StandardChart,
};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn hundred() -> Money {
        Money::new(dec!(100.00))
    }

    /// Typical invoice total
    pub fn invoice_total() -> Money {
        Money::new(dec!(1000.00))
    }

    /// Exactly the comparison tolerance
    pub fn tolerance() -> Money {
        Money::new(dec!(0.01))
    }

    pub fn zero() -> Money {
        Money::ZERO
    }
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// August 2024, day `d`
    pub fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).expect("valid fixture date")
    }

    pub fn period_start() -> NaiveDate {
        Self::day(1)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn organization_id() -> OrganizationId {
        OrganizationId::new()
    }

    pub fn contact_id() -> ContactId {
        ContactId::new()
    }
}

/// Account codes of the seeded books
pub mod codes {
    pub const CASH: &str = "1.1.01";
    pub const BANK: &str = "1.1.02";
    pub const RECEIVABLES: &str = "1.1.03";
    pub const RETENTIONS_RECEIVABLE: &str = "1.1.04";
    pub const VAT_CREDIT: &str = "1.1.05";
    pub const PAYABLES: &str = "2.1.01";
    pub const RETENTIONS_PAYABLE: &str = "2.1.02";
    pub const VAT_PAYABLE: &str = "2.1.03";
    pub const CAPITAL: &str = "3.1.01";
    pub const SALES: &str = "4.1.01";
    pub const PURCHASES: &str = "5.1.01";
    pub const EXPENSES: &str = "5.1.02";
}

/// Books seeded into a store by [`seed_books`]
#[derive(Debug, Clone)]
pub struct SeededBooks {
    pub organization_id: OrganizationId,
    pub accounts: HashMap<String, AccountId>,
    pub config: AccountingConfig,
    /// Gross income retention at 3%, valid for both flows
    pub retention_setting: RetentionSetting,
}

impl SeededBooks {
    /// Account id by code
    ///
    /// # Panics
    ///
    /// Panics if the code was not seeded
    pub fn account(&self, code: &str) -> AccountId {
        *self
            .accounts
            .get(code)
            .unwrap_or_else(|| panic!("account {code} was not seeded"))
    }
}

/// Creates the standard chart, a full accounting configuration and one
/// retention setting for `org`
pub async fn seed_books<P>(store: &P, org: OrganizationId) -> LedgerResult<SeededBooks>
where
    P: LedgerPort + ?Sized,
{
    let mut accounts = HashMap::new();

    for group in StandardChart::groups() {
        let account = store.create_account(org, group).await?;
        accounts.insert(account.code.clone(), account.id);
    }
    for (group_code, leaf) in StandardChart::leaves() {
        let parent = accounts[group_code];
        let account = store.create_account(org, leaf.with_parent(parent)).await?;
        accounts.insert(account.code.clone(), account.id);
    }

    let roles = [
        (AccountRole::Sales, codes::SALES),
        (AccountRole::SalesVat, codes::VAT_PAYABLE),
        (AccountRole::Receivables, codes::RECEIVABLES),
        (AccountRole::Purchases, codes::PURCHASES),
        (AccountRole::PurchasesVat, codes::VAT_CREDIT),
        (AccountRole::Payables, codes::PAYABLES),
        (AccountRole::Cash, codes::CASH),
        (AccountRole::Bank, codes::BANK),
    ];
    let config = roles
        .into_iter()
        .fold(AccountingConfig::empty(org), |config, (role, code)| {
            config.with_role(role, accounts[code])
        });
    let config = store.save_accounting_config(org, config).await?;

    let retention_setting = store
        .create_retention_setting(
            org,
            NewRetentionSetting {
                name: "Gross income".into(),
                code: "IIBB".into(),
                applies_to: None,
                default_rate: Some(Rate::from_percentage(dec!(3))),
                receivable_account_id: Some(accounts[codes::RETENTIONS_RECEIVABLE]),
                payable_account_id: Some(accounts[codes::RETENTIONS_PAYABLE]),
            },
        )
        .await?;

    Ok(SeededBooks {
        organization_id: org,
        accounts,
        config,
        retention_setting,
    })
}

/// A sale-only retention setting request
pub fn sale_only_setting(books: &SeededBooks) -> NewRetentionSetting {
    NewRetentionSetting {
        name: "VAT withholding".into(),
        code: "IVA".into(),
        applies_to: Some(InvoiceFlow::Sale),
        default_rate: None,
        receivable_account_id: Some(books.account(codes::RETENTIONS_RECEIVABLE)),
        payable_account_id: None,
    }
}
