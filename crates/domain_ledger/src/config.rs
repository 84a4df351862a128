//! Organization accounting configuration
//!
//! Maps semantic roles to accounts so that automatic postings (retentions)
//! know where to debit and credit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{AccountId, OrganizationId};

/// Roles an account can play in automatic postings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Sales,
    SalesVat,
    Receivables,
    Purchases,
    PurchasesVat,
    Payables,
    Cash,
    Bank,
}

impl AccountRole {
    pub const ALL: [AccountRole; 8] = [
        AccountRole::Sales,
        AccountRole::SalesVat,
        AccountRole::Receivables,
        AccountRole::Purchases,
        AccountRole::PurchasesVat,
        AccountRole::Payables,
        AccountRole::Cash,
        AccountRole::Bank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Sales => "sales",
            AccountRole::SalesVat => "sales_vat",
            AccountRole::Receivables => "receivables",
            AccountRole::Purchases => "purchases",
            AccountRole::PurchasesVat => "purchases_vat",
            AccountRole::Payables => "payables",
            AccountRole::Cash => "cash",
            AccountRole::Bank => "bank",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization-scoped singleton mapping roles to accounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountingConfig {
    pub organization_id: OrganizationId,
    pub sales_account_id: Option<AccountId>,
    pub sales_vat_account_id: Option<AccountId>,
    pub receivables_account_id: Option<AccountId>,
    pub purchases_account_id: Option<AccountId>,
    pub purchases_vat_account_id: Option<AccountId>,
    pub payables_account_id: Option<AccountId>,
    pub cash_account_id: Option<AccountId>,
    pub bank_account_id: Option<AccountId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccountingConfig {
    /// Creates an empty configuration for an organization
    pub fn empty(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            ..Default::default()
        }
    }

    /// Account mapped to `role`, if any
    pub fn account_for(&self, role: AccountRole) -> Option<AccountId> {
        match role {
            AccountRole::Sales => self.sales_account_id,
            AccountRole::SalesVat => self.sales_vat_account_id,
            AccountRole::Receivables => self.receivables_account_id,
            AccountRole::Purchases => self.purchases_account_id,
            AccountRole::PurchasesVat => self.purchases_vat_account_id,
            AccountRole::Payables => self.payables_account_id,
            AccountRole::Cash => self.cash_account_id,
            AccountRole::Bank => self.bank_account_id,
        }
    }

    /// Maps `role` to `account`
    pub fn with_role(mut self, role: AccountRole, account: AccountId) -> Self {
        let slot = match role {
            AccountRole::Sales => &mut self.sales_account_id,
            AccountRole::SalesVat => &mut self.sales_vat_account_id,
            AccountRole::Receivables => &mut self.receivables_account_id,
            AccountRole::Purchases => &mut self.purchases_account_id,
            AccountRole::PurchasesVat => &mut self.purchases_vat_account_id,
            AccountRole::Payables => &mut self.payables_account_id,
            AccountRole::Cash => &mut self.cash_account_id,
            AccountRole::Bank => &mut self.bank_account_id,
        };
        *slot = Some(account);
        self
    }

    /// Roles that point at `account`
    pub fn roles_referencing(&self, account: AccountId) -> Vec<AccountRole> {
        AccountRole::ALL
            .into_iter()
            .filter(|role| self.account_for(*role) == Some(account))
            .collect()
    }

    /// Every account the configuration references
    pub fn referenced_accounts(&self) -> Vec<AccountId> {
        AccountRole::ALL
            .into_iter()
            .filter_map(|role| self.account_for(role))
            .collect()
    }
}
