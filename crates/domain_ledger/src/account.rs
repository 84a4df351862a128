//! Chart of accounts
//!
//! Accounts form a tree per organization. Balances are never stored on the
//! account; they are derived from journal lines using the sign convention of
//! [`AccountType::sign`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, CoreError, Money, OrganizationId};

use crate::config::AccountRole;
use crate::error::{LedgerError, LedgerResult};

/// Types of accounts in the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Asset accounts (debit normal balance)
    Asset,
    /// Liability accounts (credit normal balance)
    Liability,
    /// Equity accounts (credit normal balance)
    Equity,
    /// Income accounts (credit normal balance)
    Income,
    /// Expense accounts (debit normal balance)
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Income,
        AccountType::Expense,
    ];

    /// Returns true if this account type has a debit normal balance
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Multiplier applied to `debit - credit` to obtain the natural balance
    pub fn sign(&self) -> Decimal {
        if self.is_debit_normal() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        }
    }

    /// Natural balance of an account of this type given its debit and credit totals
    pub fn balance(&self, debit: Money, credit: Money) -> Money {
        Money::new((debit - credit).amount() * self.sign())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::validation(format!("unknown account type: {s}")))
    }
}

/// An account in the chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Account code (e.g., "1.1.01"), unique per organization
    pub code: String,
    /// Account name
    pub name: String,
    /// Account type
    pub account_type: AccountType,
    /// Parent account ID (for hierarchical charts)
    pub parent_id: Option<AccountId>,
    /// Description
    pub description: Option<String>,
    /// Whether account is active
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Materializes a validated account for an organization
    pub fn from_new(organization_id: OrganizationId, new: NewAccount) -> Self {
        Self {
            id: AccountId::new_v7(),
            organization_id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            account_type: new.account_type,
            parent_id: new.parent_id,
            description: new.description,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Request to create an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<AccountId>,
    pub description: Option<String>,
}

impl NewAccount {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id: None,
            description: None,
        }
    }

    /// Sets the parent account
    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks required fields
    pub fn validate(&self) -> LedgerResult<()> {
        if self.code.trim().is_empty() {
            return Err(LedgerError::MissingField("code"));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        Ok(())
    }
}

/// Partial update of an account
///
/// `parent_id: Some(None)` detaches the account from its parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub parent_id: Option<Option<AccountId>>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl AccountUpdate {
    /// Returns true when the update changes the code or type of `current`
    pub fn changes_identity(&self, current: &Account) -> bool {
        let code_changed = self
            .code
            .as_deref()
            .is_some_and(|code| code.trim() != current.code);
        let type_changed = self
            .account_type
            .is_some_and(|account_type| account_type != current.account_type);
        code_changed || type_changed
    }
}

/// Why an account counts as in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageReason {
    /// Journal lines post to the account
    JournalLines,
    /// Other accounts hang below it
    Children,
    /// The accounting configuration maps a role to it
    AccountingConfig,
    /// A retention setting posts to it
    RetentionSetting,
}

impl UsageReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageReason::JournalLines => "journal_lines",
            UsageReason::Children => "children",
            UsageReason::AccountingConfig => "accounting_config",
            UsageReason::RetentionSetting => "retention_setting",
        }
    }
}

impl fmt::Display for UsageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that references an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUsage {
    /// Number of journal lines posted to the account
    pub journal_lines: u64,
    /// Number of direct children
    pub children: u64,
    /// Accounting config roles mapped to the account
    pub config_roles: Vec<AccountRole>,
    /// Number of retention settings posting to the account
    pub retention_settings: u64,
}

impl AccountUsage {
    /// The single in-use predicate shared by deletion, code/type changes and
    /// the public in-use check
    pub fn verdict(&self) -> UsageVerdict {
        let reason = if self.journal_lines > 0 {
            Some(UsageReason::JournalLines)
        } else if self.children > 0 {
            Some(UsageReason::Children)
        } else if !self.config_roles.is_empty() {
            Some(UsageReason::AccountingConfig)
        } else if self.retention_settings > 0 {
            Some(UsageReason::RetentionSetting)
        } else {
            None
        };

        UsageVerdict {
            in_use: reason.is_some(),
            reason,
        }
    }

    /// Fails with `AccountInUse` when the account is referenced
    pub fn ensure_unused(&self, account_id: AccountId) -> LedgerResult<()> {
        match self.verdict().reason {
            Some(reason) => Err(LedgerError::AccountInUse { account_id, reason }),
            None => Ok(()),
        }
    }
}

/// Outcome of the in-use check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageVerdict {
    pub in_use: bool,
    pub reason: Option<UsageReason>,
}

/// Returns true if making `new_parent` the parent of `account_id` closes a loop
pub fn would_create_cycle(
    accounts: &[Account],
    account_id: AccountId,
    new_parent: AccountId,
) -> bool {
    let parents: HashMap<AccountId, Option<AccountId>> =
        accounts.iter().map(|a| (a.id, a.parent_id)).collect();

    let mut visited = HashSet::new();
    let mut cursor = Some(new_parent);
    while let Some(current) = cursor {
        if current == account_id {
            return true;
        }
        if !visited.insert(current) {
            // pre-existing loop that does not involve this account
            return false;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    false
}

/// Validates and applies an update against the organization's chart
///
/// `accounts` is the full chart of the organization, `usage` the usage of
/// `current`.
pub fn apply_account_update(
    current: &Account,
    update: AccountUpdate,
    usage: &AccountUsage,
    accounts: &[Account],
) -> LedgerResult<Account> {
    if update.changes_identity(current) {
        usage.ensure_unused(current.id)?;
    }

    let mut updated = current.clone();

    if let Some(code) = update.code {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(LedgerError::MissingField("code"));
        }
        if accounts.iter().any(|a| a.id != current.id && a.code == code) {
            return Err(LedgerError::DuplicateAccountCode(code));
        }
        updated.code = code;
    }

    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        updated.name = name;
    }

    if let Some(account_type) = update.account_type {
        updated.account_type = account_type;
    }

    if let Some(parent_id) = update.parent_id {
        if let Some(parent) = parent_id {
            if !accounts.iter().any(|a| a.id == parent) {
                return Err(LedgerError::AccountNotFound(parent));
            }
            if would_create_cycle(accounts, current.id, parent) {
                return Err(LedgerError::AccountCycle(current.id));
            }
        }
        updated.parent_id = parent_id;
    }

    if let Some(description) = update.description {
        updated.description = description;
    }
    if let Some(is_active) = update.is_active {
        updated.is_active = is_active;
    }

    Ok(updated)
}

/// A node of the chart-of-accounts tree
#[derive(Debug, Clone, Serialize)]
pub struct ChartNode {
    pub account: Account,
    pub children: Vec<ChartNode>,
}

/// Builds the chart tree from parent links, siblings ordered by code
///
/// Accounts whose parent is missing from `accounts` become roots.
pub fn build_chart(accounts: Vec<Account>) -> Vec<ChartNode> {
    let ids: HashSet<AccountId> = accounts.iter().map(|a| a.id).collect();
    let mut by_parent: HashMap<Option<AccountId>, Vec<Account>> = HashMap::new();
    for account in accounts {
        let parent = account.parent_id.filter(|p| ids.contains(p));
        by_parent.entry(parent).or_default().push(account);
    }

    fn attach(
        parent: Option<AccountId>,
        by_parent: &mut HashMap<Option<AccountId>, Vec<Account>>,
    ) -> Vec<ChartNode> {
        let mut level = by_parent.remove(&parent).unwrap_or_default();
        level.sort_by(|a, b| a.code.cmp(&b.code));
        level
            .into_iter()
            .map(|account| {
                let children = attach(Some(account.id), by_parent);
                ChartNode { account, children }
            })
            .collect()
    }

    attach(None, &mut by_parent)
}

/// Standard chart of accounts for a small business
pub struct StandardChart;

impl StandardChart {
    /// Top-level groups, to be created first
    pub fn groups() -> Vec<NewAccount> {
        vec![
            NewAccount::new("1", "Assets", AccountType::Asset),
            NewAccount::new("2", "Liabilities", AccountType::Liability),
            NewAccount::new("3", "Equity", AccountType::Equity),
            NewAccount::new("4", "Income", AccountType::Income),
            NewAccount::new("5", "Expenses", AccountType::Expense),
        ]
    }

    /// Leaf accounts as `(group code, account)` pairs
    pub fn leaves() -> Vec<(&'static str, NewAccount)> {
        vec![
            ("1", NewAccount::new("1.1.01", "Cash", AccountType::Asset)),
            ("1", NewAccount::new("1.1.02", "Bank", AccountType::Asset)),
            ("1", NewAccount::new("1.1.03", "Accounts Receivable", AccountType::Asset)),
            ("1", NewAccount::new("1.1.04", "Retentions Receivable", AccountType::Asset)),
            ("1", NewAccount::new("1.1.05", "VAT Credit", AccountType::Asset)),
            ("2", NewAccount::new("2.1.01", "Accounts Payable", AccountType::Liability)),
            ("2", NewAccount::new("2.1.02", "Retentions Payable", AccountType::Liability)),
            ("2", NewAccount::new("2.1.03", "VAT Payable", AccountType::Liability)),
            ("3", NewAccount::new("3.1.01", "Capital", AccountType::Equity)),
            ("3", NewAccount::new("3.1.02", "Retained Earnings", AccountType::Equity)),
            ("4", NewAccount::new("4.1.01", "Sales", AccountType::Income)),
            ("5", NewAccount::new("5.1.01", "Purchases", AccountType::Expense)),
            ("5", NewAccount::new("5.1.02", "Operating Expenses", AccountType::Expense)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(code: &str, parent: Option<AccountId>) -> Account {
        let mut account = Account::from_new(
            OrganizationId::new(),
            NewAccount::new(code, code, AccountType::Asset),
        );
        account.parent_id = parent;
        account
    }

    #[test]
    fn test_sign_convention() {
        let debit = Money::new(dec!(100));
        let credit = Money::new(dec!(30));

        assert_eq!(AccountType::Asset.balance(debit, credit).amount(), dec!(70));
        assert_eq!(AccountType::Expense.balance(debit, credit).amount(), dec!(70));
        assert_eq!(AccountType::Liability.balance(debit, credit).amount(), dec!(-70));
        assert_eq!(AccountType::Equity.balance(debit, credit).amount(), dec!(-70));
        assert_eq!(AccountType::Income.balance(credit, debit).amount(), dec!(70));
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("income".parse::<AccountType>().unwrap(), AccountType::Income);
        assert_eq!("ASSET".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert!("REVENUE".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_usage_priority() {
        let usage = AccountUsage {
            journal_lines: 0,
            children: 2,
            config_roles: vec![AccountRole::Cash],
            retention_settings: 0,
        };
        let verdict = usage.verdict();
        assert!(verdict.in_use);
        assert_eq!(verdict.reason, Some(UsageReason::Children));

        assert!(!AccountUsage::default().verdict().in_use);
    }

    #[test]
    fn test_cycle_detection() {
        let root = account("1", None);
        let child = account("1.1", Some(root.id));
        let grandchild = account("1.1.1", Some(child.id));
        let chart = vec![root.clone(), child.clone(), grandchild.clone()];

        assert!(would_create_cycle(&chart, root.id, grandchild.id));
        assert!(would_create_cycle(&chart, root.id, root.id));
        assert!(!would_create_cycle(&chart, grandchild.id, root.id));
    }

    #[test]
    fn test_update_rejects_code_change_when_in_use() {
        let current = account("1.1", None);
        let usage = AccountUsage {
            journal_lines: 1,
            ..Default::default()
        };
        let update = AccountUpdate {
            code: Some("9.9".into()),
            ..Default::default()
        };

        let result = apply_account_update(&current, update, &usage, &[current.clone()]);
        assert!(matches!(
            result,
            Err(LedgerError::AccountInUse { reason: UsageReason::JournalLines, .. })
        ));
    }

    #[test]
    fn test_update_allows_rename_when_in_use() {
        let current = account("1.1", None);
        let usage = AccountUsage {
            journal_lines: 1,
            ..Default::default()
        };
        let update = AccountUpdate {
            name: Some("Petty cash".into()),
            code: Some("1.1".into()),
            ..Default::default()
        };

        let updated = apply_account_update(&current, update, &usage, &[current.clone()]).unwrap();
        assert_eq!(updated.name, "Petty cash");
    }

    #[test]
    fn test_build_chart_orders_by_code() {
        let root = account("1", None);
        let b = account("1.2", Some(root.id));
        let a = account("1.1", Some(root.id));
        let other = account("0", None);

        let chart = build_chart(vec![b, root, a, other]);
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].account.code, "0");
        let codes: Vec<_> = chart[1].children.iter().map(|n| n.account.code.as_str()).collect();
        assert_eq!(codes, vec!["1.1", "1.2"]);
    }
}
