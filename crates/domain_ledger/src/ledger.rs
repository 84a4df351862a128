//! Ledger aggregation
//!
//! Every view here is recomputed from raw journal lines on each call; nothing
//! is cached between calls, so two reads without intervening writes are
//! identical.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{AccountId, JournalEntryId, Money};

use crate::account::{Account, AccountType};
use crate::journal::JournalEntry;

/// Debit and credit totals posted to one account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountActivity {
    pub account: Account,
    pub debit: Money,
    pub credit: Money,
}

/// Sums the lines of `entries` per account
///
/// Every account of `accounts` appears in the result, with zero totals when
/// nothing was posted to it. Lines pointing at unknown accounts are ignored.
pub fn aggregate<'a>(
    accounts: &[Account],
    entries: impl IntoIterator<Item = &'a JournalEntry>,
) -> Vec<AccountActivity> {
    let mut totals: HashMap<AccountId, (Money, Money)> = HashMap::new();
    for line in entries.into_iter().flat_map(|e| e.lines.iter()) {
        let slot = totals.entry(line.account_id).or_default();
        slot.0 += line.debit;
        slot.1 += line.credit;
    }

    accounts
        .iter()
        .map(|account| {
            let (debit, credit) = totals.get(&account.id).copied().unwrap_or_default();
            AccountActivity {
                account: account.clone(),
                debit,
                credit,
            }
        })
        .collect()
}

/// One account row of the general ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccountRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit: Money,
    pub credit: Money,
    /// Natural balance under the account type's sign convention
    pub balance: Money,
}

/// Organization-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub debit: Money,
    pub credit: Money,
}

impl LedgerTotals {
    pub fn is_balanced(&self) -> bool {
        self.debit.approx_eq(&self.credit)
    }
}

/// Per-account debit, credit and balance, ordered by account code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedger {
    pub accounts: Vec<LedgerAccountRow>,
    pub totals: LedgerTotals,
}

impl GeneralLedger {
    pub fn from_activity(activity: Vec<AccountActivity>) -> Self {
        let mut totals = LedgerTotals::default();
        let mut accounts: Vec<LedgerAccountRow> = activity
            .into_iter()
            .map(|a| {
                totals.debit += a.debit;
                totals.credit += a.credit;
                LedgerAccountRow {
                    account_id: a.account.id,
                    balance: a.account.account_type.balance(a.debit, a.credit),
                    code: a.account.code,
                    name: a.account.name,
                    account_type: a.account.account_type,
                    debit: a.debit,
                    credit: a.credit,
                }
            })
            .collect();

        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        Self { accounts, totals }
    }

    /// Row for a single account
    pub fn row(&self, account_id: AccountId) -> Option<&LedgerAccountRow> {
        self.accounts.iter().find(|r| r.account_id == account_id)
    }
}

/// A journal line posted to one account, with its entry's header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub entry_id: JournalEntryId,
    pub date: NaiveDate,
    /// Line description, falling back to the entry description
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub position: i32,
    pub entry_created_at: DateTime<Utc>,
}

/// Collects the postings of `entries` that touch `account_id`
pub fn postings_for<'a>(
    account_id: AccountId,
    entries: impl IntoIterator<Item = &'a JournalEntry>,
) -> Vec<LedgerPosting> {
    entries
        .into_iter()
        .flat_map(|entry| {
            entry
                .lines
                .iter()
                .filter(move |line| line.account_id == account_id)
                .map(move |line| LedgerPosting {
                    entry_id: entry.id,
                    date: entry.date,
                    description: line
                        .description
                        .clone()
                        .unwrap_or_else(|| entry.description.clone()),
                    debit: line.debit,
                    credit: line.credit,
                    position: line.position,
                    entry_created_at: entry.created_at,
                })
        })
        .collect()
}

/// A posting with the account balance after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedgerRow {
    #[serde(flatten)]
    pub posting: LedgerPosting,
    pub balance: Money,
}

/// Postings of a single account in date order with a running balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLedger {
    pub account: Account,
    pub rows: Vec<AccountLedgerRow>,
    pub debit: Money,
    pub credit: Money,
    pub balance: Money,
}

impl AccountLedger {
    pub fn build(account: Account, mut postings: Vec<LedgerPosting>) -> Self {
        postings.sort_by(|a, b| {
            (a.date, a.entry_created_at, a.position).cmp(&(b.date, b.entry_created_at, b.position))
        });

        let account_type = account.account_type;
        let mut debit = Money::ZERO;
        let mut credit = Money::ZERO;
        let rows = postings
            .into_iter()
            .map(|posting| {
                debit += posting.debit;
                credit += posting.credit;
                AccountLedgerRow {
                    posting,
                    balance: account_type.balance(debit, credit),
                }
            })
            .collect();

        Self {
            account,
            rows,
            debit,
            credit,
            balance: account_type.balance(debit, credit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use crate::journal::NewJournalEntry;
    use core_kernel::OrganizationId;
    use rust_decimal_macros::dec;

    fn setup() -> (OrganizationId, Account, Account) {
        let org = OrganizationId::new();
        let cash = Account::from_new(org, NewAccount::new("1.1.01", "Cash", AccountType::Asset));
        let sales = Account::from_new(org, NewAccount::new("4.1.01", "Sales", AccountType::Income));
        (org, cash, sales)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_general_ledger_sign_and_order() {
        let (org, cash, sales) = setup();
        let entry = NewJournalEntry::new(day(1), "Cash sale")
            .debit(cash.id, Money::new(dec!(100)))
            .credit(sales.id, Money::new(dec!(100)))
            .into_entry(org)
            .unwrap();

        let activity = aggregate(&[sales.clone(), cash.clone()], [&entry]);
        let ledger = GeneralLedger::from_activity(activity);

        assert_eq!(ledger.accounts[0].code, "1.1.01");
        assert_eq!(ledger.row(cash.id).unwrap().balance.amount(), dec!(100));
        assert_eq!(ledger.row(sales.id).unwrap().balance.amount(), dec!(100));
        assert_eq!(ledger.totals.debit, ledger.totals.credit);
    }

    #[test]
    fn test_accounts_without_activity_are_listed() {
        let (_, cash, sales) = setup();
        let activity = aggregate(&[cash, sales], &Vec::<JournalEntry>::new());
        let ledger = GeneralLedger::from_activity(activity);

        assert_eq!(ledger.accounts.len(), 2);
        assert!(ledger.accounts.iter().all(|r| r.balance.is_zero()));
        assert!(ledger.totals.is_balanced());
    }

    #[test]
    fn test_account_ledger_running_balance() {
        let (org, cash, sales) = setup();
        let later = NewJournalEntry::new(day(9), "Refund")
            .debit(sales.id, Money::new(dec!(40)))
            .credit(cash.id, Money::new(dec!(40)))
            .into_entry(org)
            .unwrap();
        let earlier = NewJournalEntry::new(day(2), "Sale")
            .debit(cash.id, Money::new(dec!(100)))
            .credit(sales.id, Money::new(dec!(100)))
            .into_entry(org)
            .unwrap();

        let ledger = AccountLedger::build(cash.clone(), postings_for(cash.id, [&later, &earlier]));

        let balances: Vec<_> = ledger.rows.iter().map(|r| r.balance.amount()).collect();
        assert_eq!(balances, vec![dec!(100), dec!(60)]);
        assert_eq!(ledger.balance.amount(), dec!(60));
        assert_eq!(ledger.rows[1].posting.description, "Refund");
    }
}
