//! Journal entries and lines
//!
//! The journal is append-only: entries are validated once at creation and
//! never updated or deleted. Corrections are posted as reversing entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{AccountId, JournalEntryId, JournalLineId, Money, OrganizationId};

use crate::error::{LedgerError, LedgerResult};

/// Reference type stamped on entries posted by the retention processor
pub const REFERENCE_RETENTION: &str = "retention";
/// Reference type stamped on reversing entries
pub const REFERENCE_REVERSAL: &str = "reversal";

/// A line of a journal entry that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalLine {
    pub account_id: AccountId,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

impl NewJournalLine {
    /// Creates a debit line
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Money::ZERO,
            description: None,
        }
    }

    /// Creates a credit line
    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: Money::ZERO,
            credit: amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A journal entry awaiting validation and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    /// Accounting date
    pub date: NaiveDate,
    pub description: String,
    /// Kind of document that produced the entry (e.g. "retention")
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    /// Ordered lines
    pub lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
            reference_type: None,
            reference_id: None,
            lines: Vec::new(),
        }
    }

    /// Sets the reference
    pub fn with_reference(mut self, reference_type: impl Into<String>, reference_id: Uuid) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id);
        self
    }

    /// Adds a debit line
    pub fn debit(mut self, account_id: AccountId, amount: Money) -> Self {
        self.lines.push(NewJournalLine::debit(account_id, amount));
        self
    }

    /// Adds a credit line
    pub fn credit(mut self, account_id: AccountId, amount: Money) -> Self {
        self.lines.push(NewJournalLine::credit(account_id, amount));
        self
    }

    /// Adds a custom line
    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Sum of debits and sum of credits
    pub fn totals(&self) -> (Money, Money) {
        let debits = self.lines.iter().map(|l| l.debit).sum();
        let credits = self.lines.iter().map(|l| l.credit).sum();
        (debits, credits)
    }

    /// Accounts referenced by the lines, in line order without duplicates
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.account_id) {
                ids.push(line.account_id);
            }
        }
        ids
    }

    /// Checks the entry-level invariants
    ///
    /// Lines with both sides zero or both non-zero are accepted; only the
    /// entry as a whole must balance within the currency tolerance.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.is_empty() {
            return Err(LedgerError::EmptyEntry);
        }

        if let Some(position) = self
            .lines
            .iter()
            .position(|l| l.debit.is_negative() || l.credit.is_negative())
        {
            return Err(LedgerError::NegativeLineAmount { position });
        }

        let (debits, credits) = self.totals();
        if !debits.approx_eq(&credits) {
            return Err(LedgerError::UnbalancedEntry { debits, credits });
        }

        Ok(())
    }

    /// Validates and assigns identifiers
    pub fn into_entry(self, organization_id: OrganizationId) -> LedgerResult<JournalEntry> {
        self.validate()?;

        let entry_id = JournalEntryId::new_v7();
        let lines = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(position, line)| JournalLine {
                id: JournalLineId::new_v7(),
                entry_id,
                account_id: line.account_id,
                position: position as i32,
                debit: line.debit,
                credit: line.credit,
                description: line.description,
            })
            .collect();

        Ok(JournalEntry {
            id: entry_id,
            organization_id,
            date: self.date,
            description: self.description,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            lines,
            created_at: Utc::now(),
        })
    }
}

/// A persisted journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub organization_id: OrganizationId,
    pub date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub lines: Vec<JournalLine>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn total_debits(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credits(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Builds the offsetting entry with debits and credits swapped
    pub fn reversal(&self, date: NaiveDate, reason: &str) -> NewJournalEntry {
        let lines = self
            .lines
            .iter()
            .map(|line| NewJournalLine {
                account_id: line.account_id,
                debit: line.credit,
                credit: line.debit,
                description: Some(format!("Reversal: {reason}")),
            })
            .collect();

        NewJournalEntry {
            date,
            description: format!("Reversal of {}: {}", self.description, reason),
            reference_type: Some(REFERENCE_REVERSAL.to_string()),
            reference_id: Some(*self.id.as_uuid()),
            lines,
        }
    }
}

/// A persisted journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub account_id: AccountId,
    /// Zero-based order within the entry
    pub position: i32,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_balanced_entry() {
        let (a, b) = (AccountId::new(), AccountId::new());
        let entry = NewJournalEntry::new(date(), "Sale")
            .debit(a, Money::new(dec!(100)))
            .credit(b, Money::new(dec!(100)));

        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_tolerance_accepts_one_cent() {
        let (a, b) = (AccountId::new(), AccountId::new());
        let entry = NewJournalEntry::new(date(), "Rounding")
            .debit(a, Money::new(dec!(100.01)))
            .credit(b, Money::new(dec!(100.00)));

        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_unbalanced_entry() {
        let (a, b) = (AccountId::new(), AccountId::new());
        let entry = NewJournalEntry::new(date(), "Unbalanced")
            .debit(a, Money::new(dec!(100)))
            .credit(b, Money::new(dec!(99)));

        assert!(matches!(
            entry.into_entry(OrganizationId::new()),
            Err(LedgerError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn test_empty_and_negative() {
        assert!(matches!(
            NewJournalEntry::new(date(), "Empty").validate(),
            Err(LedgerError::EmptyEntry)
        ));

        let a = AccountId::new();
        let entry = NewJournalEntry::new(date(), "Negative")
            .debit(a, Money::new(dec!(10)))
            .credit(a, Money::new(dec!(-10)));
        assert!(matches!(
            entry.validate(),
            Err(LedgerError::NegativeLineAmount { position: 1 })
        ));
    }

    #[test]
    fn test_both_sided_lines_are_accepted() {
        let a = AccountId::new();
        let entry = NewJournalEntry::new(date(), "Odd but balanced").line(NewJournalLine {
            account_id: a,
            debit: Money::new(dec!(5)),
            credit: Money::new(dec!(5)),
            description: None,
        });

        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_reversal_swaps_sides() {
        let (a, b) = (AccountId::new(), AccountId::new());
        let entry = NewJournalEntry::new(date(), "Sale")
            .debit(a, Money::new(dec!(100)))
            .credit(b, Money::new(dec!(100)))
            .into_entry(OrganizationId::new())
            .unwrap();

        let reversal = entry.reversal(date(), "typo");
        assert_eq!(reversal.lines[0].credit, Money::new(dec!(100)));
        assert_eq!(reversal.lines[1].debit, Money::new(dec!(100)));
        assert_eq!(reversal.reference_type.as_deref(), Some(REFERENCE_REVERSAL));
        assert_eq!(reversal.reference_id, Some(*entry.id.as_uuid()));
        assert!(reversal.validate().is_ok());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use rust_decimal::Decimal;

        proptest! {
            #[test]
            fn entry_balances_iff_totals_within_tolerance(
                debits in prop::collection::vec(0i64..10_000_000i64, 1..6),
                drift in -5i64..5i64
            ) {
                let total: i64 = debits.iter().sum::<i64>() + drift;
                prop_assume!(total >= 0);

                let entry = debits.iter().fold(
                    NewJournalEntry::new(date(), "Generated"),
                    |entry, cents| {
                        entry.debit(AccountId::new(), Money::new(Decimal::new(*cents, 2)))
                    },
                )
                .credit(AccountId::new(), Money::new(Decimal::new(total, 2)));

                prop_assert_eq!(entry.validate().is_ok(), drift.abs() <= 1);
            }

            #[test]
            fn reversal_of_accepted_entry_is_accepted(
                amounts in prop::collection::vec(1i64..10_000_000i64, 1..6)
            ) {
                let cash = AccountId::new();
                let entry = amounts
                    .iter()
                    .fold(NewJournalEntry::new(date(), "Generated"), |entry, cents| {
                        let amount = Money::new(Decimal::new(*cents, 2));
                        entry.debit(cash, amount).credit(AccountId::new(), amount)
                    })
                    .into_entry(OrganizationId::new())
                    .unwrap();

                let reversal = entry.reversal(date(), "generated");
                prop_assert!(reversal.validate().is_ok());
                prop_assert_eq!(reversal.totals(), (entry.total_credits(), entry.total_debits()));
            }
        }
    }
}
