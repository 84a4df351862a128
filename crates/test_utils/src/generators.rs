//! Property-Based Test Generators
//!
//! Proptest strategies that produce ledger data respecting the domain's
//! invariants, plus a couple of `fake` helpers for free-text fields.

use chrono::NaiveDate;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{ContactId, Money, Rate};
use domain_ledger::{AccountType, InvoiceFlow, PaymentMethod};

/// Positive amounts between 0.01 and 10,000,000.00
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..1_000_000_000i64).prop_map(|cents| Money::new(Decimal::new(cents, 2)))
}

/// Non-negative amounts, zero included
pub fn non_negative_money_strategy() -> impl Strategy<Value = Money> {
    (0i64..1_000_000_000i64).prop_map(|cents| Money::new(Decimal::new(cents, 2)))
}

/// Percentages from 0.00% to 100.00%
pub fn rate_strategy() -> impl Strategy<Value = Rate> {
    (0i64..=10_000i64).prop_map(|n| Rate::from_percentage(Decimal::new(n, 2)))
}

pub fn account_type_strategy() -> impl Strategy<Value = AccountType> {
    prop_oneof![
        Just(AccountType::Asset),
        Just(AccountType::Liability),
        Just(AccountType::Equity),
        Just(AccountType::Income),
        Just(AccountType::Expense),
    ]
}

pub fn invoice_flow_strategy() -> impl Strategy<Value = InvoiceFlow> {
    prop_oneof![Just(InvoiceFlow::Sale), Just(InvoiceFlow::Purchase)]
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Check),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Other),
    ]
}

/// Dates within 2024
pub fn date_2024_strategy() -> impl Strategy<Value = NaiveDate> {
    (1u32..=366u32).prop_map(|ordinal| {
        NaiveDate::from_yo_opt(2024, ordinal).expect("2024 is a leap year")
    })
}

pub fn contact_id_strategy() -> impl Strategy<Value = ContactId> {
    any::<u128>().prop_map(|n| ContactId::from_uuid(uuid::Uuid::from_u128(n)))
}

/// Debit/credit amount pairs where both sides sum to the same total
///
/// Debits are drawn freely; credits split the same total into a different
/// number of parts, so line counts on each side differ.
pub fn balanced_sides_strategy() -> impl Strategy<Value = (Vec<Money>, Vec<Money>)> {
    (prop::collection::vec(1i64..1_000_000i64, 1..6), 1usize..6).prop_map(|(debits, parts)| {
        let total: i64 = debits.iter().sum();
        let parts = parts.min(total as usize).max(1);
        let share = total / parts as i64;
        let mut credits = vec![share; parts];
        credits[0] += total - share * parts as i64;

        let to_money = |cents: &i64| Money::new(Decimal::new(*cents, 2));
        (
            debits.iter().map(to_money).collect(),
            credits.iter().map(to_money).collect(),
        )
    })
}

/// An invoice total with allocation amounts that never exceed it in sum
pub fn allocations_within_strategy() -> impl Strategy<Value = (Money, Vec<Money>)> {
    (100i64..10_000_000i64, prop::collection::vec(1u32..100u32, 1..8)).prop_map(
        |(total, weights)| {
            let weight_sum: i64 = weights.iter().map(|w| *w as i64).sum();
            let parts = weights
                .iter()
                .map(|w| Money::new(Decimal::new(total * *w as i64 / weight_sum, 2)))
                .filter(|m| m.is_positive())
                .collect();
            (Money::new(Decimal::new(total, 2)), parts)
        },
    )
}

/// Short free-text description
pub fn fake_description() -> String {
    Sentence(2..5).fake()
}

/// Bank-style payment reference, e.g. `TRF-048213`
pub fn fake_reference() -> String {
    format!("TRF-{:06}", (0..1_000_000u32).fake::<u32>())
}
