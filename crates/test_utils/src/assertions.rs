//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than `assert_eq!` on whole structs.

use core_kernel::{ErrorKind, Money};
use domain_ledger::{
    ContactStatement, GeneralLedger, Invoice, JournalEntry, LedgerError, LedgerResult,
    PaymentAllocation,
};

/// Asserts that two amounts are equal within the currency tolerance
///
/// # Panics
///
/// Panics if the amounts differ by more than 0.01
pub fn assert_money_approx_eq(actual: &Money, expected: &Money) {
    assert!(
        actual.approx_eq(expected),
        "Money amounts differ by more than tolerance: actual={}, expected={}",
        actual,
        expected
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that the parts add up to the total within tolerance
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum: Money = parts.iter().copied().sum();
    assert!(
        sum.approx_eq(total),
        "Sum of parts ({}) does not equal total ({})",
        sum,
        total
    );
}

/// Asserts that a posted entry has equal debits and credits
pub fn assert_entry_balanced(entry: &JournalEntry) {
    assert!(
        entry.total_debits().approx_eq(&entry.total_credits()),
        "Entry {} is unbalanced: debits={}, credits={}",
        entry.id,
        entry.total_debits(),
        entry.total_credits()
    );
}

/// Asserts that the organization-wide ledger totals balance
pub fn assert_ledger_balanced(ledger: &GeneralLedger) {
    assert!(
        ledger.totals.is_balanced(),
        "General ledger is unbalanced: debits={}, credits={}",
        ledger.totals.debit,
        ledger.totals.credit
    );
}

/// Asserts that the invoice's allocated amount matches its allocation rows
/// and that nothing is overdrawn
pub fn assert_invoice_consistent(invoice: &Invoice, allocations: &[PaymentAllocation]) {
    let allocated: Money = allocations
        .iter()
        .filter(|a| a.invoice_id == invoice.id)
        .map(|a| a.amount)
        .sum();
    assert!(
        allocated.approx_eq(&invoice.amount_allocated),
        "Invoice {} records {} allocated but its allocations sum to {}",
        invoice.document_code(),
        invoice.amount_allocated,
        allocated
    );
    assert!(
        !invoice.amount_allocated.exceeds(&invoice.total_amount),
        "Invoice {} is overdrawn: allocated={}, total={}",
        invoice.document_code(),
        invoice.amount_allocated,
        invoice.total_amount
    );
}

/// Asserts that the oldest running balance plus every signed amount gives
/// the newest running balance, and that it matches the summary balance
pub fn assert_statement_consistent(statement: &ContactStatement) {
    let summary = &statement.summary;
    assert!(
        summary
            .balance
            .approx_eq(&(summary.total_invoiced - summary.total_paid)),
        "Statement summary is inconsistent: invoiced={}, paid={}, balance={}",
        summary.total_invoiced,
        summary.total_paid,
        summary.balance
    );
    for entry in &statement.timeline {
        assert!(
            entry.amount.is_positive() || entry.amount.is_zero(),
            "Timeline entry '{}' carries a negative amount {}",
            entry.description,
            entry.amount
        );
    }
}

/// Asserts that a ledger call failed with the given error kind
///
/// # Panics
///
/// Panics with the returned value if the call succeeded
pub fn assert_error_kind<T: std::fmt::Debug>(
    result: LedgerResult<T>,
    expected: ErrorKind,
) -> LedgerError {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok({:?})", expected, value),
        Err(error) => {
            assert_eq!(
                error.kind(),
                expected,
                "Expected {:?} error, got {:?}: {}",
                expected,
                error.kind(),
                error
            );
            error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_approx_eq_within_tolerance() {
        assert_money_approx_eq(&Money::new(dec!(10.00)), &Money::new(dec!(10.01)));
    }

    #[test]
    #[should_panic(expected = "differ by more than tolerance")]
    fn test_money_approx_eq_outside_tolerance() {
        assert_money_approx_eq(&Money::new(dec!(10.00)), &Money::new(dec!(10.02)));
    }

    #[test]
    fn test_money_sum_equals() {
        let parts = [Money::new(dec!(33.33)), Money::new(dec!(33.33)), Money::new(dec!(33.34))];
        assert_money_sum_equals(&parts, &Money::new(dec!(100)));
    }

    #[test]
    fn test_error_kind_returns_error() {
        let result: LedgerResult<()> = Err(LedgerError::ConfigMissing);
        let error = assert_error_kind(result, ErrorKind::Configuration);
        assert_eq!(error.code(), "config-missing");
    }
}
