//! Integration tests for domain_ledger against the in-memory store

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, ContactId, ErrorKind, InvoiceId, Money, OrganizationId, Rate};

use domain_ledger::adapters::InMemoryLedgerStore;
use domain_ledger::{
    AccountRole, AccountType, AccountUpdate, AccountingConfig, AllocationSource, Certificate,
    InvoiceFlow, InvoiceStatus, LedgerError, LedgerPort, LedgerPortExt, NewAccount,
    NewAllocation, NewInvoice, NewJournalEntry, NewPayment, NewPurchaseOrder,
    NewPurchaseOrderItem, NewRetentionSetting, PaymentMethod, PaymentType, PurchaseOrderStatus,
    RetentionRequest, TimelineKind, UsageReason,
};

fn money(amount: Decimal) -> Money {
    Money::new(amount)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
}

struct Books {
    store: InMemoryLedgerStore,
    org: OrganizationId,
    cash: AccountId,
    receivables: AccountId,
    payables: AccountId,
    sales: AccountId,
    retention_receivable: AccountId,
    retention_payable: AccountId,
}

async fn create(
    store: &InMemoryLedgerStore,
    org: OrganizationId,
    code: &str,
    name: &str,
    account_type: AccountType,
) -> AccountId {
    store
        .create_account(org, NewAccount::new(code, name, account_type))
        .await
        .unwrap()
        .id
}

async fn books() -> Books {
    let store = InMemoryLedgerStore::new();
    let org = OrganizationId::new();

    let cash = create(&store, org, "1.1.01", "Cash", AccountType::Asset).await;
    let receivables =
        create(&store, org, "1.1.03", "Accounts Receivable", AccountType::Asset).await;
    let retention_receivable =
        create(&store, org, "1.1.04", "Retentions Receivable", AccountType::Asset).await;
    let payables = create(&store, org, "2.1.01", "Accounts Payable", AccountType::Liability).await;
    let retention_payable =
        create(&store, org, "2.1.02", "Retentions Payable", AccountType::Liability).await;
    let sales = create(&store, org, "4.1.01", "Sales", AccountType::Income).await;

    store
        .save_accounting_config(
            org,
            AccountingConfig::empty(org)
                .with_role(AccountRole::Cash, cash)
                .with_role(AccountRole::Receivables, receivables)
                .with_role(AccountRole::Payables, payables)
                .with_role(AccountRole::Sales, sales),
        )
        .await
        .unwrap();

    Books {
        store,
        org,
        cash,
        receivables,
        payables,
        sales,
        retention_receivable,
        retention_payable,
    }
}

fn new_invoice(
    contact: Option<ContactId>,
    flow: InvoiceFlow,
    total: Decimal,
    date: NaiveDate,
) -> NewInvoice {
    NewInvoice {
        contact_id: contact,
        purchase_order_id: None,
        flow,
        letter: "A".into(),
        point_of_sale: 1,
        number: 1,
        date,
        net_amount: money(total),
        vat_amount: Money::ZERO,
    }
}

async fn retention_setting(b: &Books) -> domain_ledger::RetentionSetting {
    b.store
        .create_retention_setting(
            b.org,
            NewRetentionSetting {
                name: "Gross income".into(),
                code: "IIBB".into(),
                applies_to: None,
                default_rate: None,
                receivable_account_id: Some(b.retention_receivable),
                payable_account_id: Some(b.retention_payable),
            },
        )
        .await
        .unwrap()
}

fn retention_request(
    invoice_id: InvoiceId,
    setting: &domain_ledger::RetentionSetting,
) -> RetentionRequest {
    RetentionRequest {
        invoice_id,
        retention_setting_id: setting.id,
        base_amount: money(dec!(1000)),
        rate: Some(Rate::from_percentage(dec!(3))),
        amount: None,
        certificate: Some(Certificate {
            number: "0001-00000123".into(),
            date: Some(day(10)),
        }),
        date: Some(day(10)),
        notes: None,
    }
}

// ============================================================================
// Journal and ledger
// ============================================================================

mod journal_tests {
    use super::*;

    #[tokio::test]
    async fn test_balanced_entry_shows_in_ledger() {
        let b = books().await;
        b.store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Cash sale")
                    .debit(b.cash, money(dec!(100)))
                    .credit(b.sales, money(dec!(100))),
            )
            .await
            .unwrap();

        let ledger = b.store.general_ledger(b.org).await.unwrap();
        let cash = ledger.row(b.cash).unwrap();
        let sales = ledger.row(b.sales).unwrap();

        assert_eq!(cash.debit.amount(), dec!(100));
        assert_eq!(sales.credit.amount(), dec!(100));
        assert_eq!(sales.balance.amount(), dec!(100));
        assert_eq!(ledger.totals.debit, ledger.totals.credit);
    }

    #[tokio::test]
    async fn test_unbalanced_entry_persists_nothing() {
        let b = books().await;
        let result = b
            .store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Typo")
                    .debit(b.cash, money(dec!(100)))
                    .credit(b.sales, money(dec!(99))),
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, LedgerError::UnbalancedEntry { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(b.store.list_journal_entries(b.org).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let b = books().await;
        let result = b
            .store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Ghost")
                    .debit(AccountId::new(), money(dec!(10)))
                    .credit(b.sales, money(dec!(10))),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_ledger_reads_are_idempotent() {
        let b = books().await;
        b.store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(2), "Sale on credit")
                    .debit(b.receivables, money(dec!(250.50)))
                    .credit(b.sales, money(dec!(250.50))),
            )
            .await
            .unwrap();

        let first = b.store.general_ledger(b.org).await.unwrap();
        let second = b.store.general_ledger(b.org).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reversal_zeroes_balances() {
        let b = books().await;
        let entry = b
            .store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Cash sale")
                    .debit(b.cash, money(dec!(80)))
                    .credit(b.sales, money(dec!(80))),
            )
            .await
            .unwrap();

        let reversal = b
            .store
            .reverse_journal_entry(b.org, entry.id, day(3), "wrong customer")
            .await
            .unwrap();
        assert_ne!(reversal.id, entry.id);

        let ledger = b.store.general_ledger(b.org).await.unwrap();
        assert!(ledger.row(b.cash).unwrap().balance.is_zero());
        assert_eq!(b.store.list_journal_entries(b.org).await.unwrap().len(), 2);
        assert_eq!(b.store.get_journal_entry(b.org, entry.id).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_account_ledger_running_balance() {
        let b = books().await;
        for (d, amount) in [(1, dec!(100)), (2, dec!(50))] {
            b.store
                .create_journal_entry(
                    b.org,
                    NewJournalEntry::new(day(d), "Sale")
                        .debit(b.cash, money(amount))
                        .credit(b.sales, money(amount)),
                )
                .await
                .unwrap();
        }

        let ledger = b.store.account_ledger(b.org, b.sales).await.unwrap();
        let balances: Vec<_> = ledger.rows.iter().map(|r| r.balance.amount()).collect();
        assert_eq!(balances, vec![dec!(100), dec!(150)]);
    }

    #[tokio::test]
    async fn test_other_organization_sees_nothing() {
        let b = books().await;
        let entry = b
            .store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Sale")
                    .debit(b.cash, money(dec!(10)))
                    .credit(b.sales, money(dec!(10))),
            )
            .await
            .unwrap();

        let other = OrganizationId::new();
        assert!(matches!(
            b.store.get_journal_entry(other, entry.id).await,
            Err(LedgerError::JournalEntryNotFound(_))
        ));
        assert!(b.store.general_ledger(other).await.unwrap().accounts.is_empty());
        assert!(matches!(
            b.store.get_account(other, b.cash).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }
}

// ============================================================================
// Allocations and payments
// ============================================================================

mod allocation_tests {
    use super::*;

    #[tokio::test]
    async fn test_payment_split_across_invoices() {
        let b = books().await;
        let contact = ContactId::new();
        let first = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(100), day(1)))
            .await
            .unwrap();
        let second = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(200), day(2)))
            .await
            .unwrap();

        let receipt = b
            .store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::BankTransfer,
                    date: Some(day(5)),
                    amount: money(dec!(150)),
                    reference: Some("TRX-1".into()),
                    notes: None,
                    allocations: vec![
                        NewAllocation {
                            invoice_id: first.id,
                            amount: money(dec!(100)),
                            notes: None,
                        },
                        NewAllocation {
                            invoice_id: second.id,
                            amount: money(dec!(50)),
                            notes: None,
                        },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.allocations.len(), 2);
        let first = b.store.get_invoice(b.org, first.id).await.unwrap();
        let second = b.store.get_invoice(b.org, second.id).await.unwrap();
        assert_eq!(first.status(), InvoiceStatus::Paid);
        assert_eq!(second.status(), InvoiceStatus::Partial);
        assert_eq!(second.amount_remaining().amount(), dec!(150));
    }

    #[tokio::test]
    async fn test_failed_payment_leaves_invoices_untouched() {
        let b = books().await;
        let contact = ContactId::new();
        let ok = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(100), day(1)))
            .await
            .unwrap();
        let small = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(10), day(1)))
            .await
            .unwrap();

        let result = b
            .store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::Cash,
                    date: Some(day(2)),
                    amount: money(dec!(200)),
                    reference: None,
                    notes: None,
                    allocations: vec![
                        NewAllocation { invoice_id: ok.id, amount: money(dec!(100)), notes: None },
                        NewAllocation {
                            invoice_id: small.id,
                            amount: money(dec!(20)),
                            notes: None,
                        },
                    ],
                },
            )
            .await;

        assert!(matches!(result, Err(LedgerError::AllocationExceedsBalance { .. })));
        let ok = b.store.get_invoice(b.org, ok.id).await.unwrap();
        assert!(ok.amount_allocated.is_zero());
        assert!(b.store.list_allocations(b.org, ok.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_allocation_respects_payment_amount() {
        let b = books().await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(500), day(1)))
            .await
            .unwrap();
        let receipt = b
            .store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::Check,
                    date: Some(day(2)),
                    amount: money(dec!(100)),
                    reference: None,
                    notes: None,
                    allocations: vec![],
                },
            )
            .await
            .unwrap();
        let source = AllocationSource::Payment(receipt.payment.id);

        let updated = b
            .store
            .apply_allocation(b.org, invoice.id, money(dec!(60)), source, None)
            .await
            .unwrap();
        assert_eq!(updated.amount_allocated.amount(), dec!(60));

        let err = b
            .store
            .apply_allocation(b.org, invoice.id, money(dec!(60)), source, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AllocationExceedsPayment { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_allocation_beyond_remaining_is_rejected() {
        let b = books().await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(50), day(1)))
            .await
            .unwrap();
        let receipt = b
            .store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: Some(invoice.id),
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::Cash,
                    date: Some(day(2)),
                    amount: money(dec!(500)),
                    reference: None,
                    notes: None,
                    allocations: vec![],
                },
            )
            .await
            .unwrap();

        let result = b
            .store
            .apply_allocation(
                b.org,
                invoice.id,
                money(dec!(50.02)),
                AllocationSource::Payment(receipt.payment.id),
                None,
            )
            .await;
        assert!(matches!(result, Err(LedgerError::AllocationExceedsBalance { .. })));
    }
}

// ============================================================================
// Retentions
// ============================================================================

mod retention_tests {
    use super::*;

    #[tokio::test]
    async fn test_retention_creates_entry_allocation_and_updates_invoice() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let invoice = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(ContactId::new()), InvoiceFlow::Sale, dec!(1000), day(1)),
            )
            .await
            .unwrap();

        let retention = b
            .store
            .record_retention(b.org, retention_request(invoice.id, &setting))
            .await
            .unwrap();

        assert_eq!(retention.amount.amount(), dec!(30));
        assert_eq!(retention.setting_code, "IIBB");
        assert_eq!(retention.certificate_number.as_deref(), Some("0001-00000123"));

        let invoice = b.store.get_invoice(b.org, invoice.id).await.unwrap();
        assert_eq!(invoice.amount_remaining().amount(), dec!(970));

        let entry = b.store.get_journal_entry(b.org, retention.journal_entry_id).await.unwrap();
        assert_eq!(entry.lines.len(), 2);
        assert!(entry.lines.iter().all(|l| (l.debit + l.credit).amount() == dec!(30)));
        assert_eq!(entry.lines[0].account_id, b.retention_receivable);
        assert_eq!(entry.lines[1].account_id, b.receivables);

        let allocations = b.store.list_allocations(b.org, invoice.id).await.unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].retention_id, Some(retention.id));
        assert_eq!(b.store.list_retentions(b.org, invoice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purchase_retention_uses_payables() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let invoice = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(ContactId::new()), InvoiceFlow::Purchase, dec!(1000), day(1)),
            )
            .await
            .unwrap();

        let retention = b
            .store
            .record_retention(b.org, retention_request(invoice.id, &setting))
            .await
            .unwrap();

        let entry = b.store.get_journal_entry(b.org, retention.journal_entry_id).await.unwrap();
        assert_eq!(entry.lines[0].account_id, b.payables);
        assert_eq!(entry.lines[1].account_id, b.retention_payable);
    }

    #[tokio::test]
    async fn test_retention_exceeding_remaining_leaves_no_rows() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(100), day(1)))
            .await
            .unwrap();
        b.store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::Cash,
                    date: Some(day(2)),
                    amount: money(dec!(50)),
                    reference: None,
                    notes: None,
                    allocations: vec![NewAllocation {
                        invoice_id: invoice.id,
                        amount: money(dec!(50)),
                        notes: None,
                    }],
                },
            )
            .await
            .unwrap();
        let entries_before = b.store.list_journal_entries(b.org).await.unwrap().len();

        let mut request = retention_request(invoice.id, &setting);
        request.amount = Some(money(dec!(60)));
        let result = b.store.record_retention(b.org, request).await;

        assert!(matches!(result, Err(LedgerError::ExceedsRemaining { .. })));
        let after = b.store.get_invoice(b.org, invoice.id).await.unwrap();
        assert_eq!(after.amount_remaining().amount(), dec!(50));
        assert_eq!(b.store.list_journal_entries(b.org).await.unwrap().len(), entries_before);
        assert!(b.store.list_retentions(b.org, invoice.id).await.unwrap().is_empty());
        assert_eq!(b.store.list_allocations(b.org, invoice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retention_without_config() {
        let store = InMemoryLedgerStore::new();
        let org = OrganizationId::new();
        let invoice = store
            .create_invoice(
                org,
                new_invoice(Some(ContactId::new()), InvoiceFlow::Sale, dec!(100), day(1)),
            )
            .await
            .unwrap();
        let setting = store
            .create_retention_setting(
                org,
                NewRetentionSetting {
                    name: "VAT".into(),
                    code: "IVA".into(),
                    applies_to: None,
                    default_rate: Some(Rate::from_percentage(dec!(1))),
                    receivable_account_id: None,
                    payable_account_id: None,
                },
            )
            .await
            .unwrap();

        let err = store
            .record_retention(org, retention_request(invoice.id, &setting))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(store.list_journal_entries(org).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_needs_contact() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(None, InvoiceFlow::Sale, dec!(100), day(1)))
            .await
            .unwrap();

        let result = b
            .store
            .record_retention(b.org, retention_request(invoice.id, &setting))
            .await;
        assert!(matches!(result, Err(LedgerError::ContactRequired(_))));
    }

    #[tokio::test]
    async fn test_retention_source_cannot_be_allocated_twice() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let invoice = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(ContactId::new()), InvoiceFlow::Sale, dec!(1000), day(1)),
            )
            .await
            .unwrap();
        let retention = b
            .store
            .record_retention(b.org, retention_request(invoice.id, &setting))
            .await
            .unwrap();

        let result = b
            .store
            .apply_allocation(
                b.org,
                invoice.id,
                money(dec!(1)),
                AllocationSource::Retention(retention.id),
                None,
            )
            .await;
        assert!(matches!(result, Err(LedgerError::RetentionAlreadyAllocated(_))));
    }

    #[tokio::test]
    async fn test_retention_source_is_bound_to_its_invoice() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let contact = ContactId::new();
        let withheld_on = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(contact), InvoiceFlow::Sale, dec!(1000), day(1)),
            )
            .await
            .unwrap();
        let other = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(contact), InvoiceFlow::Sale, dec!(1000), day(2)),
            )
            .await
            .unwrap();
        let retention = b
            .store
            .record_retention(b.org, retention_request(withheld_on.id, &setting))
            .await
            .unwrap();

        let err = b
            .store
            .apply_allocation(
                b.org,
                other.id,
                money(dec!(1)),
                AllocationSource::Retention(retention.id),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RetentionInvoiceMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let other = b.store.get_invoice(b.org, other.id).await.unwrap();
        assert!(other.amount_allocated.is_zero());
        assert!(b.store.list_allocations(b.org, other.id).await.unwrap().is_empty());
    }
}

// ============================================================================
// Concurrent writers on one invoice
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_competing_retentions_allocate_once() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let invoice = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(ContactId::new()), InvoiceFlow::Sale, dec!(100), day(1)),
            )
            .await
            .unwrap();
        let request = RetentionRequest {
            amount: Some(money(dec!(60))),
            ..retention_request(invoice.id, &setting)
        };

        let (first, second) = tokio::join!(
            b.store.record_retention(b.org, request.clone()),
            b.store.record_retention(b.org, request.clone()),
        );
        let succeeded = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        let failure = first.err().or(second.err()).unwrap();
        assert!(matches!(failure, LedgerError::ExceedsRemaining { .. }));

        let invoice = b.store.get_invoice(b.org, invoice.id).await.unwrap();
        assert_eq!(invoice.amount_allocated.amount(), dec!(60));
        assert_eq!(b.store.list_retentions(b.org, invoice.id).await.unwrap().len(), 1);
        assert_eq!(b.store.list_journal_entries(b.org).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_competing_allocations_allocate_once() {
        let b = books().await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(100), day(1)))
            .await
            .unwrap();
        let receipt = b
            .store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::BankTransfer,
                    date: Some(day(2)),
                    amount: money(dec!(200)),
                    reference: None,
                    notes: None,
                    allocations: vec![],
                },
            )
            .await
            .unwrap();
        let source = AllocationSource::Payment(receipt.payment.id);

        let (first, second) = tokio::join!(
            b.store.apply_allocation(b.org, invoice.id, money(dec!(60)), source, None),
            b.store.apply_allocation(b.org, invoice.id, money(dec!(60)), source, None),
        );
        let succeeded = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        let failure = first.err().or(second.err()).unwrap();
        assert!(matches!(failure, LedgerError::AllocationExceedsBalance { .. }));

        let invoice = b.store.get_invoice(b.org, invoice.id).await.unwrap();
        assert_eq!(invoice.amount_allocated.amount(), dec!(60));
        assert_eq!(b.store.list_allocations(b.org, invoice.id).await.unwrap().len(), 1);
    }
}

// ============================================================================
// Statements
// ============================================================================

mod statement_tests {
    use super::*;

    #[tokio::test]
    async fn test_settled_invoice_statement() {
        let b = books().await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(b.org, new_invoice(Some(contact), InvoiceFlow::Sale, dec!(500), day(1)))
            .await
            .unwrap();
        b.store
            .record_payment(
                b.org,
                NewPayment {
                    contact_id: Some(contact),
                    invoice_id: None,
                    payment_type: PaymentType::Incoming,
                    method: PaymentMethod::BankTransfer,
                    date: Some(day(4)),
                    amount: money(dec!(500)),
                    reference: None,
                    notes: None,
                    allocations: vec![NewAllocation {
                        invoice_id: invoice.id,
                        amount: money(dec!(500)),
                        notes: None,
                    }],
                },
            )
            .await
            .unwrap();

        let statement = b.store.contact_statement(b.org, contact).await.unwrap();

        assert_eq!(statement.summary.total_invoiced.amount(), dec!(500));
        assert_eq!(statement.summary.total_paid.amount(), dec!(500));
        assert!(statement.summary.balance.is_zero());
        assert_eq!(statement.timeline.len(), 2);
        assert_eq!(statement.timeline[0].kind, TimelineKind::Payment);
        assert_eq!(statement.timeline[0].date, Some(day(4)));
        assert_eq!(statement.timeline[1].date, Some(day(1)));
    }

    #[tokio::test]
    async fn test_statement_counts_retentions_as_paid() {
        let b = books().await;
        let setting = retention_setting(&b).await;
        let contact = ContactId::new();
        let invoice = b
            .store
            .create_invoice(
                b.org,
                new_invoice(Some(contact), InvoiceFlow::Sale, dec!(1000), day(1)),
            )
            .await
            .unwrap();
        b.store
            .record_retention(b.org, retention_request(invoice.id, &setting))
            .await
            .unwrap();

        let statement = b.store.contact_statement(b.org, contact).await.unwrap();
        assert_eq!(statement.summary.total_paid.amount(), dec!(30));
        assert_eq!(statement.summary.balance.amount(), dec!(970));
        assert_eq!(statement.timeline.len(), 1);
    }
}

// ============================================================================
// Account registry
// ============================================================================

mod account_tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_code() {
        let b = books().await;
        let result = b
            .store
            .create_account(b.org, NewAccount::new("1.1.01", "Other cash", AccountType::Asset))
            .await;
        assert!(matches!(result, Err(LedgerError::DuplicateAccountCode(_))));

        // codes are unique per organization only
        let other = OrganizationId::new();
        assert!(b
            .store
            .create_account(other, NewAccount::new("1.1.01", "Cash", AccountType::Asset))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_in_use_check_and_delete_agree() {
        let b = books().await;

        let verdict = b.store.is_account_in_use(b.org, b.cash).await.unwrap();
        assert_eq!(verdict.reason, Some(UsageReason::AccountingConfig));
        assert!(matches!(
            b.store.delete_account(b.org, b.cash).await,
            Err(LedgerError::AccountInUse { reason: UsageReason::AccountingConfig, .. })
        ));

        let spare = b
            .store
            .create_account(b.org, NewAccount::new("5.1.09", "Spare", AccountType::Expense))
            .await
            .unwrap();
        assert!(!b.store.is_account_in_use(b.org, spare.id).await.unwrap().in_use);
        b.store.delete_account(b.org, spare.id).await.unwrap();
        assert!(matches!(
            b.store.get_account(b.org, spare.id).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_with_children_is_in_use() {
        let b = books().await;
        let parent = b
            .store
            .create_account(b.org, NewAccount::new("6", "Other", AccountType::Expense))
            .await
            .unwrap();
        let child = b
            .store
            .create_account(
                b.org,
                NewAccount::new("6.1", "Misc", AccountType::Expense).with_parent(parent.id),
            )
            .await
            .unwrap();

        let verdict = b.store.is_account_in_use(b.org, parent.id).await.unwrap();
        assert_eq!(verdict.reason, Some(UsageReason::Children));

        let cycle = b
            .store
            .update_account(
                b.org,
                parent.id,
                AccountUpdate {
                    parent_id: Some(Some(child.id)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(cycle, Err(LedgerError::AccountCycle(_))));

        let chart = b.store.chart_of_accounts(b.org).await.unwrap();
        let node = chart.iter().find(|n| n.account.id == parent.id).unwrap();
        assert_eq!(node.children.len(), 1);
    }

    #[tokio::test]
    async fn test_type_change_blocked_after_posting() {
        let b = books().await;
        b.store
            .create_journal_entry(
                b.org,
                NewJournalEntry::new(day(1), "Sale")
                    .debit(b.receivables, money(dec!(10)))
                    .credit(b.sales, money(dec!(10))),
            )
            .await
            .unwrap();

        let result = b
            .store
            .update_account(
                b.org,
                b.sales,
                AccountUpdate {
                    account_type: Some(AccountType::Expense),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::AccountInUse { reason: UsageReason::JournalLines, .. })
        ));

        let renamed = b
            .store
            .update_account(
                b.org,
                b.sales,
                AccountUpdate {
                    name: Some("Product sales".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Product sales");
    }
}

// ============================================================================
// Purchase orders
// ============================================================================

mod purchase_order_tests {
    use super::*;

    fn order() -> NewPurchaseOrder {
        NewPurchaseOrder {
            contact_id: None,
            number: "OC-0042".into(),
            date: day(1),
            vat_rate: Rate::from_percentage(dec!(21)),
            items: vec![NewPurchaseOrderItem {
                description: "Steel".into(),
                quantity: dec!(4),
                unit_price: money(dec!(25)),
            }],
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_invoice_against_approved_order() {
        let b = books().await;
        let po = b.store.create_purchase_order(b.org, order()).await.unwrap();
        assert_eq!(po.total_amount.amount(), dec!(121));

        let mut invoice = new_invoice(None, InvoiceFlow::Purchase, dec!(100), day(2));
        invoice.purchase_order_id = Some(po.id);
        assert!(matches!(
            b.store.create_invoice(b.org, invoice.clone()).await,
            Err(LedgerError::PurchaseOrderNotInvoiceable(_))
        ));

        let approved = b.store.approve_purchase_order(b.org, po.id).await.unwrap();
        assert_eq!(approved.status, PurchaseOrderStatus::Approved);

        b.store.create_invoice(b.org, invoice).await.unwrap();
        let po = b.store.get_purchase_order(b.org, po.id).await.unwrap();
        assert_eq!(po.invoiced_amount.amount(), dec!(100));
        assert_eq!(po.remaining().amount(), dec!(21));

        let mut too_much = new_invoice(None, InvoiceFlow::Purchase, dec!(30), day(3));
        too_much.purchase_order_id = Some(po.id);
        assert!(matches!(
            b.store.create_invoice(b.org, too_much).await,
            Err(LedgerError::ExceedsOrderRemaining { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_order_cannot_be_approved() {
        let b = books().await;
        let po = b.store.create_purchase_order(b.org, order()).await.unwrap();
        b.store.reject_purchase_order(b.org, po.id).await.unwrap();

        let err = b.store.approve_purchase_order(b.org, po.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
