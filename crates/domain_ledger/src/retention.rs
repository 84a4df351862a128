//! Retention processing
//!
//! A retention withholds part of an invoice (tax withholding certificates and
//! similar). Recording one produces three rows that live and die together: a
//! balanced journal entry, the retention itself and an allocation against
//! the invoice. [`plan_retention`] performs every check up front and returns
//! the full set of rows; stores persist the plan in a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    AccountId, ContactId, InvoiceId, JournalEntryId, Money, OrganizationId, Rate, RetentionId,
    RetentionSettingId,
};

use crate::config::AccountingConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::invoice::{Invoice, InvoiceFlow};
use crate::journal::{JournalEntry, NewJournalEntry, REFERENCE_RETENTION};
use crate::payment::{AllocationSource, PaymentAllocation};

/// A configured kind of retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionSetting {
    pub id: RetentionSettingId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub code: String,
    /// Restricts the setting to one invoice flow
    pub applies_to: Option<InvoiceFlow>,
    pub default_rate: Option<Rate>,
    /// Debited when retaining on a sale
    pub receivable_account_id: Option<AccountId>,
    /// Credited when retaining on a purchase
    pub payable_account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl RetentionSetting {
    /// True if the setting posts to `account`
    pub fn references(&self, account: AccountId) -> bool {
        self.receivable_account_id == Some(account) || self.payable_account_id == Some(account)
    }
}

/// Request to create a retention setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRetentionSetting {
    pub name: String,
    pub code: String,
    pub applies_to: Option<InvoiceFlow>,
    pub default_rate: Option<Rate>,
    pub receivable_account_id: Option<AccountId>,
    pub payable_account_id: Option<AccountId>,
}

impl NewRetentionSetting {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        if self.code.trim().is_empty() {
            return Err(LedgerError::MissingField("code"));
        }
        Ok(())
    }

    /// Accounts the setting will post to
    pub fn referenced_accounts(&self) -> Vec<AccountId> {
        self.receivable_account_id
            .into_iter()
            .chain(self.payable_account_id)
            .collect()
    }

    pub fn into_setting(self, organization_id: OrganizationId) -> LedgerResult<RetentionSetting> {
        self.validate()?;
        Ok(RetentionSetting {
            id: RetentionSettingId::new_v7(),
            organization_id,
            name: self.name.trim().to_string(),
            code: self.code.trim().to_string(),
            applies_to: self.applies_to,
            default_rate: self.default_rate,
            receivable_account_id: self.receivable_account_id,
            payable_account_id: self.payable_account_id,
            created_at: Utc::now(),
        })
    }
}

/// Withholding certificate reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub number: String,
    pub date: Option<NaiveDate>,
}

/// Request to record a retention against an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRequest {
    pub invoice_id: InvoiceId,
    pub retention_setting_id: RetentionSettingId,
    pub base_amount: Money,
    /// Overrides the setting's default rate
    pub rate: Option<Rate>,
    /// Overrides `base_amount * rate / 100`
    pub amount: Option<Money>,
    pub certificate: Option<Certificate>,
    /// Accounting date; defaults to the day of recording
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// A recorded retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retention {
    pub id: RetentionId,
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub contact_id: ContactId,
    pub retention_setting_id: RetentionSettingId,
    /// Setting name at the time of recording
    pub setting_name: String,
    /// Setting code at the time of recording
    pub setting_code: String,
    pub base_amount: Money,
    pub rate: Rate,
    pub amount: Money,
    pub certificate_number: Option<String>,
    pub certificate_date: Option<NaiveDate>,
    pub journal_entry_id: JournalEntryId,
    pub created_at: DateTime<Utc>,
}

/// Rows produced by a successful retention check
#[derive(Debug, Clone)]
pub struct RetentionPlan {
    pub journal_entry: JournalEntry,
    pub retention: Retention,
    pub allocation: PaymentAllocation,
    /// The invoice with the allocation applied
    pub invoice: Invoice,
}

/// Runs every retention check and builds the rows to persist
///
/// The lookups are passed in already scoped to `organization_id`; `None`
/// means the row does not exist for that organization. Checks run in a fixed
/// order and the first failure wins.
pub fn plan_retention(
    organization_id: OrganizationId,
    request: RetentionRequest,
    invoice: Option<Invoice>,
    config: Option<&AccountingConfig>,
    setting: Option<&RetentionSetting>,
    today: NaiveDate,
) -> LedgerResult<RetentionPlan> {
    let mut invoice = invoice
        .filter(|i| i.organization_id == organization_id)
        .ok_or(LedgerError::InvoiceNotFound(request.invoice_id))?;

    let contact_id = invoice
        .contact_id
        .ok_or(LedgerError::ContactRequired(invoice.id))?;

    let config = config
        .filter(|c| c.organization_id == organization_id)
        .ok_or(LedgerError::ConfigMissing)?;

    let setting = setting
        .filter(|s| s.organization_id == organization_id)
        .ok_or(LedgerError::SettingNotFound(request.retention_setting_id))?;
    if let Some(applies_to) = setting.applies_to {
        if applies_to != invoice.flow {
            return Err(LedgerError::FlowMismatch {
                setting: applies_to,
                invoice: invoice.flow,
            });
        }
    }

    let rate = request
        .rate
        .or(setting.default_rate)
        .ok_or(LedgerError::NoRate(setting.id))?;
    let amount = request.amount.unwrap_or_else(|| rate.apply(&request.base_amount));
    if !amount.is_positive() {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let remaining = invoice.amount_remaining();
    if (invoice.amount_allocated + amount).exceeds(&invoice.total_amount) {
        return Err(LedgerError::ExceedsRemaining {
            requested: amount,
            remaining,
        });
    }

    let (debit_account, credit_account) = match invoice.flow {
        InvoiceFlow::Sale => (setting.receivable_account_id, config.receivables_account_id),
        InvoiceFlow::Purchase => (config.payables_account_id, setting.payable_account_id),
    };
    let (Some(debit_account), Some(credit_account)) = (debit_account, credit_account) else {
        return Err(LedgerError::AccountsNotConfigured { flow: invoice.flow });
    };

    let retention_id = RetentionId::new_v7();
    let date = request.date.unwrap_or(today);
    let description = format!("Retention {} on {}", setting.name, invoice.document_code());

    let journal_entry = NewJournalEntry::new(date, description)
        .with_reference(REFERENCE_RETENTION, *retention_id.as_uuid())
        .debit(debit_account, amount)
        .credit(credit_account, amount)
        .into_entry(organization_id)?;

    let allocation = PaymentAllocation::new(
        organization_id,
        invoice.id,
        amount,
        AllocationSource::Retention(retention_id),
        request.notes,
    );
    invoice.apply_allocation(amount)?;

    let (certificate_number, certificate_date) = match request.certificate {
        Some(certificate) => (Some(certificate.number), certificate.date),
        None => (None, None),
    };

    let retention = Retention {
        id: retention_id,
        organization_id,
        invoice_id: invoice.id,
        contact_id,
        retention_setting_id: setting.id,
        setting_name: setting.name.clone(),
        setting_code: setting.code.clone(),
        base_amount: request.base_amount,
        rate,
        amount,
        certificate_number,
        certificate_date,
        journal_entry_id: journal_entry.id,
        created_at: Utc::now(),
    };

    Ok(RetentionPlan {
        journal_entry,
        retention,
        allocation,
        invoice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountRole;
    use crate::invoice::NewInvoice;
    use rust_decimal_macros::dec;

    struct Fixture {
        org: OrganizationId,
        invoice: Invoice,
        config: AccountingConfig,
        setting: RetentionSetting,
    }

    fn fixture(flow: InvoiceFlow) -> Fixture {
        let org = OrganizationId::new();
        let invoice = NewInvoice {
            contact_id: Some(ContactId::new()),
            purchase_order_id: None,
            flow,
            letter: "A".into(),
            point_of_sale: 1,
            number: 7,
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            net_amount: Money::new(dec!(1000)),
            vat_amount: Money::ZERO,
        }
        .into_invoice(org)
        .unwrap();
        let config = AccountingConfig::empty(org)
            .with_role(AccountRole::Receivables, AccountId::new())
            .with_role(AccountRole::Payables, AccountId::new());
        let setting = NewRetentionSetting {
            name: "Income tax".into(),
            code: "IIGG".into(),
            applies_to: None,
            default_rate: Some(Rate::from_percentage(dec!(2))),
            receivable_account_id: Some(AccountId::new()),
            payable_account_id: Some(AccountId::new()),
        }
        .into_setting(org)
        .unwrap();

        Fixture { org, invoice, config, setting }
    }

    fn request(f: &Fixture) -> RetentionRequest {
        RetentionRequest {
            invoice_id: f.invoice.id,
            retention_setting_id: f.setting.id,
            base_amount: Money::new(dec!(1000)),
            rate: Some(Rate::from_percentage(dec!(3))),
            amount: None,
            certificate: None,
            date: None,
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
    }

    #[test]
    fn test_sale_retention_posts_receivable_pair() {
        let f = fixture(InvoiceFlow::Sale);
        let plan = plan_retention(
            f.org,
            request(&f),
            Some(f.invoice.clone()),
            Some(&f.config),
            Some(&f.setting),
            today(),
        )
        .unwrap();

        assert_eq!(plan.retention.amount.amount(), dec!(30));
        assert_eq!(plan.invoice.amount_remaining().amount(), dec!(970));
        let lines = &plan.journal_entry.lines;
        assert_eq!(lines[0].account_id, f.setting.receivable_account_id.unwrap());
        assert_eq!(lines[1].account_id, f.config.receivables_account_id.unwrap());
        assert_eq!(plan.allocation.retention_id, Some(plan.retention.id));
        assert_eq!(plan.retention.journal_entry_id, plan.journal_entry.id);
        assert_eq!(plan.journal_entry.date, today());
    }

    #[test]
    fn test_purchase_retention_posts_payable_pair() {
        let f = fixture(InvoiceFlow::Purchase);
        let plan = plan_retention(
            f.org,
            request(&f),
            Some(f.invoice.clone()),
            Some(&f.config),
            Some(&f.setting),
            today(),
        )
        .unwrap();

        let lines = &plan.journal_entry.lines;
        assert_eq!(lines[0].account_id, f.config.payables_account_id.unwrap());
        assert_eq!(lines[1].account_id, f.setting.payable_account_id.unwrap());
    }

    #[test]
    fn test_default_rate_is_used() {
        let f = fixture(InvoiceFlow::Sale);
        let mut req = request(&f);
        req.rate = None;

        let invoice = Some(f.invoice.clone());
        let plan = plan_retention(f.org, req, invoice, Some(&f.config), Some(&f.setting), today())
            .unwrap();
        assert_eq!(plan.retention.amount.amount(), dec!(20));
        assert_eq!(plan.retention.setting_code, "IIGG");
    }

    #[test]
    fn test_check_order() {
        let f = fixture(InvoiceFlow::Sale);

        let err = plan_retention(f.org, request(&f), None, None, None, today()).unwrap_err();
        assert!(matches!(err, LedgerError::InvoiceNotFound(_)));

        let mut no_contact = f.invoice.clone();
        no_contact.contact_id = None;
        let err = plan_retention(f.org, request(&f), Some(no_contact), None, None, today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::ContactRequired(_)));

        let invoice = || Some(f.invoice.clone());
        let err = plan_retention(f.org, request(&f), invoice(), None, None, today()).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing));

        let err = plan_retention(f.org, request(&f), invoice(), Some(&f.config), None, today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::SettingNotFound(_)));
    }

    #[test]
    fn test_config_of_another_organization_is_missing() {
        let f = fixture(InvoiceFlow::Sale);
        let mut foreign = f.config.clone();
        foreign.organization_id = OrganizationId::new();

        let invoice = Some(f.invoice.clone());
        let setting = Some(&f.setting);
        let err = plan_retention(f.org, request(&f), invoice, Some(&foreign), setting, today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing));
    }

    #[test]
    fn test_flow_mismatch() {
        let f = fixture(InvoiceFlow::Sale);
        let mut setting = f.setting.clone();
        setting.applies_to = Some(InvoiceFlow::Purchase);

        let invoice = Some(f.invoice.clone());
        let config = Some(&f.config);
        let err = plan_retention(f.org, request(&f), invoice, config, Some(&setting), today())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::FlowMismatch {
                setting: InvoiceFlow::Purchase,
                invoice: InvoiceFlow::Sale
            }
        ));
    }

    #[test]
    fn test_no_rate() {
        let f = fixture(InvoiceFlow::Sale);
        let mut setting = f.setting.clone();
        setting.default_rate = None;
        let mut req = request(&f);
        req.rate = None;

        let invoice = Some(f.invoice.clone());
        let err = plan_retention(f.org, req, invoice, Some(&f.config), Some(&setting), today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoRate(_)));
    }

    #[test]
    fn test_exceeds_remaining() {
        let f = fixture(InvoiceFlow::Sale);
        let mut invoice = f.invoice.clone();
        invoice.amount_allocated = Money::new(dec!(950));
        let mut req = request(&f);
        req.amount = Some(Money::new(dec!(60)));

        let (config, setting) = (Some(&f.config), Some(&f.setting));
        let err = plan_retention(f.org, req, Some(invoice), config, setting, today()).unwrap_err();
        assert!(matches!(err, LedgerError::ExceedsRemaining { .. }));
    }

    #[test]
    fn test_accounts_not_configured() {
        let f = fixture(InvoiceFlow::Sale);
        let config = AccountingConfig::empty(f.org);

        let invoice = Some(f.invoice.clone());
        let setting = Some(&f.setting);
        let err = plan_retention(f.org, request(&f), invoice, Some(&config), setting, today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountsNotConfigured { flow: InvoiceFlow::Sale }));
    }

    #[test]
    fn test_non_positive_amount() {
        let f = fixture(InvoiceFlow::Sale);
        let mut req = request(&f);
        req.base_amount = Money::ZERO;

        let invoice = Some(f.invoice.clone());
        let err = plan_retention(f.org, req, invoice, Some(&f.config), Some(&f.setting), today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)));
    }
}
