//! Payments and allocations
//!
//! A payment may be split across several invoices through allocations. The
//! allocations of one payment never add up to more than the payment itself,
//! and no allocation may overdraw its invoice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{
    AllocationId, ContactId, InvoiceId, Money, OrganizationId, PaymentId, RetentionId,
};

use crate::error::{LedgerError, LedgerResult};
use crate::invoice::Invoice;

/// Direction of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Collected from a customer
    Incoming,
    /// Paid to a supplier
    Outgoing,
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Check,
    Card,
    Other,
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub organization_id: OrganizationId,
    /// Contact the payment is associated with directly
    pub contact_id: Option<ContactId>,
    /// Invoice the payment is associated with directly
    pub invoice_id: Option<InvoiceId>,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub date: Option<NaiveDate>,
    pub amount: Money,
    /// External reference (bank ref, check number)
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One allocation requested alongside a new payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAllocation {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub notes: Option<String>,
}

/// Request to record a payment and its allocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub contact_id: Option<ContactId>,
    pub invoice_id: Option<InvoiceId>,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub date: Option<NaiveDate>,
    pub amount: Money,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub allocations: Vec<NewAllocation>,
}

impl NewPayment {
    /// Sum of the requested allocations
    pub fn allocated(&self) -> Money {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    /// Every invoice the payment touches, direct reference first
    pub fn invoice_ids(&self) -> Vec<InvoiceId> {
        let mut ids: Vec<InvoiceId> = self.invoice_id.into_iter().collect();
        for allocation in &self.allocations {
            if !ids.contains(&allocation.invoice_id) {
                ids.push(allocation.invoice_id);
            }
        }
        ids
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if !self.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(self.amount));
        }
        if self.contact_id.is_none() && self.invoice_id.is_none() {
            return Err(LedgerError::MissingField("contact_id"));
        }
        if let Some(allocation) = self.allocations.iter().find(|a| !a.amount.is_positive()) {
            return Err(LedgerError::NonPositiveAmount(allocation.amount));
        }
        let allocated = self.allocated();
        if allocated.exceeds(&self.amount) {
            return Err(LedgerError::AllocationExceedsPayment {
                allocated,
                amount: self.amount,
            });
        }
        Ok(())
    }
}

/// What an allocation draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AllocationSource {
    Payment(PaymentId),
    Retention(RetentionId),
}

/// A portion of a payment or retention applied to an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: AllocationId,
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub payment_id: Option<PaymentId>,
    pub retention_id: Option<RetentionId>,
    pub amount: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentAllocation {
    pub fn new(
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        amount: Money,
        source: AllocationSource,
        notes: Option<String>,
    ) -> Self {
        let (payment_id, retention_id) = match source {
            AllocationSource::Payment(id) => (Some(id), None),
            AllocationSource::Retention(id) => (None, Some(id)),
        };
        Self {
            id: AllocationId::new_v7(),
            organization_id,
            invoice_id,
            payment_id,
            retention_id,
            amount,
            notes,
            created_at: Utc::now(),
        }
    }

    pub fn source(&self) -> Option<AllocationSource> {
        match (self.payment_id, self.retention_id) {
            (Some(id), _) => Some(AllocationSource::Payment(id)),
            (None, Some(id)) => Some(AllocationSource::Retention(id)),
            (None, None) => None,
        }
    }
}

/// A recorded payment with its allocations and the invoices they changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub allocations: Vec<PaymentAllocation>,
    pub invoices: Vec<Invoice>,
}

/// Validates a payment against the invoices it touches
///
/// `invoices` must hold every invoice of [`NewPayment::invoice_ids`] that
/// exists in the organization; a missing one fails with `InvoiceNotFound`.
/// Allocations are applied in order, so two allocations to the same invoice
/// see each other's effect. Nothing is persisted here.
pub fn plan_payment(
    organization_id: OrganizationId,
    request: NewPayment,
    invoices: Vec<Invoice>,
) -> LedgerResult<PaymentReceipt> {
    request.validate()?;

    let mut by_id: HashMap<InvoiceId, Invoice> = invoices
        .into_iter()
        .filter(|i| i.organization_id == organization_id)
        .map(|i| (i.id, i))
        .collect();

    if let Some(invoice_id) = request.invoice_id {
        if !by_id.contains_key(&invoice_id) {
            return Err(LedgerError::InvoiceNotFound(invoice_id));
        }
    }

    let payment = Payment {
        id: PaymentId::new_v7(),
        organization_id,
        contact_id: request.contact_id,
        invoice_id: request.invoice_id,
        payment_type: request.payment_type,
        method: request.method,
        date: request.date,
        amount: request.amount,
        reference: request.reference,
        notes: request.notes,
        created_at: Utc::now(),
    };

    let mut touched: Vec<InvoiceId> = Vec::new();
    let mut allocations = Vec::with_capacity(request.allocations.len());
    for requested in request.allocations {
        let invoice = by_id
            .get_mut(&requested.invoice_id)
            .ok_or(LedgerError::InvoiceNotFound(requested.invoice_id))?;
        invoice.apply_allocation(requested.amount)?;
        if !touched.contains(&invoice.id) {
            touched.push(invoice.id);
        }
        allocations.push(PaymentAllocation::new(
            organization_id,
            requested.invoice_id,
            requested.amount,
            AllocationSource::Payment(payment.id),
            requested.notes,
        ));
    }

    let invoices = touched
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect();

    Ok(PaymentReceipt {
        payment,
        allocations,
        invoices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{InvoiceFlow, NewInvoice};
    use rust_decimal_macros::dec;

    fn invoice(org: OrganizationId, total: rust_decimal::Decimal) -> Invoice {
        NewInvoice {
            contact_id: Some(ContactId::new()),
            purchase_order_id: None,
            flow: InvoiceFlow::Sale,
            letter: "A".into(),
            point_of_sale: 1,
            number: 1,
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            net_amount: Money::new(total),
            vat_amount: Money::ZERO,
        }
        .into_invoice(org)
        .unwrap()
    }

    fn payment(amount: rust_decimal::Decimal, allocations: Vec<NewAllocation>) -> NewPayment {
        NewPayment {
            contact_id: Some(ContactId::new()),
            invoice_id: None,
            payment_type: PaymentType::Incoming,
            method: PaymentMethod::BankTransfer,
            date: NaiveDate::from_ymd_opt(2024, 2, 5),
            amount: Money::new(amount),
            reference: None,
            notes: None,
            allocations,
        }
    }

    fn alloc(invoice_id: InvoiceId, amount: rust_decimal::Decimal) -> NewAllocation {
        NewAllocation {
            invoice_id,
            amount: Money::new(amount),
            notes: None,
        }
    }

    #[test]
    fn test_split_payment() {
        let org = OrganizationId::new();
        let a = invoice(org, dec!(100));
        let b = invoice(org, dec!(300));
        let request = payment(dec!(250), vec![alloc(a.id, dec!(100)), alloc(b.id, dec!(150))]);

        let receipt = plan_payment(org, request, vec![a.clone(), b.clone()]).unwrap();

        assert_eq!(receipt.allocations.len(), 2);
        assert!(receipt
            .allocations
            .iter()
            .all(|x| x.payment_id == Some(receipt.payment.id)));
        assert_eq!(receipt.invoices[0].amount_remaining(), Money::ZERO);
        assert_eq!(receipt.invoices[1].amount_remaining().amount(), dec!(150));
    }

    #[test]
    fn test_allocations_exceed_payment() {
        let org = OrganizationId::new();
        let a = invoice(org, dec!(500));
        let request = payment(dec!(100), vec![alloc(a.id, dec!(100.02))]);

        assert!(matches!(
            plan_payment(org, request, vec![a]),
            Err(LedgerError::AllocationExceedsPayment { .. })
        ));
    }

    #[test]
    fn test_repeated_invoice_sees_previous_allocation() {
        let org = OrganizationId::new();
        let a = invoice(org, dec!(100));
        let request = payment(dec!(200), vec![alloc(a.id, dec!(60)), alloc(a.id, dec!(60))]);

        assert!(matches!(
            plan_payment(org, request, vec![a]),
            Err(LedgerError::AllocationExceedsBalance { .. })
        ));
    }

    #[test]
    fn test_foreign_invoice_is_not_found() {
        let org = OrganizationId::new();
        let foreign = invoice(OrganizationId::new(), dec!(100));
        let request = payment(dec!(50), vec![alloc(foreign.id, dec!(50))]);

        assert!(matches!(
            plan_payment(org, request, vec![foreign]),
            Err(LedgerError::InvoiceNotFound(_))
        ));
    }

    #[test]
    fn test_unallocated_payment_needs_an_association() {
        let mut request = payment(dec!(10), vec![]);
        request.contact_id = None;
        assert!(matches!(request.validate(), Err(LedgerError::MissingField("contact_id"))));
    }
}
