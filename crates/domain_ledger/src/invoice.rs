//! Invoices and their allocation state
//!
//! An invoice is created with nothing allocated and afterwards only changes
//! through allocations. The remaining balance is derived, never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ContactId, InvoiceId, Money, OrganizationId, PurchaseOrderId};

use crate::error::{LedgerError, LedgerResult};

/// Direction of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceFlow {
    /// Issued to a customer
    Sale,
    /// Received from a supplier
    Purchase,
}

impl InvoiceFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceFlow::Sale => "SALE",
            InvoiceFlow::Purchase => "PURCHASE",
        }
    }
}

impl fmt::Display for InvoiceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status derived from allocated and remaining amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Nothing allocated yet
    Pending,
    /// Partially allocated
    Partial,
    /// Remaining balance within tolerance of zero
    Paid,
}

impl InvoiceStatus {
    pub fn derive(allocated: Money, remaining: Money) -> Self {
        if remaining.is_negligible() {
            InvoiceStatus::Paid
        } else if allocated.is_positive() {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        }
    }
}

/// A sale or purchase invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub organization_id: OrganizationId,
    pub contact_id: Option<ContactId>,
    /// Purchase order the invoice was raised against
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub flow: InvoiceFlow,
    /// Document letter (e.g. "A", "B")
    pub letter: String,
    pub point_of_sale: i32,
    pub number: i64,
    pub date: NaiveDate,
    pub net_amount: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
    /// Never decreases
    pub amount_allocated: Money,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Human-readable document code, e.g. `A 00003-00000042`
    pub fn document_code(&self) -> String {
        format!("{} {:05}-{:08}", self.letter, self.point_of_sale, self.number)
    }

    /// `max(total - allocated, 0)`
    pub fn amount_remaining(&self) -> Money {
        (self.total_amount - self.amount_allocated).clamp_non_negative()
    }

    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::derive(self.amount_allocated, self.amount_remaining())
    }

    /// Checks that `amount` can be allocated without overdrawing the invoice
    pub fn check_allocation(&self, amount: Money) -> LedgerResult<()> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let remaining = self.amount_remaining();
        // against the unclamped balance so tolerance cannot accumulate
        if (self.amount_allocated + amount).exceeds(&self.total_amount) {
            return Err(LedgerError::AllocationExceedsBalance {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    /// Applies an allocation after checking it
    pub fn apply_allocation(&mut self, amount: Money) -> LedgerResult<()> {
        self.check_allocation(amount)?;
        self.amount_allocated += amount;
        Ok(())
    }
}

/// Request to create an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub contact_id: Option<ContactId>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub flow: InvoiceFlow,
    pub letter: String,
    pub point_of_sale: i32,
    pub number: i64,
    pub date: NaiveDate,
    pub net_amount: Money,
    pub vat_amount: Money,
}

impl NewInvoice {
    pub fn total(&self) -> Money {
        self.net_amount + self.vat_amount
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.letter.trim().is_empty() {
            return Err(LedgerError::MissingField("letter"));
        }
        if self.net_amount.is_negative() {
            return Err(LedgerError::NonPositiveAmount(self.net_amount));
        }
        if self.vat_amount.is_negative() {
            return Err(LedgerError::NonPositiveAmount(self.vat_amount));
        }
        let total = self.total();
        if !total.is_positive() {
            return Err(LedgerError::NonPositiveAmount(total));
        }
        Ok(())
    }

    /// Validates and materializes the invoice with nothing allocated
    pub fn into_invoice(self, organization_id: OrganizationId) -> LedgerResult<Invoice> {
        self.validate()?;
        let total_amount = self.total();
        Ok(Invoice {
            id: InvoiceId::new_v7(),
            organization_id,
            contact_id: self.contact_id,
            purchase_order_id: self.purchase_order_id,
            flow: self.flow,
            letter: self.letter.trim().to_uppercase(),
            point_of_sale: self.point_of_sale,
            number: self.number,
            date: self.date,
            net_amount: self.net_amount,
            vat_amount: self.vat_amount,
            total_amount,
            amount_allocated: Money::ZERO,
            created_at: Utc::now(),
        })
    }
}
