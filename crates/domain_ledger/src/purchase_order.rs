//! Purchase orders
//!
//! Orders are drafted, then approved or rejected. Approved orders are
//! invoiced, possibly in several installments, until nothing remains.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ContactId, Money, OrganizationId, PurchaseOrderId, PurchaseOrderItemId, Rate};

use crate::error::{LedgerError, LedgerResult};

/// Purchase order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    Rejected,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Approved => "APPROVED",
            PurchaseOrderStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: PurchaseOrderItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// `quantity * unit_price`
    pub line_total: Money,
}

/// Requested order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
}

/// Request to create a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub contact_id: Option<ContactId>,
    pub number: String,
    pub date: NaiveDate,
    pub vat_rate: Rate,
    pub items: Vec<NewPurchaseOrderItem>,
    pub notes: Option<String>,
}

impl NewPurchaseOrder {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.number.trim().is_empty() {
            return Err(LedgerError::MissingField("number"));
        }
        if self.items.is_empty() {
            return Err(LedgerError::MissingField("items"));
        }
        for item in &self.items {
            if item.quantity <= Decimal::ZERO {
                return Err(LedgerError::NonPositiveAmount(Money::new(item.quantity)));
            }
            if item.unit_price.is_negative() {
                return Err(LedgerError::NonPositiveAmount(item.unit_price));
            }
        }
        Ok(())
    }

    /// Validates and computes totals; the order starts as a draft
    pub fn into_order(self, organization_id: OrganizationId) -> LedgerResult<PurchaseOrder> {
        self.validate()?;

        let items: Vec<PurchaseOrderItem> = self
            .items
            .into_iter()
            .map(|item| PurchaseOrderItem {
                id: PurchaseOrderItemId::new_v7(),
                line_total: item.unit_price.multiply(item.quantity),
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let subtotal: Money = items.iter().map(|i| i.line_total).sum();
        let vat_amount = self.vat_rate.apply(&subtotal);

        Ok(PurchaseOrder {
            id: PurchaseOrderId::new_v7(),
            organization_id,
            contact_id: self.contact_id,
            number: self.number.trim().to_string(),
            date: self.date,
            status: PurchaseOrderStatus::Draft,
            items,
            subtotal,
            vat_rate: self.vat_rate,
            vat_amount,
            total_amount: subtotal + vat_amount,
            invoiced_amount: Money::ZERO,
            notes: self.notes,
            created_at: Utc::now(),
        })
    }
}

/// A purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub organization_id: OrganizationId,
    pub contact_id: Option<ContactId>,
    pub number: String,
    pub date: NaiveDate,
    pub status: PurchaseOrderStatus,
    pub items: Vec<PurchaseOrderItem>,
    pub subtotal: Money,
    pub vat_rate: Rate,
    pub vat_amount: Money,
    pub total_amount: Money,
    /// Sum of the totals of invoices raised against the order
    pub invoiced_amount: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// `total - invoiced`
    pub fn remaining(&self) -> Money {
        self.total_amount - self.invoiced_amount
    }

    pub fn is_invoiceable(&self) -> bool {
        self.status == PurchaseOrderStatus::Approved && self.remaining().exceeds(&Money::ZERO)
    }

    pub fn approve(&mut self) -> LedgerResult<()> {
        self.transition(PurchaseOrderStatus::Approved)
    }

    pub fn reject(&mut self) -> LedgerResult<()> {
        self.transition(PurchaseOrderStatus::Rejected)
    }

    fn transition(&mut self, to: PurchaseOrderStatus) -> LedgerResult<()> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(LedgerError::invalid_transition(self.status, to));
        }
        self.status = to;
        Ok(())
    }

    /// Records an invoice of `total` raised against the order
    pub fn register_invoice(&mut self, total: Money) -> LedgerResult<()> {
        if !self.is_invoiceable() {
            return Err(LedgerError::PurchaseOrderNotInvoiceable(self.id));
        }
        let remaining = self.remaining();
        if total.exceeds(&remaining) {
            return Err(LedgerError::ExceedsOrderRemaining {
                requested: total,
                remaining,
            });
        }
        self.invoiced_amount += total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> PurchaseOrder {
        NewPurchaseOrder {
            contact_id: None,
            number: "OC-0001".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            vat_rate: Rate::from_percentage(dec!(21)),
            items: vec![
                NewPurchaseOrderItem {
                    description: "Paper".into(),
                    quantity: dec!(10),
                    unit_price: Money::new(dec!(5)),
                },
                NewPurchaseOrderItem {
                    description: "Toner".into(),
                    quantity: dec!(2),
                    unit_price: Money::new(dec!(25)),
                },
            ],
            notes: None,
        }
        .into_order(OrganizationId::new())
        .unwrap()
    }

    #[test]
    fn test_totals() {
        let po = order();
        assert_eq!(po.subtotal.amount(), dec!(100));
        assert_eq!(po.vat_amount.amount(), dec!(21));
        assert_eq!(po.total_amount.amount(), dec!(121));
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
    }

    #[test]
    fn test_transitions_only_from_draft() {
        let mut po = order();
        po.approve().unwrap();
        assert!(matches!(po.reject(), Err(LedgerError::InvalidStateTransition { .. })));

        let mut rejected = order();
        rejected.reject().unwrap();
        assert!(rejected.approve().is_err());
    }

    #[test]
    fn test_invoicing() {
        let mut po = order();
        assert!(matches!(
            po.register_invoice(Money::new(dec!(10))),
            Err(LedgerError::PurchaseOrderNotInvoiceable(_))
        ));

        po.approve().unwrap();
        po.register_invoice(Money::new(dec!(100))).unwrap();
        assert_eq!(po.remaining().amount(), dec!(21));
        assert!(matches!(
            po.register_invoice(Money::new(dec!(22))),
            Err(LedgerError::ExceedsOrderRemaining { .. })
        ));

        po.register_invoice(Money::new(dec!(21))).unwrap();
        assert!(!po.is_invoiceable());
    }
}
