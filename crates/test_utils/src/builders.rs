//! Test Data Builders
//!
//! Builders for ledger requests with sensible defaults, so tests only spell
//! out the fields they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, ContactId, InvoiceId, Money, PurchaseOrderId, Rate};
use domain_ledger::{
    InvoiceFlow, NewAllocation, NewInvoice, NewJournalEntry, NewPayment, NewPurchaseOrder,
    NewPurchaseOrderItem, PaymentMethod, PaymentType,
};

use crate::fixtures::DateFixtures;

/// Builder for invoice requests
///
/// Defaults to a sale invoice "A 00001-00000001" of 1000.00 net, no VAT,
/// for a fresh contact.
pub struct InvoiceBuilder {
    invoice: NewInvoice,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            invoice: NewInvoice {
                contact_id: Some(ContactId::new()),
                purchase_order_id: None,
                flow: InvoiceFlow::Sale,
                letter: "A".into(),
                point_of_sale: 1,
                number: 1,
                date: DateFixtures::day(1),
                net_amount: Money::new(dec!(1000.00)),
                vat_amount: Money::ZERO,
            },
        }
    }

    /// Purchase invoice with the same defaults
    pub fn purchase() -> Self {
        Self::new().with_flow(InvoiceFlow::Purchase)
    }

    pub fn with_contact(mut self, contact_id: ContactId) -> Self {
        self.invoice.contact_id = Some(contact_id);
        self
    }

    pub fn without_contact(mut self) -> Self {
        self.invoice.contact_id = None;
        self
    }

    pub fn with_flow(mut self, flow: InvoiceFlow) -> Self {
        self.invoice.flow = flow;
        self
    }

    pub fn with_number(mut self, point_of_sale: i32, number: i64) -> Self {
        self.invoice.point_of_sale = point_of_sale;
        self.invoice.number = number;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.invoice.date = date;
        self
    }

    /// Sets the net amount and clears VAT
    pub fn with_total(mut self, total: Decimal) -> Self {
        self.invoice.net_amount = Money::new(total);
        self.invoice.vat_amount = Money::ZERO;
        self
    }

    pub fn with_amounts(mut self, net: Decimal, vat: Decimal) -> Self {
        self.invoice.net_amount = Money::new(net);
        self.invoice.vat_amount = Money::new(vat);
        self
    }

    pub fn against_order(mut self, order_id: PurchaseOrderId) -> Self {
        self.invoice.purchase_order_id = Some(order_id);
        self.invoice.flow = InvoiceFlow::Purchase;
        self
    }

    pub fn build(self) -> NewInvoice {
        self.invoice
    }
}

/// Builder for payment requests
///
/// Defaults to an incoming bank transfer of 100.00 with no allocations.
pub struct PaymentBuilder {
    payment: NewPayment,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self {
            payment: NewPayment {
                contact_id: None,
                invoice_id: None,
                payment_type: PaymentType::Incoming,
                method: PaymentMethod::BankTransfer,
                date: Some(DateFixtures::day(15)),
                amount: Money::new(dec!(100.00)),
                reference: None,
                notes: None,
                allocations: Vec::new(),
            },
        }
    }

    pub fn outgoing() -> Self {
        let mut builder = Self::new();
        builder.payment.payment_type = PaymentType::Outgoing;
        builder
    }

    pub fn for_contact(mut self, contact_id: ContactId) -> Self {
        self.payment.contact_id = Some(contact_id);
        self
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.payment.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.payment.amount = Money::new(amount);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment.method = method;
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.payment.date = date;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment.reference = Some(reference.into());
        self
    }

    /// Adds an allocation of `amount` to `invoice_id`
    pub fn allocate(mut self, invoice_id: InvoiceId, amount: Decimal) -> Self {
        self.payment.allocations.push(NewAllocation {
            invoice_id,
            amount: Money::new(amount),
            notes: None,
        });
        self
    }

    pub fn build(self) -> NewPayment {
        self.payment
    }
}

/// Builder for purchase orders
///
/// Defaults to order "PO-0001" at 21% VAT with no items.
pub struct PurchaseOrderBuilder {
    order: NewPurchaseOrder,
}

impl Default for PurchaseOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseOrderBuilder {
    pub fn new() -> Self {
        Self {
            order: NewPurchaseOrder {
                contact_id: Some(ContactId::new()),
                number: "PO-0001".into(),
                date: DateFixtures::day(1),
                vat_rate: Rate::from_percentage(dec!(21)),
                items: Vec::new(),
                notes: None,
            },
        }
    }

    pub fn with_contact(mut self, contact_id: ContactId) -> Self {
        self.order.contact_id = Some(contact_id);
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.order.number = number.into();
        self
    }

    pub fn with_vat_rate(mut self, percentage: Decimal) -> Self {
        self.order.vat_rate = Rate::from_percentage(percentage);
        self
    }

    pub fn item(
        mut self,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        self.order.items.push(NewPurchaseOrderItem {
            description: description.into(),
            quantity,
            unit_price: Money::new(unit_price),
        });
        self
    }

    pub fn build(self) -> NewPurchaseOrder {
        self.order
    }
}

/// Two-line entry moving `amount` from `credit` to `debit`
pub fn simple_entry(
    date: NaiveDate,
    debit: AccountId,
    credit: AccountId,
    amount: Decimal,
) -> NewJournalEntry {
    NewJournalEntry::new(date, "Test entry")
        .debit(debit, Money::new(amount))
        .credit(credit, Money::new(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_builder_defaults_validate() {
        let invoice = InvoiceBuilder::new().build();
        assert!(invoice.validate().is_ok());
        assert_eq!(invoice.total(), Money::new(dec!(1000.00)));
    }

    #[test]
    fn test_invoice_builder_against_order_is_purchase() {
        let invoice = InvoiceBuilder::new()
            .against_order(PurchaseOrderId::new())
            .build();
        assert_eq!(invoice.flow, InvoiceFlow::Purchase);
    }

    #[test]
    fn test_payment_builder_allocations() {
        let invoice = InvoiceId::new();
        let payment = PaymentBuilder::new()
            .for_contact(ContactId::new())
            .with_amount(dec!(300))
            .allocate(invoice, dec!(200))
            .build();

        assert_eq!(payment.allocated(), Money::new(dec!(200)));
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn test_simple_entry_balances() {
        let entry =
            simple_entry(DateFixtures::day(2), AccountId::new(), AccountId::new(), dec!(50));
        assert!(entry.validate().is_ok());
    }
}
