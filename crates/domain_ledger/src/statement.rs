//! Contact statements
//!
//! Merges a contact's invoices and the payment events touching them into one
//! timeline, newest first, with a running balance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{ContactId, InvoiceId, Money, PaymentId};

use crate::invoice::Invoice;
use crate::payment::{Payment, PaymentAllocation};

/// Kind of timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Invoice,
    Payment,
}

/// One line of the statement timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub kind: TimelineKind,
    pub date: Option<NaiveDate>,
    /// Set when the event has no date; such entries sort last
    pub undated: bool,
    pub invoice_id: Option<InvoiceId>,
    pub payment_id: Option<PaymentId>,
    pub document_code: Option<String>,
    pub description: String,
    pub amount: Money,
    /// Contact balance after this event, accumulated oldest first
    pub running_balance: Money,
}

impl TimelineEntry {
    fn new(
        kind: TimelineKind,
        date: Option<NaiveDate>,
        description: String,
        amount: Money,
    ) -> Self {
        Self {
            kind,
            date,
            undated: date.is_none(),
            invoice_id: None,
            payment_id: None,
            document_code: None,
            description,
            amount,
            running_balance: Money::ZERO,
        }
    }

    fn signed_amount(&self) -> Money {
        match self.kind {
            TimelineKind::Invoice => self.amount,
            TimelineKind::Payment => -self.amount,
        }
    }
}

/// Statement totals, derived from invoice state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub total_invoiced: Money,
    pub total_paid: Money,
    pub balance: Money,
}

/// Full statement of a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactStatement {
    pub contact_id: ContactId,
    pub timeline: Vec<TimelineEntry>,
    /// Contact invoices, newest first
    pub invoices: Vec<Invoice>,
    pub summary: StatementSummary,
}

/// Rows a store loads for a statement
///
/// `invoices` are the contact's invoices; `payments` every payment linked to
/// the contact directly, through an invoice reference or through an
/// allocation; `allocations` every allocation on the contact's invoices.
#[derive(Debug, Clone, Default)]
pub struct StatementSources {
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub allocations: Vec<PaymentAllocation>,
}

/// Builds the statement timeline and summary
pub fn build_statement(contact_id: ContactId, sources: StatementSources) -> ContactStatement {
    let StatementSources {
        mut invoices,
        payments,
        allocations,
    } = sources;

    invoices.sort_by(|a, b| b.date.cmp(&a.date));
    let codes: HashMap<InvoiceId, String> = invoices
        .iter()
        .map(|i| (i.id, i.document_code()))
        .collect();

    let mut timeline = Vec::with_capacity(invoices.len() + payments.len());

    for payment in &payments {
        timeline.extend(payment_entries(contact_id, payment, &allocations, &codes));
    }

    for invoice in &invoices {
        let code = invoice.document_code();
        let mut entry = TimelineEntry::new(
            TimelineKind::Invoice,
            Some(invoice.date),
            format!("Invoice {code}"),
            invoice.total_amount,
        );
        entry.invoice_id = Some(invoice.id);
        entry.document_code = Some(code);
        timeline.push(entry);
    }

    // stable: ties keep merge order, payments ahead of invoices
    timeline.sort_by(|a, b| b.date.cmp(&a.date));

    let mut balance = Money::ZERO;
    for entry in timeline.iter_mut().rev() {
        balance += entry.signed_amount();
        entry.running_balance = balance;
    }

    let total_invoiced: Money = invoices.iter().map(|i| i.total_amount).sum();
    let total_paid: Money = invoices.iter().map(|i| i.amount_allocated).sum();

    ContactStatement {
        contact_id,
        timeline,
        invoices,
        summary: StatementSummary {
            total_invoiced,
            total_paid,
            balance: total_invoiced - total_paid,
        },
    }
}

/// Expands one payment into its timeline entries for the contact
fn payment_entries(
    contact_id: ContactId,
    payment: &Payment,
    allocations: &[PaymentAllocation],
    codes: &HashMap<InvoiceId, String>,
) -> Vec<TimelineEntry> {
    let applied: Vec<TimelineEntry> = allocations
        .iter()
        .filter(|a| a.payment_id == Some(payment.id))
        .filter_map(|a| {
            let code = codes.get(&a.invoice_id)?;
            let mut entry = TimelineEntry::new(
                TimelineKind::Payment,
                payment.date,
                format!("Payment applied to {code}"),
                a.amount,
            );
            entry.invoice_id = Some(a.invoice_id);
            entry.payment_id = Some(payment.id);
            entry.document_code = Some(code.clone());
            Some(entry)
        })
        .collect();

    if !applied.is_empty() {
        return applied;
    }

    if let Some((invoice_id, code)) = payment
        .invoice_id
        .and_then(|id| codes.get(&id).map(|code| (id, code)))
    {
        let mut entry = TimelineEntry::new(
            TimelineKind::Payment,
            payment.date,
            format!("Payment for {code}"),
            payment.amount,
        );
        entry.invoice_id = Some(invoice_id);
        entry.payment_id = Some(payment.id);
        entry.document_code = Some(code.clone());
        return vec![entry];
    }

    if payment.contact_id == Some(contact_id) {
        let description = match &payment.reference {
            Some(reference) => format!("Payment {reference}"),
            None => "Payment".to_string(),
        };
        let mut entry =
            TimelineEntry::new(TimelineKind::Payment, payment.date, description, payment.amount);
        entry.payment_id = Some(payment.id);
        return vec![entry];
    }

    Vec::new()
}
