//! Invoice, allocation, payment and retention DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ContactId, InvoiceId, Money, PurchaseOrderId, Rate, RetentionSettingId};
use domain_ledger::{
    AllocationSource, Certificate, Invoice, InvoiceFlow, InvoiceStatus, NewAllocation, NewInvoice,
    NewPayment, PaymentMethod, PaymentType, RetentionRequest,
};

use super::{non_negative, percentage, positive};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub contact_id: Option<ContactId>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub flow: InvoiceFlow,
    #[validate(length(min = 1, max = 2))]
    pub letter: String,
    #[validate(range(min = 0, max = 99_999))]
    pub point_of_sale: i32,
    #[validate(range(min = 0))]
    pub number: i64,
    pub date: NaiveDate,
    #[validate(custom(function = "non_negative"))]
    pub net_amount: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub vat_amount: Decimal,
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(request: CreateInvoiceRequest) -> Self {
        NewInvoice {
            contact_id: request.contact_id,
            purchase_order_id: request.purchase_order_id,
            flow: request.flow,
            letter: request.letter,
            point_of_sale: request.point_of_sale,
            number: request.number,
            date: request.date,
            net_amount: Money::new(request.net_amount),
            vat_amount: Money::new(request.vat_amount),
        }
    }
}

/// Invoice with its derived balance and status
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub document_code: String,
    pub amount_remaining: Money,
    pub status: InvoiceStatus,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            document_code: invoice.document_code(),
            amount_remaining: invoice.amount_remaining(),
            status: invoice.status(),
            invoice,
        }
    }
}

/// Allocation of an existing payment or retention to an invoice
#[derive(Debug, Deserialize, Validate)]
pub struct ApplyAllocationRequest {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    /// `{"type": "payment", "id": ...}` or `{"type": "retention", "id": ...}`
    pub source: AllocationSource,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentAllocationRequest {
    pub invoice_id: InvoiceId,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub contact_id: Option<ContactId>,
    pub invoice_id: Option<InvoiceId>,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub date: Option<NaiveDate>,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub allocations: Vec<PaymentAllocationRequest>,
}

impl From<CreatePaymentRequest> for NewPayment {
    fn from(request: CreatePaymentRequest) -> Self {
        NewPayment {
            contact_id: request.contact_id,
            invoice_id: request.invoice_id,
            payment_type: request.payment_type,
            method: request.method,
            date: request.date,
            amount: Money::new(request.amount),
            reference: request.reference,
            notes: request.notes,
            allocations: request
                .allocations
                .into_iter()
                .map(|a| NewAllocation {
                    invoice_id: a.invoice_id,
                    amount: Money::new(a.amount),
                    notes: a.notes,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordRetentionRequest {
    pub invoice_id: InvoiceId,
    pub retention_setting_id: RetentionSettingId,
    #[validate(custom(function = "positive"))]
    pub base_amount: Decimal,
    /// Percentage; falls back to the setting's default rate
    #[validate(custom(function = "percentage"))]
    pub rate: Option<Decimal>,
    /// Explicit amount; overrides `base_amount * rate / 100`
    #[validate(custom(function = "positive"))]
    pub amount: Option<Decimal>,
    #[validate(length(min = 1, max = 50))]
    pub certificate_number: Option<String>,
    pub certificate_date: Option<NaiveDate>,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl From<RecordRetentionRequest> for RetentionRequest {
    fn from(request: RecordRetentionRequest) -> Self {
        let certificate = request.certificate_number.map(|number| Certificate {
            number,
            date: request.certificate_date,
        });
        RetentionRequest {
            invoice_id: request.invoice_id,
            retention_setting_id: request.retention_setting_id,
            base_amount: Money::new(request.base_amount),
            rate: request.rate.map(Rate::from_percentage),
            amount: request.amount.map(Money::new),
            certificate,
            date: request.date,
            notes: request.notes,
        }
    }
}
