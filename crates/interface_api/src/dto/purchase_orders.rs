//! Purchase order DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ContactId, Money, Rate};
use domain_ledger::{NewPurchaseOrder, NewPurchaseOrderItem};

use super::{non_negative, percentage, positive};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PurchaseOrderItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    pub contact_id: Option<ContactId>,
    #[validate(length(min = 1, max = 50))]
    pub number: String,
    pub date: NaiveDate,
    /// VAT percentage applied to the subtotal
    #[validate(custom(function = "percentage"))]
    pub vat_rate: Decimal,
    #[validate(length(min = 1), nested)]
    pub items: Vec<PurchaseOrderItemRequest>,
    pub notes: Option<String>,
}

impl From<CreatePurchaseOrderRequest> for NewPurchaseOrder {
    fn from(request: CreatePurchaseOrderRequest) -> Self {
        NewPurchaseOrder {
            contact_id: request.contact_id,
            number: request.number,
            date: request.date,
            vat_rate: Rate::from_percentage(request.vat_rate),
            items: request
                .items
                .into_iter()
                .map(|item| NewPurchaseOrderItem {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: Money::new(item.unit_price),
                })
                .collect(),
            notes: request.notes,
        }
    }
}
