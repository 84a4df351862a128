//! Journal entry DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{AccountId, Money};
use domain_ledger::{NewJournalEntry, NewJournalLine};

use super::non_negative;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct JournalLineRequest {
    pub account_id: AccountId,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub debit: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub credit: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJournalEntryRequest {
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<JournalLineRequest>,
}

impl From<CreateJournalEntryRequest> for NewJournalEntry {
    fn from(request: CreateJournalEntryRequest) -> Self {
        NewJournalEntry {
            date: request.date,
            description: request.description,
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            lines: request
                .lines
                .into_iter()
                .map(|line| NewJournalLine {
                    account_id: line.account_id,
                    debit: Money::new(line.debit),
                    credit: Money::new(line.credit),
                    description: line.description,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReverseJournalEntryRequest {
    /// Defaults to today
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}
