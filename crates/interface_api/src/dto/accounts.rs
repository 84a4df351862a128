//! Account, accounting configuration and retention setting DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::percentage;

use core_kernel::{AccountId, OrganizationId, Rate};
use domain_ledger::{
    AccountType, AccountUpdate, AccountingConfig, InvoiceFlow, NewAccount, NewRetentionSetting,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<AccountId>,
    pub description: Option<String>,
}

impl From<CreateAccountRequest> for NewAccount {
    fn from(request: CreateAccountRequest) -> Self {
        NewAccount {
            code: request.code,
            name: request.name,
            account_type: request.account_type,
            parent_id: request.parent_id,
            description: request.description,
        }
    }
}

/// Partial update; `detach_parent` moves the account to the top level
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub parent_id: Option<AccountId>,
    pub detach_parent: bool,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateAccountRequest> for AccountUpdate {
    fn from(request: UpdateAccountRequest) -> Self {
        let parent_id = if request.detach_parent {
            Some(None)
        } else {
            request.parent_id.map(Some)
        };
        AccountUpdate {
            code: request.code,
            name: request.name,
            account_type: request.account_type,
            parent_id,
            description: request.description.map(Some),
            is_active: request.is_active,
        }
    }
}

/// Full replacement of the organization's account roles
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AccountingConfigRequest {
    pub sales_account_id: Option<AccountId>,
    pub sales_vat_account_id: Option<AccountId>,
    pub receivables_account_id: Option<AccountId>,
    pub purchases_account_id: Option<AccountId>,
    pub purchases_vat_account_id: Option<AccountId>,
    pub payables_account_id: Option<AccountId>,
    pub cash_account_id: Option<AccountId>,
    pub bank_account_id: Option<AccountId>,
}

impl AccountingConfigRequest {
    pub fn into_config(self, organization_id: OrganizationId) -> AccountingConfig {
        AccountingConfig {
            organization_id,
            sales_account_id: self.sales_account_id,
            sales_vat_account_id: self.sales_vat_account_id,
            receivables_account_id: self.receivables_account_id,
            purchases_account_id: self.purchases_account_id,
            purchases_vat_account_id: self.purchases_vat_account_id,
            payables_account_id: self.payables_account_id,
            cash_account_id: self.cash_account_id,
            bank_account_id: self.bank_account_id,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRetentionSettingRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    /// Restricts the setting to one invoice flow
    pub applies_to: Option<InvoiceFlow>,
    /// Percentage, e.g. 3 for 3%
    #[validate(custom(function = "percentage"))]
    pub default_rate: Option<Decimal>,
    pub receivable_account_id: Option<AccountId>,
    pub payable_account_id: Option<AccountId>,
}

impl From<CreateRetentionSettingRequest> for NewRetentionSetting {
    fn from(request: CreateRetentionSettingRequest) -> Self {
        NewRetentionSetting {
            name: request.name,
            code: request.code,
            applies_to: request.applies_to,
            default_rate: request.default_rate.map(Rate::from_percentage),
            receivable_account_id: request.receivable_account_id,
            payable_account_id: request.payable_account_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_detach_parent() {
        let update: AccountUpdate = UpdateAccountRequest {
            detach_parent: true,
            parent_id: Some(AccountId::new()),
            ..Default::default()
        }
        .into();
        assert_eq!(update.parent_id, Some(None));
    }

    #[test]
    fn test_create_account_rejects_blank_code() {
        let request: CreateAccountRequest = serde_json::from_value(serde_json::json!({
            "code": "",
            "name": "Cash",
            "account_type": "ASSET"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
