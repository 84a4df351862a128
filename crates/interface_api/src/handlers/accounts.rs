//! Chart of accounts, accounting configuration and retention setting handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use core_kernel::AccountId;
use domain_ledger::{
    Account, AccountLedger, AccountUsage, AccountingConfig, ChartNode, LedgerError, LedgerPort,
    LedgerPortExt, RetentionSetting, UsageVerdict,
};

use crate::auth::{permissions, Tenant};
use crate::dto::accounts::{
    AccountingConfigRequest, CreateAccountRequest, CreateRetentionSettingRequest,
    UpdateAccountRequest,
};
use crate::dto::ValidatedJson;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Usage report with the verdict derived from it
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    #[serde(flatten)]
    pub verdict: UsageVerdict,
    pub usage: AccountUsage,
}

pub async fn create_account(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(request): ValidatedJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    tenant.require(permissions::LEDGER_ADMIN)?;
    let account = state.ledger.create_account(tenant.org, request.into()).await?;
    tracing::info!(account_id = %account.id, code = %account.code, "account created");
    Ok((StatusCode::CREATED, api_success(account)))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    tenant: Tenant,
) -> ApiResult<Vec<Account>> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.list_accounts(tenant.org).await?))
}

/// Accounts nested under their parents
pub async fn chart_of_accounts(
    State(state): State<AppState>,
    tenant: Tenant,
) -> ApiResult<Vec<ChartNode>> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.chart_of_accounts(tenant.org).await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<AccountId>,
) -> ApiResult<Account> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.get_account(tenant.org, id).await?))
}

pub async fn update_account(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<AccountId>,
    ValidatedJson(request): ValidatedJson<UpdateAccountRequest>,
) -> ApiResult<Account> {
    tenant.require(permissions::LEDGER_ADMIN)?;
    let account = state.ledger.update_account(tenant.org, id, request.into()).await?;
    Ok(api_success(account))
}

pub async fn delete_account(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<AccountId>,
) -> Result<StatusCode, ApiError> {
    tenant.require(permissions::LEDGER_ADMIN)?;
    state.ledger.delete_account(tenant.org, id).await?;
    tracing::info!(account_id = %id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn account_usage(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<AccountId>,
) -> ApiResult<UsageResponse> {
    tenant.require(permissions::LEDGER_READ)?;
    let usage = state.ledger.account_usage(tenant.org, id).await?;
    Ok(api_success(UsageResponse {
        verdict: usage.verdict(),
        usage,
    }))
}

/// Postings of one account with their running balance
pub async fn account_ledger(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<AccountId>,
) -> ApiResult<AccountLedger> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.account_ledger(tenant.org, id).await?))
}

pub async fn get_accounting_config(
    State(state): State<AppState>,
    tenant: Tenant,
) -> ApiResult<AccountingConfig> {
    tenant.require(permissions::LEDGER_READ)?;
    let config = state
        .ledger
        .get_accounting_config(tenant.org)
        .await?
        .ok_or(LedgerError::ConfigMissing)?;
    Ok(api_success(config))
}

pub async fn save_accounting_config(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(request): ValidatedJson<AccountingConfigRequest>,
) -> ApiResult<AccountingConfig> {
    tenant.require(permissions::LEDGER_ADMIN)?;
    let config = state
        .ledger
        .save_accounting_config(tenant.org, request.into_config(tenant.org))
        .await?;
    Ok(api_success(config))
}

pub async fn create_retention_setting(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(request): ValidatedJson<CreateRetentionSettingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RetentionSetting>>), ApiError> {
    tenant.require(permissions::LEDGER_ADMIN)?;
    let setting = state
        .ledger
        .create_retention_setting(tenant.org, request.into())
        .await?;
    Ok((StatusCode::CREATED, api_success(setting)))
}

pub async fn list_retention_settings(
    State(state): State<AppState>,
    tenant: Tenant,
) -> ApiResult<Vec<RetentionSetting>> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.list_retention_settings(tenant.org).await?))
}
