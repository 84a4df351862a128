//! Purchase order handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{OperationMetadata, PurchaseOrderId};
use domain_ledger::{LedgerPort, PurchaseOrder};

use crate::auth::{permissions, Tenant};
use crate::dto::purchase_orders::CreatePurchaseOrderRequest;
use crate::dto::ValidatedJson;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

pub async fn create_purchase_order(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(request): ValidatedJson<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseOrder>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let order = state
        .ledger
        .create_purchase_order(tenant.org, request.into())
        .await?;
    Ok((StatusCode::CREATED, api_success(order)))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<ApiResponse<PurchaseOrder>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.get_purchase_order(tenant.org, id).await?))
}

pub async fn approve_purchase_order(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<ApiResponse<PurchaseOrder>>, ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let order = state.ledger.approve_purchase_order(tenant.org, id).await?;
    tracing::info!(order_id = %id, actor = ?metadata.actor, "purchase order approved");
    Ok(api_success(order))
}

pub async fn reject_purchase_order(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<ApiResponse<PurchaseOrder>>, ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let order = state.ledger.reject_purchase_order(tenant.org, id).await?;
    tracing::info!(order_id = %id, actor = ?metadata.actor, "purchase order rejected");
    Ok(api_success(order))
}
