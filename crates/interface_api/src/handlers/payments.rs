//! Payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{OperationMetadata, PaymentId};
use domain_ledger::{LedgerPort, Payment, PaymentReceipt};

use crate::auth::{permissions, Tenant};
use crate::dto::invoices::CreatePaymentRequest;
use crate::dto::ValidatedJson;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

/// Records a payment together with its allocations
pub async fn record_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let receipt = state.ledger.record_payment(tenant.org, request.into()).await?;

    tracing::info!(
        payment_id = %receipt.payment.id,
        amount = %receipt.payment.amount,
        allocations = receipt.allocations.len(),
        actor = ?metadata.actor,
        correlation_id = ?metadata.correlation_id,
        "payment recorded"
    );
    Ok((StatusCode::CREATED, api_success(receipt)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<PaymentId>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.get_payment(tenant.org, id).await?))
}
