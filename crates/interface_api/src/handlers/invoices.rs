//! Invoice, allocation and retention handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{InvoiceId, Money, OperationMetadata};
use domain_ledger::{LedgerPort, PaymentAllocation, Retention};

use crate::auth::{permissions, Tenant};
use crate::dto::invoices::{
    ApplyAllocationRequest, CreateInvoiceRequest, InvoiceView, RecordRetentionRequest,
};
use crate::dto::ValidatedJson;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

pub async fn create_invoice(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(request): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceView>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let invoice = state.ledger.create_invoice(tenant.org, request.into()).await?;
    tracing::info!(
        invoice_id = %invoice.id,
        document = %invoice.document_code(),
        "invoice created"
    );
    Ok((StatusCode::CREATED, api_success(invoice.into())))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<InvoiceId>,
) -> Result<Json<ApiResponse<InvoiceView>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    let invoice = state.ledger.get_invoice(tenant.org, id).await?;
    Ok(api_success(invoice.into()))
}

/// Applies part of an existing payment or retention to the invoice
pub async fn apply_allocation(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    Path(id): Path<InvoiceId>,
    ValidatedJson(request): ValidatedJson<ApplyAllocationRequest>,
) -> Result<Json<ApiResponse<InvoiceView>>, ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let invoice = state
        .ledger
        .apply_allocation(
            tenant.org,
            id,
            Money::new(request.amount),
            request.source,
            request.notes,
        )
        .await?;

    tracing::info!(
        invoice_id = %id,
        source = ?request.source,
        allocated = %invoice.amount_allocated,
        actor = ?metadata.actor,
        correlation_id = ?metadata.correlation_id,
        "allocation applied"
    );
    Ok(api_success(invoice.into()))
}

pub async fn list_allocations(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<InvoiceId>,
) -> Result<Json<ApiResponse<Vec<PaymentAllocation>>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.list_allocations(tenant.org, id).await?))
}

pub async fn list_retentions(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<InvoiceId>,
) -> Result<Json<ApiResponse<Vec<Retention>>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.list_retentions(tenant.org, id).await?))
}

/// Records a retention with its journal entry and its allocation to the invoice
pub async fn record_retention(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    ValidatedJson(request): ValidatedJson<RecordRetentionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Retention>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let retention = state
        .ledger
        .record_retention(tenant.org, request.into())
        .await?;

    tracing::info!(
        retention_id = %retention.id,
        invoice_id = %retention.invoice_id,
        amount = %retention.amount,
        actor = ?metadata.actor,
        correlation_id = ?metadata.correlation_id,
        "retention recorded"
    );
    Ok((StatusCode::CREATED, api_success(retention)))
}
