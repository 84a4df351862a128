//! Journal entry and general ledger handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;

use core_kernel::{JournalEntryId, OperationMetadata};
use domain_ledger::{GeneralLedger, JournalEntry, LedgerPort, LedgerPortExt};

use crate::auth::{permissions, Tenant};
use crate::dto::journal::{CreateJournalEntryRequest, ReverseJournalEntryRequest};
use crate::dto::ValidatedJson;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

/// Posts a balanced entry
pub async fn create_journal_entry(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    ValidatedJson(request): ValidatedJson<CreateJournalEntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JournalEntry>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let entry = state
        .ledger
        .create_journal_entry(tenant.org, request.into())
        .await?;

    tracing::info!(
        entry_id = %entry.id,
        lines = entry.lines.len(),
        actor = ?metadata.actor,
        correlation_id = ?metadata.correlation_id,
        "journal entry posted"
    );
    Ok((StatusCode::CREATED, api_success(entry)))
}

pub async fn list_journal_entries(
    State(state): State<AppState>,
    tenant: Tenant,
) -> Result<Json<ApiResponse<Vec<JournalEntry>>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.list_journal_entries(tenant.org).await?))
}

pub async fn get_journal_entry(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<JournalEntryId>,
) -> Result<Json<ApiResponse<JournalEntry>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.get_journal_entry(tenant.org, id).await?))
}

/// Posts the offsetting entry; defaults to today's date
pub async fn reverse_journal_entry(
    State(state): State<AppState>,
    tenant: Tenant,
    Extension(metadata): Extension<OperationMetadata>,
    Path(id): Path<JournalEntryId>,
    ValidatedJson(request): ValidatedJson<ReverseJournalEntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JournalEntry>>), ApiError> {
    tenant.require(permissions::LEDGER_WRITE)?;
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
    let reversal = state
        .ledger
        .reverse_journal_entry(tenant.org, id, date, &request.reason)
        .await?;

    tracing::info!(
        entry_id = %id,
        reversal_id = %reversal.id,
        actor = ?metadata.actor,
        correlation_id = ?metadata.correlation_id,
        "journal entry reversed"
    );
    Ok((StatusCode::CREATED, api_success(reversal)))
}

/// Per-account totals and balances, recomputed from the journal
pub async fn general_ledger(
    State(state): State<AppState>,
    tenant: Tenant,
) -> Result<Json<ApiResponse<GeneralLedger>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(state.ledger.general_ledger(tenant.org).await?))
}
