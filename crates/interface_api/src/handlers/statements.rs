//! Contact statement handler

use axum::{
    extract::{Path, State},
    Json,
};

use core_kernel::ContactId;
use domain_ledger::{ContactStatement, LedgerPortExt};

use crate::auth::{permissions, Tenant};
use crate::error::{api_success, ApiError, ApiResponse};
use crate::AppState;

/// Invoices and payments of one contact, oldest first, with a running balance
pub async fn contact_statement(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(contact_id): Path<ContactId>,
) -> Result<Json<ApiResponse<ContactStatement>>, ApiError> {
    tenant.require(permissions::LEDGER_READ)?;
    Ok(api_success(
        state.ledger.contact_statement(tenant.org, contact_id).await?,
    ))
}
