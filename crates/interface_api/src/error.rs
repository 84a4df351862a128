//! API error handling and the response envelope
//!
//! Successful responses are wrapped as `{"success": true, "data": ...}`,
//! failures as `{"success": false, "error": <code>, "message": ...}`. The
//! English message is rendered here; `middleware::localize_errors` swaps it
//! for the negotiated locale using the [`ErrorMessage`] left in the response
//! extensions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use core_kernel::ErrorKind;
use domain_ledger::LedgerError;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Wraps `data` in a success envelope
pub fn api_success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Error code plus the arguments its localized message needs
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub code: &'static str,
    pub args: Vec<(&'static str, String)>,
    pub details: Option<Vec<String>>,
}

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Missing permission: {0}")]
    Forbidden(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Configuration => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => status_for(e.kind()),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(e) => e.code(),
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::BadRequest(_) => "bad-request",
            ApiError::Validation(_) => "validation-failed",
        }
    }

    /// Code and message arguments for localization
    pub fn message(&self) -> ErrorMessage {
        let args = match self {
            ApiError::Ledger(e) => ledger_args(e),
            _ => Vec::new(),
        };
        let details = match self {
            ApiError::Validation(errors) => Some(validation_details(errors)),
            ApiError::BadRequest(reason) => Some(vec![reason.clone()]),
            _ => None,
        };
        ErrorMessage {
            code: self.code(),
            args,
            details,
        }
    }
}

fn ledger_args(error: &LedgerError) -> Vec<(&'static str, String)> {
    match error {
        LedgerError::UnbalancedEntry { debits, credits } => {
            vec![("debits", debits.to_string()), ("credits", credits.to_string())]
        }
        LedgerError::NegativeLineAmount { position } => vec![("position", position.to_string())],
        LedgerError::NonPositiveAmount(amount) => vec![("amount", amount.to_string())],
        LedgerError::MissingField(field) => vec![("field", field.to_string())],
        LedgerError::AllocationExceedsBalance { requested, remaining }
        | LedgerError::ExceedsRemaining { requested, remaining }
        | LedgerError::ExceedsOrderRemaining { requested, remaining } => vec![
            ("requested", requested.to_string()),
            ("remaining", remaining.to_string()),
        ],
        LedgerError::AllocationExceedsPayment { allocated, amount } => {
            vec![("allocated", allocated.to_string()), ("amount", amount.to_string())]
        }
        LedgerError::FlowMismatch { setting, invoice } => {
            vec![("setting", setting.to_string()), ("invoice", invoice.to_string())]
        }
        LedgerError::AccountsNotConfigured { flow } => vec![("flow", flow.to_string())],
        LedgerError::AccountInUse { reason, .. } => vec![("reason", reason.as_str().to_string())],
        LedgerError::DuplicateAccountCode(code) => vec![("code", code.clone())],
        LedgerError::InvalidStateTransition { from, to } => {
            vec![("from", from.clone()), ("to", to.clone())]
        }
        _ => Vec::new(),
    }
}

fn validation_details(errors: &ValidationErrors) -> Vec<String> {
    let mut details: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();
    details.sort();
    details
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Ledger(LedgerError::Storage(message)) => {
                error!(%message, "storage failure");
            }
            _ => warn!(
                code = self.code(),
                status = status.as_u16(),
                error = %self,
                "request rejected"
            ),
        }

        let message = self.message();
        let body = ErrorResponse {
            success: false,
            error: message.code.to_string(),
            // storage detail stays in the logs
            message: match &self {
                ApiError::Ledger(LedgerError::Storage(_)) => "Internal error".to_string(),
                _ => self.to_string(),
            },
            details: message.details.clone(),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(message);
        response
    }
}
