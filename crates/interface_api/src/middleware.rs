//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::OperationMetadata;

use crate::auth::Claims;
use crate::error::{ApiError, ErrorMessage, ErrorResponse};
use crate::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authentication middleware
///
/// Validates the bearer token and stores its claims on the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        warn!("Missing or invalid Authorization header");
        return Err(ApiError::Unauthorized);
    };

    match crate::auth::validate_token(token, &state.config.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Audit logging middleware
///
/// Logs every API request with the caller, its organization and the
/// correlation id
pub async fn audit_middleware(
    State(_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let claims = request.extensions().get::<Claims>().cloned();

    let mut metadata = claims
        .as_ref()
        .and_then(Claims::user_id)
        .map(OperationMetadata::for_actor)
        .unwrap_or_default();
    if let Some(id) = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        metadata = metadata.with_correlation_id(id);
    }
    request.extensions_mut().insert(metadata.clone());

    let user = claims
        .as_ref()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let org = claims
        .as_ref()
        .map(|c| c.organization_id().to_string())
        .unwrap_or_default();

    let start = Utc::now();
    let response = next.run(request).await;
    let duration = Utc::now() - start;

    info!(
        method = %method,
        uri = %uri,
        user = %user,
        org = %org,
        correlation_id = metadata.correlation_id.as_deref().unwrap_or("-"),
        status = response.status().as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}

/// Re-renders error bodies in the locale negotiated from `Accept-Language`
pub async fn localize_errors(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let accept_language = request
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;
    let Some(message) = response.extensions().get::<ErrorMessage>().cloned() else {
        return response;
    };

    let locale = state.localizer.negotiate(accept_language.as_deref());
    let Some(text) = state.localizer.format(&locale, message.code, &message.args) else {
        return response;
    };

    let status = response.status();
    let body = ErrorResponse {
        success: false,
        error: message.code.to_string(),
        message: text,
        details: message.details,
    };
    let mut localized = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&locale.to_string()) {
        localized.headers_mut().insert(header::CONTENT_LANGUAGE, value);
    }
    localized
}
