//! HTTP API Layer
//!
//! This crate exposes the bookkeeping core over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per ledger area
//! - **Middleware**: Authentication, audit logging, error localization
//! - **DTOs**: Validated request bodies and response views
//! - **Error Handling**: `{"success": ..., ...}` envelopes with localized messages
//!
//! Every `/api/v1` route is scoped to the organization carried by the
//! caller's bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(store, config)?;
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod i18n;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_ledger::LedgerPort;

use crate::config::ApiConfig;
use crate::handlers::{accounts, health, invoices, journal, payments, purchase_orders, statements};
use crate::i18n::{I18nError, Localizer};
use crate::middleware::{audit_middleware, auth_middleware, localize_errors};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerPort>,
    pub health: Arc<dyn HealthCheckable>,
    pub config: ApiConfig,
    pub localizer: Arc<Localizer>,
}

impl AppState {
    /// Builds the state around one ledger store
    ///
    /// Fails when `config.default_locale` has no bundled messages.
    pub fn new<S>(store: S, config: ApiConfig) -> Result<Self, I18nError>
    where
        S: LedgerPort + HealthCheckable,
    {
        let localizer = Localizer::new(&config.default_locale)?;
        let store = Arc::new(store);
        Ok(Self {
            ledger: store.clone(),
            health: store,
            config,
            localizer: Arc::new(localizer),
        })
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let account_routes = Router::new()
        .route("/", get(accounts::list_accounts).post(accounts::create_account))
        .route("/chart", get(accounts::chart_of_accounts))
        .route(
            "/:id",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route("/:id/usage", get(accounts::account_usage))
        .route("/:id/ledger", get(accounts::account_ledger));

    let journal_routes = Router::new()
        .route(
            "/",
            get(journal::list_journal_entries).post(journal::create_journal_entry),
        )
        .route("/:id", get(journal::get_journal_entry))
        .route("/:id/reverse", post(journal::reverse_journal_entry));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route(
            "/:id/allocations",
            get(invoices::list_allocations).post(invoices::apply_allocation),
        )
        .route("/:id/retentions", get(invoices::list_retentions));

    let purchase_order_routes = Router::new()
        .route("/", post(purchase_orders::create_purchase_order))
        .route("/:id", get(purchase_orders::get_purchase_order))
        .route("/:id/approve", post(purchase_orders::approve_purchase_order))
        .route("/:id/reject", post(purchase_orders::reject_purchase_order));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/accounts", account_routes)
        .route(
            "/accounting-config",
            get(accounts::get_accounting_config).put(accounts::save_accounting_config),
        )
        .route(
            "/retention-settings",
            get(accounts::list_retention_settings).post(accounts::create_retention_setting),
        )
        .nest("/journal-entries", journal_routes)
        .route("/general-ledger", get(journal::general_ledger))
        .nest("/invoices", invoice_routes)
        .route("/payments", post(payments::record_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route("/retentions", post(invoices::record_retention))
        .route("/contacts/:id/statement", get(statements::contact_statement))
        .nest("/purchase-orders", purchase_order_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), localize_errors))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
