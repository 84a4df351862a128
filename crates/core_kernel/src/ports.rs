//! Ports and Adapters Infrastructure
//!
//! Foundational types for the hexagonal layout of the workspace: the ledger
//! domain defines a port trait extending the markers here, and adapters
//! (PostgreSQL, in-memory) implement it.
//!
//! ```text
//!        interface_api handlers
//!                 │
//!                 ▼
//!   LedgerPort (domain_ledger, depends only on core_kernel)
//!          ▲                         ▲
//!   PostgresLedgerStore        InMemoryLedgerStore
//!      (infra_db)               (domain_ledger)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::UserId;

/// Marker trait for all domain ports
///
/// Ports must be thread-safe so a single adapter can serve concurrent
/// requests behind an `Arc<dyn …>`.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// Adapter is healthy and operational
    Healthy,
    /// Adapter is degraded but operational
    Degraded,
    /// Adapter is unhealthy and not operational
    Unhealthy,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Timestamp of the health check
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Builds a healthy result for the given adapter
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    /// Builds an unhealthy result carrying the failure message
    pub fn unhealthy(
        adapter_id: impl Into<String>,
        latency_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Trait for adapters that support health checks
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}

/// Metadata about a port operation for auditing and tracing
///
/// The core does not authorize callers; it records who asked for an
/// audit-worthy mutation when the caller supplies it.
#[derive(Debug, Clone, Default)]
pub struct OperationMetadata {
    /// Correlation ID for tracing across systems
    pub correlation_id: Option<String>,
    /// Authenticated actor that initiated the operation
    pub actor: Option<UserId>,
}

impl OperationMetadata {
    /// Creates metadata for an authenticated actor
    pub fn for_actor(actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            ..Default::default()
        }
    }

    /// Adds a correlation ID to the metadata
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_metadata() {
        let actor = UserId::new();
        let metadata = OperationMetadata::for_actor(actor).with_correlation_id("req-123");

        assert_eq!(metadata.actor, Some(actor));
        assert_eq!(metadata.correlation_id, Some("req-123".to_string()));
    }

    #[test]
    fn test_health_results() {
        let ok = HealthCheckResult::healthy("memory", 0);
        assert_eq!(ok.status, AdapterHealth::Healthy);
        assert!(ok.message.is_none());

        let down = HealthCheckResult::unhealthy("postgres", 12, "connection refused");
        assert_eq!(down.status, AdapterHealth::Unhealthy);
        assert_eq!(down.message.as_deref(), Some("connection refused"));
    }
}
