//! Core error types used across the system

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::MoneyError;

/// Classification shared by every failure the bookkeeping core can report
///
/// Domain and infrastructure errors each map onto exactly one kind, which the
/// API layer uses to choose a status code and a localized message family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input: unbalanced entry, non-positive amount, missing field
    Validation,
    /// Entity absent or owned by another organization
    NotFound,
    /// Operation collides with existing state (balance exceeded, duplicate key)
    Conflict,
    /// Accounting configuration is incomplete for the requested operation
    Configuration,
    /// Entity is in a state that forbids the operation (account in use)
    State,
    /// Backing store failure; never a business outcome
    Infrastructure,
}

impl ErrorKind {
    /// Returns the stable wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Configuration => "configuration",
            ErrorKind::State => "state",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }

    /// Returns true for failures callers can act on (everything but storage faults)
    pub fn is_business(&self) -> bool {
        !matches!(self, ErrorKind::Infrastructure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoreError::InvalidStateTransition(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    /// Returns the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Money(_) | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::InvalidStateTransition(_) => ErrorKind::State,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}
