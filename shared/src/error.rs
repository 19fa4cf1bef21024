//! Domain error taxonomy for the order lifecycle engine
//!
//! Every error is local to one transition attempt and carries enough detail
//! to identify the offending order, item or batch.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the domain engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed or out-of-range input, rejected before any side effect
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Requested status change is not an edge of the transition table
    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Allocation cannot be satisfied from the available batches
    #[error("Insufficient stock for item {stock_item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        stock_item_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invariant is already broken; requires operator intervention
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code, shared with the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::DataIntegrity(_) => "DATA_INTEGRITY",
        }
    }
}

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
