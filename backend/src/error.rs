//! Error handling for the Koperasi back-office server
//!
//! Domain failures from the engine are mapped onto HTTP statuses here so the
//! services can simply propagate with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Request shape errors reported by validator
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    /// Not-found helper for rows looked up by id outside the engine
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        AppError::Domain(DomainError::not_found(entity, id))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Domain(err) => match err {
                DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
                DomainError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::DataIntegrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Domain(err) => {
                let detail = ErrorDetail::new(err.code(), err.to_string());
                match err {
                    DomainError::Validation { field, message } => {
                        ErrorDetail::new(err.code(), message.clone()).with_field(field.clone())
                    }
                    DomainError::InvalidTransition { entity, from, to } => detail.with_details(
                        serde_json::json!({ "entity": entity, "from": from, "to": to }),
                    ),
                    DomainError::InsufficientStock {
                        stock_item_id,
                        requested,
                        available,
                    } => detail.with_details(serde_json::json!({
                        "stock_item_id": stock_item_id,
                        "requested": requested,
                        "available": available,
                    })),
                    DomainError::NotFound { .. } | DomainError::DataIntegrity(_) => detail,
                }
            }
            AppError::Unauthorized(msg) => ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            AppError::InsufficientPermissions(permission) => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                format!("Permission denied: requires {}", permission),
            ),
            AppError::InvalidRequest(errors) => {
                let field = errors.field_errors().keys().next().map(|f| f.to_string());
                let detail = ErrorDetail::new("VALIDATION_ERROR", errors.to_string());
                match field {
                    Some(field) => detail.with_field(field),
                    None => detail,
                }
            }
            AppError::Configuration(msg) => {
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg))
            }
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(msg) => ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            AppError::InternalError(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        if status.is_server_error() {
            tracing::error!(code = %detail.code, "Error: {:?}", self);
        } else {
            tracing::warn!(code = %detail.code, "Rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
