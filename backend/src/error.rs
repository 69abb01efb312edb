//! Error handling for the ERP back-office
//!
//! Every failure is returned as `{"error": {"code", "message", ...}}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{describe_shortfalls, HeldStockTransition, Shortfall, StockError, UnknownStatus};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {}", describe_shortfalls(.0))]
    InsufficientStock(Vec<Shortfall>),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: &str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_)
            | AppError::Conflict { .. }
            | AppError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = match &self {
            AppError::Unauthorized(msg) => ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => ErrorDetail::new("FORBIDDEN", msg.clone()),
            AppError::Validation { field, message } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
            },
            AppError::ValidationError(msg) => ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            AppError::DuplicateEntry(field) => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
            },
            AppError::Conflict { resource, message } => ErrorDetail {
                field: Some(resource.clone()),
                ..ErrorDetail::new("CONFLICT", message.clone())
            },
            AppError::NotFound(resource) => {
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::InvalidStateTransition(msg) => {
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone())
            }
            AppError::InsufficientStock(shortfalls) => ErrorDetail {
                details: serde_json::to_value(shortfalls).ok(),
                ..ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    format!("Insufficient stock for {}", describe_shortfalls(shortfalls)),
                )
            },
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(msg) => ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            AppError::InternalError(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match errors.errors().keys().next() {
            Some(field) => AppError::Validation {
                field: field.to_string(),
                message: errors.to_string(),
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient(shortfalls) => AppError::InsufficientStock(shortfalls),
            StockError::NonPositiveQuantity => AppError::validation("quantity", err.to_string()),
            StockError::NegativeLevel => AppError::validation("quantity", err.to_string()),
            StockError::UnknownMovementType(_) => {
                AppError::validation("movement_type", err.to_string())
            }
            StockError::UnknownProduct(id) => AppError::NotFound(format!("Product {}", id)),
            StockError::Overflow => AppError::validation("quantity", err.to_string()),
        }
    }
}

impl From<UnknownStatus> for AppError {
    fn from(err: UnknownStatus) -> Self {
        AppError::Internal(format!("stored order has {}", err))
    }
}

impl From<HeldStockTransition> for AppError {
    fn from(err: HeldStockTransition) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::validation("price", "Price must be greater than zero").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("Order".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidStateTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_stock_error_conversion() {
        let shortfall = Shortfall {
            product_id: Uuid::nil(),
            reference: "P-1".to_string(),
            requested: 4,
            available: 1,
        };
        let err: AppError = StockError::Insufficient(vec![shortfall]).into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.to_string(),
            "Insufficient stock: P-1 (requested 4, available 1)"
        );

        let err: AppError = StockError::NonPositiveQuantity.into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
    }

    #[test]
    fn test_insufficient_stock_response_status() {
        let response = AppError::InsufficientStock(Vec::new()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
