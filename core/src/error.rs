//! Error handling for the Warehouse Stock Management Platform
//!
//! Every error carries a stable machine code so the embedding application
//! can translate messages for its own audience.

use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Composition error: {0}")]
    Composition(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("No active recipe: {0}")]
    NoActiveRecipe(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("No containers available: {0}")]
    ContainerUnavailable(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

/// Error detail surfaced to the embedding application
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Stable machine code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Composition(_) => "COMPOSITION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NoActiveRecipe(_) => "NO_ACTIVE_RECIPE",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::ContainerUnavailable(_) => "CONTAINER_UNAVAILABLE",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the detail record surfaced to callers
    pub fn detail(&self) -> ErrorDetail {
        // Log the error once, at the boundary
        tracing::error!("Error: {:?}", self);

        let (message, field) = match self {
            AppError::Validation { field, message } => (message.clone(), Some(field.clone())),
            AppError::ValidationError(msg) => (msg.clone(), None),
            AppError::Composition(msg) => (msg.clone(), None),
            AppError::DuplicateEntry(what) => {
                (format!("A record with this {} already exists", what), Some(what.clone()))
            }
            AppError::NotFound(resource) => (format!("{} not found", resource), None),
            AppError::NoActiveRecipe(item) => {
                (format!("No active recipe for {}", item), None)
            }
            AppError::InsufficientStock(msg) => (msg.clone(), None),
            AppError::ContainerUnavailable(msg) => (msg.clone(), None),
            AppError::InvalidStateTransition(msg) => (msg.clone(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::Internal(msg) => (msg.clone(), None),
            AppError::InternalError(_) => ("An internal error occurred".to_string(), None),
        };

        ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
        }
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
