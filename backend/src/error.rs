//! Error handling for the production inventory server
//!
//! Every failure is rendered inside the `{data, error, status}` envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{BomError, Shortage};
use thiserror::Error;
use uuid::Uuid;

use crate::response::ApiResponse;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid component selection: component {component_id} not found in group {group}")]
    InvalidSelection { group: String, component_id: Uuid },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Missing actor identity")]
    MissingActor,

    // Business logic errors
    #[error("Insufficient materials")]
    InsufficientStock { shortages: Vec<Shortage> },

    #[error("Invalid bill of materials: {0}")]
    InvalidBom(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A guarded stock update found less stock than the locked read promised
    #[error("Concurrent stock change on item {0}")]
    StockConflict(Uuid),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<BomError> for AppError {
    fn from(err: BomError) -> Self {
        match err {
            BomError::ItemNotFound(id) => AppError::NotFound(format!("Item {}", id)),
            BomError::ProductionNotFound(id) => {
                AppError::NotFound(format!("Production record {}", id))
            }
            BomError::Validation { field, message } => AppError::Validation { field, message },
            BomError::InvalidSelection {
                group,
                component_id,
            } => AppError::InvalidSelection {
                group,
                component_id,
            },
            BomError::InvalidQuantity(msg) => AppError::Validation {
                field: "quantity".to_string(),
                message: msg,
            },
            err @ (BomError::BomCycle { .. } | BomError::BomTooDeep { .. }) => {
                AppError::InvalidBom(err.to_string())
            }
            err @ BomError::InvalidTransition { .. } => AppError::InvalidState(err.to_string()),
            BomError::InsufficientStock(shortages) => AppError::InsufficientStock { shortages },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first().and_then(|(field, errs)| errs.first().map(|e| (*field, e))) {
            Some((field, err)) => AppError::Validation {
                field: field.to_string(),
                message: err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field)),
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error payload carried in the envelope's `error` field
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_materials: Option<Vec<Shortage>>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            missing_materials: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl AppError {
    /// Status code and error payload for this error
    pub fn detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field.clone()),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::InvalidSelection { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_SELECTION", self.to_string())
                    .with_field("component_selections"),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
                .with_field(field.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::MissingActor => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("MISSING_ACTOR", "Missing or invalid X-Actor-Id header"),
            ),
            AppError::InsufficientStock { shortages } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    missing_materials: Some(shortages.clone()),
                    ..ErrorDetail::new("INSUFFICIENT_MATERIALS", "Insufficient raw materials")
                },
            ),
            AppError::InvalidBom(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_BOM", msg.clone()),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATE", msg.clone()),
            ),
            AppError::StockConflict(item_id) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "STOCK_CONFLICT",
                    format!("Stock of item {} changed during production, nothing was applied", item_id),
                ),
            ),
            AppError::DatabaseError(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", "Record not found"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ApiResponse::<()>::failure(status, detail))).into_response()
    }
}

/// Map a unique-constraint violation to a duplicate-entry error
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
