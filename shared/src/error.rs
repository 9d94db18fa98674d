//! Errors raised by the BOM engine and production planner

use thiserror::Error;
use uuid::Uuid;

use crate::models::Shortage;

/// Business-rule failures detected before any stock is touched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BomError {
    #[error("Item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Production record {0} not found")]
    ProductionNotFound(Uuid),

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid component selection: component {component_id} not found in group {group}")]
    InvalidSelection { group: String, component_id: Uuid },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("BOM cycle detected: {}", path.join(" -> "))]
    BomCycle { path: Vec<String> },

    #[error("BOM nesting exceeds maximum depth of {max_depth}")]
    BomTooDeep { max_depth: usize },

    #[error("Cannot {action} a process with status {status}")]
    InvalidTransition { status: String, action: String },

    #[error("Insufficient materials: {} item(s) short", .0.len())]
    InsufficientStock(Vec<Shortage>),
}

impl BomError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BomError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type BomResult<T> = Result<T, BomError>;
