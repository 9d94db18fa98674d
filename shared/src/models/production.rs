//! Production run models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Item, MaterialRequirement, Selection};

/// A recorded production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionRecord {
    pub id: Uuid,
    pub output_item_id: Uuid,
    pub output_quantity: Decimal,
    pub executed_by: Uuid,
    pub execution_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Variant the run was produced with, reused when the run is edited
    pub component_selections: Vec<Selection>,
    pub consumed_items: Vec<ProductionItem>,
}

/// Material actually consumed by a production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionItem {
    pub input_item_id: Uuid,
    pub quantity_consumed: Decimal,
    pub unit_of_measure: String,
}

/// Audit actions on a production record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Updated,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "CREATED",
            HistoryAction::Updated => "UPDATED",
        }
    }
}

impl std::str::FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(HistoryAction::Created),
            "UPDATED" => Ok(HistoryAction::Updated),
            other => Err(format!("unknown history action: {}", other)),
        }
    }
}

/// Audit entry with before/after snapshots of a production change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionHistory {
    pub id: Uuid,
    pub production_id: Uuid,
    pub action: HistoryAction,
    pub performed_by: Uuid,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
}

/// Outcome of a successful production run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionResult {
    pub production_id: Uuid,
    pub product: Item,
    pub quantity_produced: Decimal,
    pub materials_consumed: Vec<MaterialRequirement>,
}
