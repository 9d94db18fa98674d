//! Production process models: planned jobs tracked from plan to completion

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a production process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Planned => "PLANNED",
            ProcessStatus::InProgress => "IN_PROGRESS",
            ProcessStatus::Completed => "COMPLETED",
            ProcessStatus::Cancelled => "CANCELLED",
        }
    }

    /// Planned or in progress
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessStatus::Planned | ProcessStatus::InProgress)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANNED" => Ok(ProcessStatus::Planned),
            "IN_PROGRESS" => Ok(ProcessStatus::InProgress),
            "COMPLETED" => Ok(ProcessStatus::Completed),
            "CANCELLED" => Ok(ProcessStatus::Cancelled),
            other => Err(format!("unknown process status: {}", other)),
        }
    }
}

/// Requested lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    Start,
    Complete,
    Cancel,
}

impl ProcessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessAction::Start => "start",
            ProcessAction::Complete => "complete",
            ProcessAction::Cancel => "cancel",
        }
    }
}

/// A production job or batch with its target output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionProcess {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProcessStatus,
    pub target_output_item_id: Uuid,
    pub target_output_quantity: Decimal,
    pub process_start_date: Option<DateTime<Utc>>,
    pub process_end_date: Option<DateTime<Utc>>,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Material recorded as used by a process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessInput {
    pub id: Uuid,
    pub process_id: Uuid,
    pub item_id: Uuid,
    pub quantity_consumed: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Product recorded as made by a process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessOutput {
    pub id: Uuid,
    pub process_id: Uuid,
    pub item_id: Uuid,
    pub quantity_produced: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A process with its recorded inputs and outputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessDetails {
    pub process: ProductionProcess,
    pub inputs: Vec<ProcessInput>,
    pub outputs: Vec<ProcessOutput>,
    /// Produced over target as a percentage, only once completed
    pub efficiency: Option<Decimal>,
}
