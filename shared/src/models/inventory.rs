//! Inventory ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An append-only ledger entry recording one stock mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub transaction_type: TransactionType,
    /// Positive for additions, negative for deductions
    pub quantity: Decimal,
    pub reference_model: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub performed_by: Option<Uuid>,
    pub transaction_date: DateTime<Utc>,
}

/// Types of inventory transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    Sale,
    /// Material consumed by a production run (negative delta)
    ProductionIn,
    /// Product credited by a production run (positive delta)
    ProductionOut,
    /// Undo of an earlier production movement during a production update
    ProductionReversal,
    Adjustment,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Sale => "SALE",
            TransactionType::ProductionIn => "PRODUCTION_IN",
            TransactionType::ProductionOut => "PRODUCTION_OUT",
            TransactionType::ProductionReversal => "PRODUCTION_REVERSAL",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }

    /// Production movements are written only by the production executor
    pub fn is_production(&self) -> bool {
        matches!(
            self,
            TransactionType::ProductionIn
                | TransactionType::ProductionOut
                | TransactionType::ProductionReversal
        )
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(TransactionType::Purchase),
            "SALE" => Ok(TransactionType::Sale),
            "PRODUCTION_IN" => Ok(TransactionType::ProductionIn),
            "PRODUCTION_OUT" => Ok(TransactionType::ProductionOut),
            "PRODUCTION_REVERSAL" => Ok(TransactionType::ProductionReversal),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One material that cannot cover a production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shortage {
    pub item_id: Uuid,
    pub item_name: String,
    pub required: Decimal,
    pub available: Decimal,
    pub shortage: Decimal,
}

impl Shortage {
    pub fn new(item_id: Uuid, item_name: impl Into<String>, required: Decimal, available: Decimal) -> Self {
        Self {
            item_id,
            item_name: item_name.into(),
            required,
            available,
            shortage: required - available,
        }
    }
}

/// Result of comparing an item's stored quantity against its ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerReconciliation {
    pub item_id: Uuid,
    pub recorded_quantity: Decimal,
    pub ledger_total: Decimal,
    pub drift: Decimal,
}

impl LedgerReconciliation {
    pub fn new(item_id: Uuid, recorded_quantity: Decimal, ledger_total: Decimal) -> Self {
        Self {
            item_id,
            recorded_quantity,
            ledger_total,
            drift: recorded_quantity - ledger_total,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}
