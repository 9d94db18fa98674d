//! Item catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw material, intermediate product or final product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub unit_of_measure: String,
    /// Materialized stock level; only production and ledger operations move it
    pub quantity: Decimal,
    pub minimum_stock_level: Decimal,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub dealer_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_raw_material(&self) -> bool {
        self.item_type == ItemType::Raw
    }

    pub fn is_intermediate_product(&self) -> bool {
        self.item_type == ItemType::Intermediate
    }

    pub fn is_final_product(&self) -> bool {
        self.item_type == ItemType::Final
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.minimum_stock_level
    }
}

/// Item classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Raw,
    Intermediate,
    Final,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Raw => "RAW",
            ItemType::Intermediate => "INTERMEDIATE",
            ItemType::Final => "FINAL",
        }
    }

    /// Raw materials are bought, never produced
    pub fn is_producible(&self) -> bool {
        !matches!(self, ItemType::Raw)
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Raw => write!(f, "Raw Material"),
            ItemType::Intermediate => write!(f, "Intermediate Product"),
            ItemType::Final => write!(f, "Final Product"),
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAW" => Ok(ItemType::Raw),
            "INTERMEDIATE" => Ok(ItemType::Intermediate),
            "FINAL" => Ok(ItemType::Final),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}
