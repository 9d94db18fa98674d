//! Bill of materials models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ItemType;

/// One input line of an output item's bill of materials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomEntry {
    pub id: Uuid,
    pub output_item_id: Uuid,
    pub input_item_id: Uuid,
    /// Amount of input needed for one unit of output
    pub quantity_required: Decimal,
    pub unit_of_measure: String,
    /// Assembly order
    pub sequence: i32,
    pub is_optional: bool,
    pub is_default: bool,
    /// Entries sharing a group on the same output are mutually exclusive substitutes
    pub alternative_group: Option<String>,
}

impl BomEntry {
    pub fn in_group(&self, group: &str) -> bool {
        self.alternative_group.as_deref() == Some(group)
    }
}

/// A customer's choice of one component within an alternative group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Selection {
    pub group: String,
    pub component_id: Uuid,
}

impl Selection {
    pub fn new(group: impl Into<String>, component_id: Uuid) -> Self {
        Self {
            group: group.into(),
            component_id,
        }
    }
}

/// A position in a product's BOM: a plain component or an alternative group
/// with its default component and substitutes. A group made only of optional
/// entries has no default, so `component` is `None` and every member is an
/// alternative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomSlot {
    pub group: Option<String>,
    pub component: Option<BomEntry>,
    pub alternatives: Vec<BomEntry>,
}

impl BomSlot {
    /// Assembly position: the default's sequence, else the earliest alternative
    pub fn sequence(&self) -> i32 {
        self.component
            .iter()
            .chain(self.alternatives.iter())
            .map(|e| e.sequence)
            .min()
            .unwrap_or(i32::MAX)
    }
}

/// Node of a recursively expanded BOM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomNode {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub quantity: Decimal,
    pub unit: String,
    pub sequence: i32,
    pub level: usize,
    pub children: Vec<BomNode>,
}

/// Recursively expanded BOM of an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomTree {
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub item_type: ItemType,
    pub components: Vec<BomNode>,
}

impl BomTree {
    /// Deepest level present in the tree, 0 for a flat BOM
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[BomNode]) -> usize {
            nodes
                .iter()
                .map(|n| n.level.max(walk(&n.children)))
                .max()
                .unwrap_or(0)
        }
        walk(&self.components)
    }
}

/// Total amount of one leaf material needed for a production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialRequirement {
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub quantity: Decimal,
    pub unit_of_measure: String,
    pub available_quantity: Decimal,
}

impl MaterialRequirement {
    pub fn is_satisfied(&self) -> bool {
        self.available_quantity >= self.quantity
    }
}

/// Direct (single level) input suggestion for a planned run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedInput {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity_required: Decimal,
    pub unit_of_measure: String,
}
