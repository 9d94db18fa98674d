//! Production planning: stock checks and the movements a run writes
//!
//! A plan is computed against an [`InventorySnapshot`] of the involved items
//! (in the backend, rows locked for the duration of the transaction). Nothing
//! is returned unless every material is covered, so a rejected run never
//! leaves partial movements behind.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bom::MaterialRequirements;
use crate::error::{BomError, BomResult};
use crate::models::{Item, ProductionItem, ProductionRecord, Shortage, TransactionType};

/// Current stock of one item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: Decimal,
}

/// Stock levels of the items a production run touches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySnapshot {
    levels: HashMap<Uuid, StockLevel>,
}

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(levels: impl IntoIterator<Item = StockLevel>) -> Self {
        Self {
            levels: levels.into_iter().map(|l| (l.item_id, l)).collect(),
        }
    }

    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        Self::from_levels(items.into_iter().map(|i| StockLevel {
            item_id: i.id,
            item_name: i.name.clone(),
            quantity: i.quantity,
        }))
    }

    pub fn quantity(&self, item_id: Uuid) -> Decimal {
        self.levels
            .get(&item_id)
            .map(|l| l.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn name(&self, item_id: Uuid) -> String {
        self.levels
            .get(&item_id)
            .map(|l| l.item_name.clone())
            .unwrap_or_else(|| item_id.to_string())
    }

    pub fn contains(&self, item_id: Uuid) -> bool {
        self.levels.contains_key(&item_id)
    }

    pub fn levels(&self) -> impl Iterator<Item = &StockLevel> {
        self.levels.values()
    }

    /// Apply every movement of a plan
    pub fn apply(&mut self, movements: &[StockMovement]) {
        for movement in movements {
            let level = self
                .levels
                .entry(movement.item_id)
                .or_insert_with(|| StockLevel {
                    item_id: movement.item_id,
                    item_name: movement.item_id.to_string(),
                    quantity: Decimal::ZERO,
                });
            level.quantity += movement.delta;
        }
    }

    /// Quantities of the given items, ordered by id, for audit snapshots
    pub fn quantities_of(&self, ids: &BTreeSet<Uuid>) -> BTreeMap<Uuid, Decimal> {
        ids.iter().map(|id| (*id, self.quantity(*id))).collect()
    }
}

/// One signed stock change, written as a ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub item_id: Uuid,
    pub delta: Decimal,
    pub transaction_type: TransactionType,
    pub note: String,
}

/// Everything a production run (or its edit) writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionPlan {
    pub output_item_id: Uuid,
    pub output_quantity: Decimal,
    pub consumed: Vec<ProductionItem>,
    /// Ledger movements in the order they must be applied
    pub movements: Vec<StockMovement>,
}

impl ProductionPlan {
    /// Net quantity change of one item across all movements
    pub fn net_change(&self, item_id: Uuid) -> Decimal {
        self.movements
            .iter()
            .filter(|m| m.item_id == item_id)
            .map(|m| m.delta)
            .sum()
    }

    pub fn touched_items(&self) -> BTreeSet<Uuid> {
        self.movements.iter().map(|m| m.item_id).collect()
    }
}

/// Every requirement the snapshot cannot cover, not just the first
pub fn find_shortages(requirements: &MaterialRequirements, snapshot: &InventorySnapshot) -> Vec<Shortage> {
    requirements
        .values()
        .filter_map(|req| {
            let available = snapshot.quantity(req.item_id);
            (available < req.quantity)
                .then(|| Shortage::new(req.item_id, req.item_name.clone(), req.quantity, available))
        })
        .collect()
}

/// Plan a new production run of `quantity` units of `output`.
///
/// Requirement availability is refreshed from the snapshot, which is the
/// authoritative (locked) stock view.
pub fn plan_production(
    output: &Item,
    quantity: Decimal,
    mut requirements: MaterialRequirements,
    snapshot: &InventorySnapshot,
) -> BomResult<(ProductionPlan, MaterialRequirements)> {
    if output.is_raw_material() {
        return Err(BomError::validation(
            "item_id",
            format!("{} is a raw material and cannot be produced", output.name),
        ));
    }
    if quantity <= Decimal::ZERO {
        return Err(BomError::InvalidQuantity(format!(
            "production quantity must be positive, got {}",
            quantity
        )));
    }

    for req in requirements.values_mut() {
        req.available_quantity = snapshot.quantity(req.item_id);
    }
    let shortages = find_shortages(&requirements, snapshot);
    if !shortages.is_empty() {
        return Err(BomError::InsufficientStock(shortages));
    }

    let mut movements: Vec<StockMovement> = requirements
        .values()
        .map(|req| StockMovement {
            item_id: req.item_id,
            delta: -req.quantity,
            transaction_type: TransactionType::ProductionIn,
            note: format!("Consumed producing {} x {}", quantity, output.name),
        })
        .collect();
    movements.push(StockMovement {
        item_id: output.id,
        delta: quantity,
        transaction_type: TransactionType::ProductionOut,
        note: format!("Produced {} x {}", quantity, output.name),
    });

    let consumed = requirements
        .values()
        .map(|req| ProductionItem {
            input_item_id: req.item_id,
            quantity_consumed: req.quantity,
            unit_of_measure: req.unit_of_measure.clone(),
        })
        .collect();

    Ok((
        ProductionPlan {
            output_item_id: output.id,
            output_quantity: quantity,
            consumed,
            movements,
        },
        requirements,
    ))
}

/// Sum consumed quantities per item, rejecting non-positive amounts
fn consumption_by_item(items: &[ProductionItem]) -> BomResult<BTreeMap<Uuid, Decimal>> {
    let mut totals = BTreeMap::new();
    for item in items {
        if item.quantity_consumed <= Decimal::ZERO {
            return Err(BomError::InvalidQuantity(format!(
                "consumed quantity for {} must be positive",
                item.input_item_id
            )));
        }
        *totals.entry(item.input_item_id).or_insert(Decimal::ZERO) += item.quantity_consumed;
    }
    Ok(totals)
}

/// Plan the edit of an existing run: reverse the original consumption and
/// output, then apply the new ones. Each step becomes its own movement so
/// the ledger records deltas, never overwrites.
pub fn plan_update(
    original: &ProductionRecord,
    new_output_quantity: Decimal,
    new_consumed: Vec<ProductionItem>,
    snapshot: &InventorySnapshot,
) -> BomResult<ProductionPlan> {
    if new_output_quantity <= Decimal::ZERO {
        return Err(BomError::InvalidQuantity(format!(
            "production quantity must be positive, got {}",
            new_output_quantity
        )));
    }
    if new_consumed
        .iter()
        .any(|c| c.input_item_id == original.output_item_id)
    {
        return Err(BomError::validation(
            "consumed_items",
            "A production run cannot consume its own output item",
        ));
    }
    let new_totals = consumption_by_item(&new_consumed)?;
    let output_id = original.output_item_id;

    let mut movements: Vec<StockMovement> = original
        .consumed_items
        .iter()
        .map(|c| StockMovement {
            item_id: c.input_item_id,
            delta: c.quantity_consumed,
            transaction_type: TransactionType::ProductionReversal,
            note: format!("Production {} update: returning consumed item", original.id),
        })
        .collect();
    movements.push(StockMovement {
        item_id: output_id,
        delta: -original.output_quantity,
        transaction_type: TransactionType::ProductionReversal,
        note: format!("Production {} update: withdrawing original output", original.id),
    });

    let mut working = snapshot.clone();
    working.apply(&movements);

    let mut shortages = Vec::new();
    let output_after_reversal = working.quantity(output_id);
    if output_after_reversal < Decimal::ZERO {
        shortages.push(Shortage::new(
            output_id,
            snapshot.name(output_id),
            original.output_quantity,
            snapshot.quantity(output_id),
        ));
    }
    for (item_id, required) in &new_totals {
        let available = working.quantity(*item_id);
        if available < *required {
            shortages.push(Shortage::new(*item_id, snapshot.name(*item_id), *required, available));
        }
    }
    if !shortages.is_empty() {
        return Err(BomError::InsufficientStock(shortages));
    }

    movements.extend(new_totals.iter().map(|(item_id, qty)| StockMovement {
        item_id: *item_id,
        delta: -*qty,
        transaction_type: TransactionType::ProductionIn,
        note: format!("Production {} update: new consumption", original.id),
    }));
    movements.push(StockMovement {
        item_id: output_id,
        delta: new_output_quantity,
        transaction_type: TransactionType::ProductionOut,
        note: format!("Production {} update: new output", original.id),
    });

    Ok(ProductionPlan {
        output_item_id: output_id,
        output_quantity: new_output_quantity,
        consumed: new_consumed,
        movements,
    })
}
