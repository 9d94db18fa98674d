//! Recursive BOM expansion and material requirement totals

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{BomError, BomResult};
use crate::models::{BomEntry, BomNode, BomTree, MaterialRequirement, Selection, SuggestedInput};

use super::{customize, BomGraph};

/// Maximum BOM nesting followed before giving up
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Leaf materials keyed by item id
pub type MaterialRequirements = BTreeMap<Uuid, MaterialRequirement>;

/// Ratio times quantity, refusing results past `Decimal`'s range
fn scale(entry: &BomEntry, quantity: Decimal) -> BomResult<Decimal> {
    entry.quantity_required.checked_mul(quantity).ok_or_else(|| {
        BomError::InvalidQuantity(format!(
            "{} x {} exceeds the representable quantity range",
            entry.quantity_required, quantity
        ))
    })
}

/// Walks a loaded [`BomGraph`], refusing cycles and runaway nesting
#[derive(Debug, Clone, Copy)]
pub struct BomResolver<'g> {
    graph: &'g BomGraph,
    max_depth: usize,
}

impl<'g> BomResolver<'g> {
    pub fn new(graph: &'g BomGraph) -> Self {
        Self {
            graph,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn graph(&self) -> &'g BomGraph {
        self.graph
    }

    /// Push `item_id` on the current path, failing on revisit or excess depth
    fn enter(&self, path: &mut Vec<Uuid>, item_id: Uuid) -> BomResult<()> {
        if path.contains(&item_id) {
            let mut names: Vec<String> = path
                .iter()
                .skip_while(|id| **id != item_id)
                .map(|id| self.display_name(*id))
                .collect();
            names.push(self.display_name(item_id));
            return Err(BomError::BomCycle { path: names });
        }
        if path.len() >= self.max_depth {
            return Err(BomError::BomTooDeep {
                max_depth: self.max_depth,
            });
        }
        path.push(item_id);
        Ok(())
    }

    fn display_name(&self, id: Uuid) -> String {
        self.graph
            .get_item(id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Nested component tree with a `level` per node; raw inputs are leaves
    pub fn tree(&self, item_id: Uuid) -> BomResult<BomTree> {
        let item = self.graph.item(item_id)?;
        let mut path = Vec::new();
        let components = self.expand(item_id, 0, &mut path)?;
        Ok(BomTree {
            item_id: item.id,
            item_name: item.name.clone(),
            item_sku: item.sku.clone(),
            item_type: item.item_type,
            components,
        })
    }

    fn expand(&self, output_id: Uuid, level: usize, path: &mut Vec<Uuid>) -> BomResult<Vec<BomNode>> {
        self.enter(path, output_id)?;
        let mut nodes = Vec::new();
        for entry in self.graph.entries_for(output_id) {
            let input = self.graph.item(entry.input_item_id)?;
            let children = if input.is_raw_material() {
                Vec::new()
            } else {
                self.expand(input.id, level + 1, path)?
            };
            nodes.push(BomNode {
                id: entry.id,
                item_id: input.id,
                item_name: input.name.clone(),
                item_sku: input.sku.clone(),
                quantity: entry.quantity_required,
                unit: entry.unit_of_measure.clone(),
                sequence: entry.sequence,
                level,
                children,
            });
        }
        path.pop();
        Ok(nodes)
    }

    /// Leaf material totals for `quantity` units of `item_id` built with the
    /// given selections. Intermediates are expanded with their own default
    /// structure; an intermediate without a BOM is consumed as a leaf.
    pub fn requirements(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        selections: &[Selection],
    ) -> BomResult<MaterialRequirements> {
        if quantity <= Decimal::ZERO {
            return Err(BomError::InvalidQuantity(format!(
                "requested quantity must be positive, got {}",
                quantity
            )));
        }
        let entries = customize::customize(self.graph, item_id, selections)?;
        let mut totals: BTreeMap<Uuid, (Decimal, String)> = BTreeMap::new();
        let mut path = Vec::new();
        self.enter(&mut path, item_id)?;
        self.accumulate(&entries, quantity, &mut totals, &mut path)?;

        totals
            .into_iter()
            .map(|(id, (qty, unit))| {
                let item = self.graph.item(id)?;
                Ok((
                    id,
                    MaterialRequirement {
                        item_id: id,
                        item_name: item.name.clone(),
                        item_sku: item.sku.clone(),
                        quantity: qty,
                        unit_of_measure: unit,
                        available_quantity: item.quantity,
                    },
                ))
            })
            .collect()
    }

    fn accumulate(
        &self,
        entries: &[BomEntry],
        quantity: Decimal,
        totals: &mut BTreeMap<Uuid, (Decimal, String)>,
        path: &mut Vec<Uuid>,
    ) -> BomResult<()> {
        for entry in entries {
            let required = scale(entry, quantity)?;
            let input = self.graph.item(entry.input_item_id)?;

            if input.is_raw_material() || !self.graph.has_bom(input.id) {
                totals
                    .entry(input.id)
                    .and_modify(|(q, _)| *q += required)
                    .or_insert_with(|| (required, entry.unit_of_measure.clone()));
                continue;
            }

            self.enter(path, input.id)?;
            let sub_entries = customize::customize(self.graph, input.id, &[])?;
            self.accumulate(&sub_entries, required, totals, path)?;
            path.pop();
        }
        Ok(())
    }

    /// Direct inputs of the default structure scaled to `quantity`
    pub fn suggest_inputs(&self, item_id: Uuid, quantity: Decimal) -> BomResult<Vec<SuggestedInput>> {
        customize::customize(self.graph, item_id, &[])?
            .into_iter()
            .map(|entry| {
                let input = self.graph.item(entry.input_item_id)?;
                Ok(SuggestedInput {
                    item_id: input.id,
                    item_name: input.name.clone(),
                    quantity_required: scale(&entry, quantity)?,
                    unit_of_measure: entry.unit_of_measure,
                })
            })
            .collect()
    }
}
