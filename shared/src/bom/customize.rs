//! Alternative-group handling: the grouped product view and customized
//! component lists

use std::collections::HashSet;

use crate::error::{BomError, BomResult};
use crate::models::{BomEntry, BomSlot, Selection};

use super::BomGraph;

/// Default member of an alternative group: the first mandatory entry flagged
/// default, else the first mandatory entry. Groups made only of optional
/// entries have no default.
pub fn group_default<'a>(members: &[&'a BomEntry]) -> Option<&'a BomEntry> {
    members
        .iter()
        .find(|e| e.is_default && !e.is_optional)
        .or_else(|| members.iter().find(|e| !e.is_optional))
        .copied()
}

/// Groups in first-appearance order with their members
fn groups(entries: &[BomEntry]) -> Vec<(&str, Vec<&BomEntry>)> {
    let mut out: Vec<(&str, Vec<&BomEntry>)> = Vec::new();
    for entry in entries {
        let Some(group) = entry.alternative_group.as_deref() else {
            continue;
        };
        match out.iter_mut().find(|(name, _)| *name == group) {
            Some((_, members)) => members.push(entry),
            None => out.push((group, vec![entry])),
        }
    }
    out
}

fn ensure_producible(graph: &BomGraph, item_id: uuid::Uuid) -> BomResult<()> {
    let item = graph.item(item_id)?;
    if item.is_raw_material() {
        return Err(BomError::validation(
            "item_id",
            format!("{} is a raw material and has no bill of materials", item.name),
        ));
    }
    Ok(())
}

/// BOM of a product grouped by alternative group, defaults marked as the
/// slot component, sorted by sequence. Slots agree with [`customize`] without
/// selections: an optional-only group has no component.
pub fn product_bom(graph: &BomGraph, item_id: uuid::Uuid) -> BomResult<Vec<BomSlot>> {
    ensure_producible(graph, item_id)?;
    let entries = graph.entries_for(item_id);

    let mut slots: Vec<BomSlot> = entries
        .iter()
        .filter(|e| e.alternative_group.is_none())
        .map(|e| BomSlot {
            group: None,
            component: Some(e.clone()),
            alternatives: Vec::new(),
        })
        .collect();

    for (group, members) in groups(entries) {
        let default = group_default(&members);
        slots.push(BomSlot {
            group: Some(group.to_string()),
            component: default.cloned(),
            alternatives: members
                .iter()
                .filter(|e| default.map_or(true, |d| d.id != e.id))
                .map(|e| (*e).clone())
                .collect(),
        });
    }

    slots.sort_by_key(BomSlot::sequence);
    Ok(slots)
}

/// Reject selections naming an empty or repeated group, or a component that
/// is not a member of the named group on this output
pub fn validate_selections(entries: &[BomEntry], selections: &[Selection]) -> BomResult<()> {
    let mut seen = HashSet::new();
    for selection in selections {
        if selection.group.trim().is_empty() {
            return Err(BomError::validation(
                "component_selections",
                "Selection group must not be empty",
            ));
        }
        if !seen.insert(selection.group.as_str()) {
            return Err(BomError::validation(
                "component_selections",
                format!("Group {} selected more than once", selection.group),
            ));
        }
        let member = entries
            .iter()
            .any(|e| e.in_group(&selection.group) && e.input_item_id == selection.component_id);
        if !member {
            return Err(BomError::InvalidSelection {
                group: selection.group.clone(),
                component_id: selection.component_id,
            });
        }
    }
    Ok(())
}

/// Concrete component list for one product variant: every ungrouped entry,
/// plus per group the selected entry or the group default. Optional grouped
/// entries appear only when selected.
pub fn customize(
    graph: &BomGraph,
    item_id: uuid::Uuid,
    selections: &[Selection],
) -> BomResult<Vec<BomEntry>> {
    ensure_producible(graph, item_id)?;
    let entries = graph.entries_for(item_id);
    validate_selections(entries, selections)?;

    let mut result: Vec<BomEntry> = entries
        .iter()
        .filter(|e| e.alternative_group.is_none())
        .cloned()
        .collect();

    for (group, members) in groups(entries) {
        let chosen = match selections.iter().find(|s| s.group == group) {
            Some(selection) => members
                .iter()
                .find(|e| e.input_item_id == selection.component_id)
                .copied(),
            None => group_default(&members),
        };
        if let Some(entry) = chosen {
            result.push(entry.clone());
        }
    }

    result.sort_by_key(|e| e.sequence);
    Ok(result)
}
