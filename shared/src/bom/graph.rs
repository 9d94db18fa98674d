//! In-memory adjacency view of items and their BOM entries

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{BomError, BomResult};
use crate::models::{BomEntry, Item};

/// Items and BOM entries loaded once per operation; traversal never goes
/// back to storage
#[derive(Debug, Clone, Default)]
pub struct BomGraph {
    items: HashMap<Uuid, Item>,
    entries: HashMap<Uuid, Vec<BomEntry>>,
}

impl BomGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        items: impl IntoIterator<Item = Item>,
        entries: impl IntoIterator<Item = BomEntry>,
    ) -> Self {
        let mut graph = Self::new();
        for item in items {
            graph.insert_item(item);
        }
        for entry in entries {
            graph.insert_entry(entry);
        }
        graph
    }

    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    /// Entries of one output stay ordered by sequence; ties keep insertion order
    pub fn insert_entry(&mut self, entry: BomEntry) {
        let list = self.entries.entry(entry.output_item_id).or_default();
        let pos = list.partition_point(|e| e.sequence <= entry.sequence);
        list.insert(pos, entry);
    }

    pub fn item(&self, id: Uuid) -> BomResult<&Item> {
        self.items.get(&id).ok_or(BomError::ItemNotFound(id))
    }

    pub fn get_item(&self, id: Uuid) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn entries_for(&self, output_item_id: Uuid) -> &[BomEntry] {
        self.entries
            .get(&output_item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_bom(&self, output_item_id: Uuid) -> bool {
        !self.entries_for(output_item_id).is_empty()
    }

    /// Whether adding `output <- input` would close a loop, i.e. `output`
    /// is already reachable from `input`
    pub fn would_create_cycle(&self, output_item_id: Uuid, input_item_id: Uuid) -> bool {
        if output_item_id == input_item_id {
            return true;
        }
        let mut stack = vec![input_item_id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == output_item_id {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(self.entries_for(current).iter().map(|e| e.input_item_id));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entry(output: Uuid, input: Uuid, sequence: i32) -> BomEntry {
        BomEntry {
            id: Uuid::new_v4(),
            output_item_id: output,
            input_item_id: input,
            quantity_required: Decimal::ONE,
            unit_of_measure: "pcs".to_string(),
            sequence,
            is_optional: false,
            is_default: true,
            alternative_group: None,
        }
    }

    #[test]
    fn test_entries_kept_in_sequence_order() {
        let (out, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = BomGraph::new();
        graph.insert_entry(entry(out, a, 20));
        graph.insert_entry(entry(out, b, 10));
        graph.insert_entry(entry(out, c, 20));

        let inputs: Vec<Uuid> = graph.entries_for(out).iter().map(|e| e.input_item_id).collect();
        assert_eq!(inputs, vec![b, a, c]);
    }

    #[test]
    fn test_missing_item_is_an_error() {
        let id = Uuid::new_v4();
        assert_eq!(BomGraph::new().item(id).unwrap_err(), BomError::ItemNotFound(id));
    }

    #[test]
    fn test_cycle_through_two_hops() {
        let (top, mid, low) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = BomGraph::new();
        graph.insert_entry(entry(top, mid, 10));
        graph.insert_entry(entry(mid, low, 10));

        assert!(graph.would_create_cycle(low, top));
        assert!(!graph.would_create_cycle(top, low));
        assert!(!graph.has_bom(low));
    }
}
