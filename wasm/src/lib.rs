//! WebAssembly module for the production inventory platform
//!
//! Provides client-side computation for:
//! - Material requirement previews
//! - Product variant (alternative group) previews
//! - Stock availability checks before submitting a run
//! - BOM entry validation

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::bom::{self, BomGraph, BomResolver};
use shared::production::{find_shortages, InventorySnapshot};
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Items and BOM entries as returned by the API
#[derive(Debug, Deserialize)]
struct GraphPayload {
    items: Vec<Item>,
    #[serde(default)]
    entries: Vec<BomEntry>,
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str(concat!(
        "production inventory wasm ",
        env!("CARGO_PKG_VERSION")
    )));
}

fn parse_graph(graph_json: &str) -> Result<BomGraph, String> {
    let payload: GraphPayload =
        serde_json::from_str(graph_json).map_err(|e| format!("Invalid graph JSON: {}", e))?;
    Ok(BomGraph::from_parts(payload.items, payload.entries))
}

fn parse_id(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|e| format!("Invalid item id {}: {}", value, e))
}

fn parse_quantity(value: &str) -> Result<Decimal, String> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("Invalid quantity {}: {}", value, e))
}

fn parse_selections(selections_json: &str) -> Result<Vec<Selection>, String> {
    if selections_json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(selections_json).map_err(|e| format!("Invalid selections JSON: {}", e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn requirements_json(
    graph_json: &str,
    item_id: &str,
    quantity: &str,
    selections_json: &str,
) -> Result<String, String> {
    let graph = parse_graph(graph_json)?;
    let requirements = BomResolver::new(&graph)
        .requirements(
            parse_id(item_id)?,
            parse_quantity(quantity)?,
            &parse_selections(selections_json)?,
        )
        .map_err(|e| e.to_string())?;
    to_json(&requirements.into_values().collect::<Vec<_>>())
}

fn customization_json(graph_json: &str, item_id: &str, selections_json: &str) -> Result<String, String> {
    let graph = parse_graph(graph_json)?;
    let entries = bom::customize(&graph, parse_id(item_id)?, &parse_selections(selections_json)?)
        .map_err(|e| e.to_string())?;
    to_json(&entries)
}

fn shortages_json(
    graph_json: &str,
    item_id: &str,
    quantity: &str,
    selections_json: &str,
) -> Result<String, String> {
    let graph = parse_graph(graph_json)?;
    let requirements = BomResolver::new(&graph)
        .requirements(
            parse_id(item_id)?,
            parse_quantity(quantity)?,
            &parse_selections(selections_json)?,
        )
        .map_err(|e| e.to_string())?;
    let snapshot = InventorySnapshot::from_items(graph.items());
    to_json(&find_shortages(&requirements, &snapshot))
}

fn bom_entry_check(output_json: &str, input_json: &str, quantity: &str) -> Result<(), String> {
    let output: Item =
        serde_json::from_str(output_json).map_err(|e| format!("Invalid output item JSON: {}", e))?;
    let input: Item =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid input item JSON: {}", e))?;
    validate_bom_entry(&output, &input, parse_quantity(quantity)?).map_err(str::to_string)
}

fn cycle_check(graph_json: &str, output_id: &str, input_id: &str) -> Result<bool, String> {
    let graph = parse_graph(graph_json)?;
    Ok(graph.would_create_cycle(parse_id(output_id)?, parse_id(input_id)?))
}

/// Leaf material totals for a production run, as a JSON array
#[wasm_bindgen]
pub fn preview_requirements(
    graph_json: &str,
    item_id: &str,
    quantity: &str,
    selections_json: &str,
) -> Result<String, JsValue> {
    requirements_json(graph_json, item_id, quantity, selections_json).map_err(|e| JsValue::from_str(&e))
}

/// Component list of a product variant, as a JSON array
#[wasm_bindgen]
pub fn preview_customization(graph_json: &str, item_id: &str, selections_json: &str) -> Result<String, JsValue> {
    customization_json(graph_json, item_id, selections_json).map_err(|e| JsValue::from_str(&e))
}

/// Materials the given stock cannot cover, as a JSON array (empty when the
/// run can go ahead)
#[wasm_bindgen]
pub fn check_availability(
    graph_json: &str,
    item_id: &str,
    quantity: &str,
    selections_json: &str,
) -> Result<String, JsValue> {
    shortages_json(graph_json, item_id, quantity, selections_json).map_err(|e| JsValue::from_str(&e))
}

/// Validate a BOM entry before submitting it
#[wasm_bindgen]
pub fn check_bom_entry(output_json: &str, input_json: &str, quantity: &str) -> Result<(), JsValue> {
    bom_entry_check(output_json, input_json, quantity).map_err(|e| JsValue::from_str(&e))
}

/// Whether adding `input` to the BOM of `output` would close a loop
#[wasm_bindgen]
pub fn would_create_cycle(graph_json: &str, output_id: &str, input_id: &str) -> Result<bool, JsValue> {
    cycle_check(graph_json, output_id, input_id).map_err(|e| JsValue::from_str(&e))
}

/// Validate SKU format
#[wasm_bindgen]
pub fn is_valid_sku(sku: &str) -> bool {
    validate_sku(sku).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn item(id: Uuid, sku: &str, item_type: ItemType, quantity: i64) -> Item {
        Item {
            id,
            sku: sku.to_string(),
            name: sku.to_lowercase(),
            description: None,
            item_type,
            unit_of_measure: "pcs".to_string(),
            quantity: Decimal::from(quantity),
            minimum_stock_level: Decimal::ZERO,
            purchase_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            dealer_price: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(output: Uuid, input: Uuid, qty: i64, group: Option<&str>) -> BomEntry {
        BomEntry {
            id: Uuid::new_v4(),
            output_item_id: output,
            input_item_id: input,
            quantity_required: Decimal::from(qty),
            unit_of_measure: "pcs".to_string(),
            sequence: 10,
            is_optional: false,
            is_default: true,
            alternative_group: group.map(str::to_string),
        }
    }

    struct Lamp {
        lamp: Uuid,
        steel: Uuid,
        brass: Uuid,
        bulb: Uuid,
        graph_json: String,
    }

    fn lamp() -> Lamp {
        let (lamp, steel, brass, bulb) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut brass_entry = entry(lamp, brass, 1, Some("base"));
        brass_entry.is_default = false;
        let graph_json = json!({
            "items": [
                item(lamp, "LAMP", ItemType::Final, 0),
                item(steel, "STEEL", ItemType::Raw, 10),
                item(brass, "BRASS", ItemType::Raw, 0),
                item(bulb, "BULB", ItemType::Raw, 3),
            ],
            "entries": [
                entry(lamp, steel, 1, Some("base")),
                brass_entry,
                entry(lamp, bulb, 1, None),
            ],
        })
        .to_string();
        Lamp { lamp, steel, brass, bulb, graph_json }
    }

    #[test]
    fn test_requirements_use_group_default() {
        let l = lamp();
        let out = requirements_json(&l.graph_json, &l.lamp.to_string(), "4", "").unwrap();
        let reqs: Vec<MaterialRequirement> = serde_json::from_str(&out).unwrap();
        assert_eq!(reqs.len(), 2);
        let steel = reqs.iter().find(|r| r.item_id == l.steel).unwrap();
        assert_eq!(steel.quantity, Decimal::from(4));
        assert!(reqs.iter().any(|r| r.item_id == l.bulb));
    }

    #[test]
    fn test_customization_honours_selection() {
        let l = lamp();
        let selections = json!([{ "group": "base", "component_id": l.brass }]).to_string();
        let out = customization_json(&l.graph_json, &l.lamp.to_string(), &selections).unwrap();
        let entries: Vec<BomEntry> = serde_json::from_str(&out).unwrap();
        assert!(entries.iter().any(|e| e.input_item_id == l.brass));
        assert!(!entries.iter().any(|e| e.input_item_id == l.steel));
    }

    #[test]
    fn test_availability_lists_every_shortage() {
        let l = lamp();
        let selections = json!([{ "group": "base", "component_id": l.brass }]).to_string();
        let out = shortages_json(&l.graph_json, &l.lamp.to_string(), "5", &selections).unwrap();
        let shortages: Vec<Shortage> = serde_json::from_str(&out).unwrap();
        assert_eq!(shortages.len(), 2);
        let bulb = shortages.iter().find(|s| s.item_id == l.bulb).unwrap();
        assert_eq!(bulb.shortage, Decimal::from(2));
    }

    #[test]
    fn test_invalid_inputs_are_reported() {
        let l = lamp();
        assert!(requirements_json("not json", &l.lamp.to_string(), "1", "").is_err());
        assert!(requirements_json(&l.graph_json, "nope", "1", "").is_err());
        assert!(requirements_json(&l.graph_json, &l.lamp.to_string(), "0", "").is_err());
    }

    #[test]
    fn test_bom_entry_check() {
        let output = serde_json::to_string(&item(Uuid::new_v4(), "LAMP", ItemType::Final, 0)).unwrap();
        let raw = serde_json::to_string(&item(Uuid::new_v4(), "STEEL", ItemType::Raw, 0)).unwrap();
        assert!(bom_entry_check(&output, &raw, "2").is_ok());
        assert!(bom_entry_check(&output, &raw, "0").is_err());
        assert!(bom_entry_check(&raw, &output, "1").is_err());
        assert!(bom_entry_check(&output, &output, "1").is_err());
    }

    #[test]
    fn test_cycle_check() {
        let l = lamp();
        assert!(cycle_check(&l.graph_json, &l.steel.to_string(), &l.lamp.to_string()).unwrap());
        assert!(!cycle_check(&l.graph_json, &l.lamp.to_string(), &l.brass.to_string()).unwrap());
    }

    #[test]
    fn test_sku_format() {
        assert!(is_valid_sku("LAMP-01"));
        assert!(!is_valid_sku("lamp"));
    }
}
