//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::bom::BomGraph;
use shared::{BomEntry, Item, ItemType};
use uuid::Uuid;

/// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn item(sku: &str, item_type: ItemType, quantity: &str, unit: &str) -> Item {
    Item {
        id: Uuid::new_v4(),
        sku: sku.to_string(),
        name: sku.replace('-', " "),
        description: None,
        item_type,
        unit_of_measure: unit.to_string(),
        quantity: dec(quantity),
        minimum_stock_level: Decimal::ZERO,
        purchase_price: Decimal::ZERO,
        selling_price: Decimal::ZERO,
        dealer_price: Decimal::ZERO,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn entry(output: Uuid, input: Uuid, quantity: &str, unit: &str) -> BomEntry {
    BomEntry {
        id: Uuid::new_v4(),
        output_item_id: output,
        input_item_id: input,
        quantity_required: dec(quantity),
        unit_of_measure: unit.to_string(),
        sequence: 10,
        is_optional: false,
        is_default: true,
        alternative_group: None,
    }
}

pub fn grouped(output: Uuid, input: Uuid, quantity: &str, group: &str, is_default: bool) -> BomEntry {
    BomEntry {
        is_default,
        alternative_group: Some(group.to_string()),
        ..entry(output, input, quantity, "pcs")
    }
}

/// Builder over a [`BomGraph`] that hands back item ids
#[derive(Default)]
pub struct Catalog {
    pub graph: BomGraph,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sku: &str, item_type: ItemType, quantity: &str, unit: &str) -> Uuid {
        let item = item(sku, item_type, quantity, unit);
        let id = item.id;
        self.graph.insert_item(item);
        id
    }

    pub fn raw(&mut self, sku: &str, quantity: &str) -> Uuid {
        self.add(sku, ItemType::Raw, quantity, "pcs")
    }

    pub fn link(&mut self, output: Uuid, input: Uuid, quantity: &str) -> Uuid {
        let unit = self
            .graph
            .get_item(input)
            .map(|i| i.unit_of_measure.clone())
            .unwrap_or_else(|| "pcs".to_string());
        let entry = entry(output, input, quantity, &unit);
        let id = entry.id;
        self.graph.insert_entry(entry);
        id
    }

    pub fn insert(&mut self, entry: BomEntry) -> Uuid {
        let id = entry.id;
        self.graph.insert_entry(entry);
        id
    }
}

/// Thermostat assembly:
/// Thermostat <- 1 Enclosure <- 0.5 kg Plastic Granules
///            <- 1 Main Board <- 0.1 sheet Aluminum
pub struct Thermostat {
    pub catalog: Catalog,
    pub thermostat: Uuid,
    pub enclosure: Uuid,
    pub main_board: Uuid,
    pub plastic: Uuid,
    pub aluminum: Uuid,
}

pub fn thermostat(plastic_stock: &str, aluminum_stock: &str) -> Thermostat {
    let mut catalog = Catalog::new();
    let plastic = catalog.add("PLASTIC-GRANULES", ItemType::Raw, plastic_stock, "kg");
    let aluminum = catalog.add("ALUMINUM", ItemType::Raw, aluminum_stock, "sheet");
    let enclosure = catalog.add("ENCLOSURE", ItemType::Intermediate, "0", "pcs");
    let main_board = catalog.add("MAIN-BOARD", ItemType::Intermediate, "0", "pcs");
    let thermostat = catalog.add("THERMOSTAT", ItemType::Final, "0", "pcs");

    catalog.link(enclosure, plastic, "0.5");
    catalog.link(main_board, aluminum, "0.1");
    catalog.link(thermostat, enclosure, "1");
    catalog.link(thermostat, main_board, "1");

    Thermostat {
        catalog,
        thermostat,
        enclosure,
        main_board,
        plastic,
        aluminum,
    }
}
