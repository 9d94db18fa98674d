//! Business logic services for the production inventory platform

pub mod bom;
pub mod inventory;
pub mod item;
pub mod process;
pub mod production;
mod rules;
mod stock;

pub use bom::BomService;
pub use inventory::InventoryService;
pub use item::ItemService;
pub use process::ProcessService;
pub use production::ProductionService;
