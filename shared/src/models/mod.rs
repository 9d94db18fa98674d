//! Domain models for the production inventory platform

mod bom;
mod inventory;
mod item;
mod process;
mod production;

pub use bom::*;
pub use inventory::*;
pub use item::*;
pub use process::*;
pub use production::*;
