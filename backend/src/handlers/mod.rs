//! HTTP request handlers

pub mod bom;
pub mod health;
pub mod inventory;
pub mod items;
pub mod process;
pub mod production;

pub use bom::*;
pub use health::*;
pub use inventory::*;
pub use items::*;
pub use process::*;
pub use production::*;
