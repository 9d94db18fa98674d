//! BOM engine: graph loading, customization and recursive resolution
//!
//! Everything here works on an in-memory [`BomGraph`], so the same code runs
//! in the backend (after one database load) and in the browser via WASM.

pub mod customize;
mod graph;
mod resolver;

pub use customize::{customize, product_bom, validate_selections};
pub use graph::BomGraph;
pub use resolver::{BomResolver, MaterialRequirements, DEFAULT_MAX_DEPTH};
