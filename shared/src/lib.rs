//! Shared types, BOM engine and production planning
//!
//! This crate contains everything that does not need a database: the domain
//! models, BOM resolution and customization, production planning and the
//! production process lifecycle. It is used by the backend and, through
//! WASM, by the frontend.

pub mod bom;
pub mod error;
pub mod models;
pub mod process;
pub mod production;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
