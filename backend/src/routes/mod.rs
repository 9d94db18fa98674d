//! Route definitions for the production inventory API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/items", item_routes())
        .nest("/bom-entries", bom_entry_routes())
        .nest("/inventory", inventory_routes())
        .nest("/productions", production_routes())
        .nest("/processes", process_routes())
}

/// Item catalog and per-item BOM routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/low-stock", get(handlers::low_stock_items))
        .route("/:item_id", get(handlers::get_item).put(handlers::update_item))
        .route(
            "/:item_id/bom",
            get(handlers::get_product_bom).put(handlers::create_complete_bom),
        )
        .route("/:item_id/bom/tree", get(handlers::get_recursive_bom))
        .route(
            "/:item_id/bom/entries",
            get(handlers::list_bom_entries).post(handlers::create_bom_entry),
        )
        .route("/:item_id/customize", post(handlers::customize_product))
        .route(
            "/:item_id/requirements",
            post(handlers::calculate_material_requirements),
        )
        .route("/:item_id/suggested-inputs", get(handlers::suggest_inputs))
}

/// BOM entry routes
fn bom_entry_routes() -> Router<AppState> {
    Router::new().route(
        "/:entry_id",
        put(handlers::update_bom_entry).delete(handlers::delete_bom_entry),
    )
}

/// Inventory ledger routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::record_transaction),
        )
        .route(
            "/transactions/reference/:model/:reference_id",
            get(handlers::get_transactions_by_reference),
        )
        .route("/reconcile/:item_id", get(handlers::reconcile_item))
}

/// Production routes
fn production_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_productions).post(handlers::produce_product),
        )
        .route(
            "/:production_id",
            get(handlers::get_production).put(handlers::update_production),
        )
        .route(
            "/:production_id/history",
            get(handlers::get_production_history),
        )
}

/// Production process routes
fn process_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_processes).post(handlers::create_process),
        )
        .route("/active", get(handlers::active_processes))
        .route("/:process_id", get(handlers::get_process_details))
        .route("/:process_id/start", post(handlers::start_process))
        .route("/:process_id/complete", post(handlers::complete_process))
        .route("/:process_id/cancel", post(handlers::cancel_process))
        .route("/:process_id/inputs", post(handlers::add_process_input))
        .route("/:process_id/outputs", post(handlers::add_process_output))
        .route(
            "/:process_id/suggested-inputs",
            get(handlers::suggest_process_inputs),
        )
}
