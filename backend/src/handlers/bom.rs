//! HTTP handlers for bill of materials endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{BomEntry, BomSlot, BomTree, MaterialRequirement, SuggestedInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::services::bom::{
    BomComponentInput, BomService, CompleteBomInput, CustomizationInput, RequirementsInput,
    UpdateBomEntryInput,
};
use crate::AppState;

fn bom_service(state: AppState) -> BomService {
    BomService::new(state.db).with_max_depth(state.config.production.max_bom_depth)
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub quantity: Decimal,
}

/// Direct BOM of a product, grouped by alternative group
pub async fn get_product_bom(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<ApiResponse<Vec<BomSlot>>> {
    let slots = bom_service(state).get_product_bom(item_id).await?;
    Ok(ApiResponse::success(slots))
}

/// Fully expanded BOM tree
pub async fn get_recursive_bom(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<ApiResponse<BomTree>> {
    let tree = bom_service(state).get_recursive_bom(item_id).await?;
    Ok(ApiResponse::success(tree))
}

/// Component list for a product variant
pub async fn customize_product(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<CustomizationInput>,
) -> AppResult<ApiResponse<Vec<BomEntry>>> {
    let entries = bom_service(state)
        .customize_product(item_id, &input.component_selections)
        .await?;
    Ok(ApiResponse::success(entries))
}

/// Leaf materials needed for a production run
pub async fn calculate_material_requirements(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<RequirementsInput>,
) -> AppResult<ApiResponse<Vec<MaterialRequirement>>> {
    let requirements = bom_service(state)
        .calculate_material_requirements(item_id, input.quantity, &input.component_selections)
        .await?;
    Ok(ApiResponse::success(requirements))
}

/// Direct inputs suggested for a production run
pub async fn suggest_inputs(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<SuggestQuery>,
) -> AppResult<ApiResponse<Vec<SuggestedInput>>> {
    let inputs = bom_service(state).suggest_inputs(item_id, query.quantity).await?;
    Ok(ApiResponse::success(inputs))
}

/// List the BOM entries of an output item
pub async fn list_bom_entries(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<ApiResponse<Vec<BomEntry>>> {
    let entries = bom_service(state).list_bom_entries(item_id).await?;
    Ok(ApiResponse::success(entries))
}

/// Add a component to an output item's BOM
pub async fn create_bom_entry(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<BomComponentInput>,
) -> AppResult<ApiResponse<BomEntry>> {
    let entry = bom_service(state).create_bom_entry(item_id, input).await?;
    Ok(ApiResponse::created(entry))
}

/// Replace an output item's whole BOM
pub async fn create_complete_bom(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<CompleteBomInput>,
) -> AppResult<ApiResponse<Vec<BomEntry>>> {
    let entries = bom_service(state).create_complete_bom(item_id, input).await?;
    Ok(ApiResponse::created(entries))
}

/// Update a BOM entry
pub async fn update_bom_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(input): Json<UpdateBomEntryInput>,
) -> AppResult<ApiResponse<BomEntry>> {
    let entry = bom_service(state).update_bom_entry(entry_id, input).await?;
    Ok(ApiResponse::success(entry))
}

/// Delete a BOM entry
pub async fn delete_bom_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    bom_service(state).delete_bom_entry(entry_id).await?;
    Ok(ApiResponse::success(()))
}
