//! HTTP handlers for item catalog endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::Item;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::response::ApiResponse;
use crate::services::item::{CreateItemInput, ItemFilter, ItemService, UpdateItemInput};
use crate::AppState;

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateItemInput>,
) -> AppResult<ApiResponse<Item>> {
    let service = ItemService::new(state.db);
    let item = service.create_item(actor.0, input).await?;
    Ok(ApiResponse::created(item))
}

/// List items
pub async fn list_items(
    State(state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> AppResult<ApiResponse<Vec<Item>>> {
    let service = ItemService::new(state.db);
    let items = service.list_items(filter).await?;
    Ok(ApiResponse::success(items))
}

/// Get an item by ID
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<ApiResponse<Item>> {
    let service = ItemService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(ApiResponse::success(item))
}

/// Update an item
pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<ApiResponse<Item>> {
    let service = ItemService::new(state.db);
    let item = service.update_item(item_id, input).await?;
    Ok(ApiResponse::success(item))
}

/// Items at or below their minimum stock level
pub async fn low_stock_items(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Item>>> {
    let service = ItemService::new(state.db);
    let items = service.low_stock_items().await?;
    Ok(ApiResponse::success(items))
}
