//! HTTP handlers for production endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{ProductionHistory, ProductionRecord, ProductionResult};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::response::ApiResponse;
use crate::services::production::{
    ProduceInput, ProductionFilter, ProductionService, UpdateProductionInput,
};
use crate::AppState;

fn production_service(state: AppState) -> ProductionService {
    ProductionService::new(state.db).with_max_depth(state.config.production.max_bom_depth)
}

/// Run a production
pub async fn produce_product(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<ProduceInput>,
) -> AppResult<ApiResponse<ProductionResult>> {
    let result = production_service(state).produce_product(actor.0, input).await?;
    Ok(ApiResponse::created(result))
}

/// Edit a recorded production
pub async fn update_production(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(production_id): Path<Uuid>,
    Json(input): Json<UpdateProductionInput>,
) -> AppResult<ApiResponse<ProductionRecord>> {
    let record = production_service(state)
        .update_production(actor.0, production_id, input)
        .await?;
    Ok(ApiResponse::success(record))
}

/// Get a production record
pub async fn get_production(
    State(state): State<AppState>,
    Path(production_id): Path<Uuid>,
) -> AppResult<ApiResponse<ProductionRecord>> {
    let record = production_service(state).get_production(production_id).await?;
    Ok(ApiResponse::success(record))
}

/// List production records
pub async fn list_productions(
    State(state): State<AppState>,
    Query(filter): Query<ProductionFilter>,
) -> AppResult<ApiResponse<Vec<ProductionRecord>>> {
    let records = production_service(state).list_productions(filter).await?;
    Ok(ApiResponse::success(records))
}

/// Audit trail of a production record
pub async fn get_production_history(
    State(state): State<AppState>,
    Path(production_id): Path<Uuid>,
) -> AppResult<ApiResponse<Vec<ProductionHistory>>> {
    let history = production_service(state)
        .get_production_history(production_id)
        .await?;
    Ok(ApiResponse::success(history))
}
