//! HTTP handlers for production process endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{ProcessDetails, ProcessInput, ProcessOutput, ProductionProcess, SuggestedInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::response::ApiResponse;
use crate::services::process::{
    CreateProcessInput, ProcessFilter, ProcessInputRequest, ProcessOutputRequest, ProcessService,
    TransitionInput,
};
use crate::AppState;

fn process_service(state: AppState) -> ProcessService {
    ProcessService::new(state.db).with_max_depth(state.config.production.max_bom_depth)
}

/// Plan a production process
pub async fn create_process(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateProcessInput>,
) -> AppResult<ApiResponse<ProductionProcess>> {
    let process = process_service(state).create_process(actor.0, input).await?;
    Ok(ApiResponse::created(process))
}

/// List processes, optionally by status
pub async fn list_processes(
    State(state): State<AppState>,
    Query(filter): Query<ProcessFilter>,
) -> AppResult<ApiResponse<Vec<ProductionProcess>>> {
    let processes = process_service(state).list_processes(filter).await?;
    Ok(ApiResponse::success(processes))
}

pub async fn active_processes(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ProductionProcess>>> {
    let processes = process_service(state).active_processes().await?;
    Ok(ApiResponse::success(processes))
}

/// Process with inputs, outputs and efficiency
pub async fn get_process_details(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
) -> AppResult<ApiResponse<ProcessDetails>> {
    let details = process_service(state).get_process_details(process_id).await?;
    Ok(ApiResponse::success(details))
}

pub async fn start_process(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
    input: Option<Json<TransitionInput>>,
) -> AppResult<ApiResponse<ProductionProcess>> {
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let process = process_service(state).start_process(process_id, input).await?;
    Ok(ApiResponse::success(process))
}

pub async fn complete_process(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
    input: Option<Json<TransitionInput>>,
) -> AppResult<ApiResponse<ProductionProcess>> {
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let process = process_service(state).complete_process(process_id, input).await?;
    Ok(ApiResponse::success(process))
}

pub async fn cancel_process(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
) -> AppResult<ApiResponse<ProductionProcess>> {
    let process = process_service(state).cancel_process(process_id).await?;
    Ok(ApiResponse::success(process))
}

/// Record material used by a process
pub async fn add_process_input(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
    Json(input): Json<ProcessInputRequest>,
) -> AppResult<ApiResponse<ProcessInput>> {
    let line = process_service(state).add_process_input(process_id, input).await?;
    Ok(ApiResponse::created(line))
}

/// Record product made by a process
pub async fn add_process_output(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
    Json(input): Json<ProcessOutputRequest>,
) -> AppResult<ApiResponse<ProcessOutput>> {
    let line = process_service(state).add_process_output(process_id, input).await?;
    Ok(ApiResponse::created(line))
}

/// BOM-based input suggestions for the process target
pub async fn suggest_process_inputs(
    State(state): State<AppState>,
    Path(process_id): Path<Uuid>,
) -> AppResult<ApiResponse<Vec<SuggestedInput>>> {
    let suggestions = process_service(state).suggest_inputs(process_id).await?;
    Ok(ApiResponse::success(suggestions))
}
