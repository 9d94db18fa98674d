//! HTTP handlers for inventory ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{InventoryTransaction, LedgerReconciliation};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::response::ApiResponse;
use crate::services::inventory::{InventoryService, RecordTransactionInput, TransactionFilter};
use crate::AppState;

/// Record a purchase, sale, adjustment or transfer
pub async fn record_transaction(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<RecordTransactionInput>,
) -> AppResult<ApiResponse<InventoryTransaction>> {
    let service = InventoryService::new(state.db);
    let transaction = service.record_transaction(actor.0, input).await?;
    Ok(ApiResponse::created(transaction))
}

/// List ledger entries
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<ApiResponse<Vec<InventoryTransaction>>> {
    let service = InventoryService::new(state.db);
    let transactions = service.list_transactions(filter).await?;
    Ok(ApiResponse::success(transactions))
}

/// Ledger entries written for one business document
pub async fn get_transactions_by_reference(
    State(state): State<AppState>,
    Path((reference_model, reference_id)): Path<(String, Uuid)>,
) -> AppResult<ApiResponse<Vec<InventoryTransaction>>> {
    let service = InventoryService::new(state.db);
    let transactions = service
        .get_transactions_by_reference(&reference_model, reference_id)
        .await?;
    Ok(ApiResponse::success(transactions))
}

/// Compare an item's stock with its ledger
pub async fn reconcile_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<ApiResponse<LedgerReconciliation>> {
    let service = InventoryService::new(state.db);
    let reconciliation = service.reconcile_item(item_id).await?;
    Ok(ApiResponse::success(reconciliation))
}
