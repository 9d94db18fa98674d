//! Inventory ledger service for manual stock movements and reconciliation

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::production::StockMovement;
use shared::{InventoryTransaction, LedgerReconciliation, Pagination, Shortage, TransactionType};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::stock::{self, LedgerReference, TransactionRow, TRANSACTION_COLUMNS};
use crate::error::{AppError, AppResult};

/// Inventory service for recording and querying ledger entries
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Input for recording a non-production stock movement
#[derive(Debug, Deserialize, Validate)]
pub struct RecordTransactionInput {
    pub item_id: Uuid,
    pub transaction_type: TransactionType,
    /// Signed for adjustments and transfers; purchases add and sales deduct
    /// the absolute value
    pub quantity: Decimal,
    #[validate(length(max = 100))]
    pub reference_model: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Query filter for listing ledger entries
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub item_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl TransactionFilter {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            per_page: self.per_page.unwrap_or(default.per_page),
        }
    }
}

/// Signed stock delta of a manual movement
pub fn signed_delta(transaction_type: TransactionType, quantity: Decimal) -> AppResult<Decimal> {
    if transaction_type.is_production() {
        return Err(AppError::Validation {
            field: "transaction_type".to_string(),
            message: "Production movements are recorded by production runs".to_string(),
        });
    }
    if quantity.is_zero() {
        return Err(AppError::Validation {
            field: "quantity".to_string(),
            message: "Quantity must not be zero".to_string(),
        });
    }

    Ok(match transaction_type {
        TransactionType::Purchase => quantity.abs(),
        TransactionType::Sale => -quantity.abs(),
        _ => quantity,
    })
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a purchase, sale, adjustment or transfer
    pub async fn record_transaction(
        &self,
        actor: Uuid,
        input: RecordTransactionInput,
    ) -> AppResult<InventoryTransaction> {
        input.validate()?;
        let delta = signed_delta(input.transaction_type, input.quantity)?;

        let mut tx = self.db.begin().await?;

        let snapshot = stock::lock_stock(&mut tx, &BTreeSet::from([input.item_id])).await?;
        let available = snapshot.quantity(input.item_id);
        if available + delta < Decimal::ZERO {
            return Err(AppError::InsufficientStock {
                shortages: vec![Shortage::new(
                    input.item_id,
                    snapshot.name(input.item_id),
                    -delta,
                    available,
                )],
            });
        }

        let movement = StockMovement {
            item_id: input.item_id,
            delta,
            transaction_type: input.transaction_type,
            note: input
                .notes
                .clone()
                .unwrap_or_else(|| format!("Manual {}", input.transaction_type)),
        };
        let reference = match (input.reference_model.as_deref(), input.reference_id) {
            (Some(model), Some(id)) => Some(LedgerReference { model, id }),
            _ => None,
        };
        let transaction = stock::apply_movement(&mut tx, &movement, reference, actor).await?;

        tx.commit().await?;

        tracing::info!(
            "Recorded {} of {} on item {}",
            transaction.transaction_type,
            transaction.quantity,
            transaction.item_id
        );
        Ok(transaction)
    }

    /// List ledger entries, newest first
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let pagination = filter.pagination();

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM inventory_transactions
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::text IS NULL OR transaction_type = $2)
              AND ($3::timestamptz IS NULL OR transaction_date >= $3)
              AND ($4::timestamptz IS NULL OR transaction_date < $4)
            ORDER BY transaction_date DESC, id
            LIMIT $5 OFFSET $6
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(filter.item_id)
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        stock::rows_to_transactions(rows)
    }

    /// Ledger entries pointing at one business document, in write order
    pub async fn get_transactions_by_reference(
        &self,
        reference_model: &str,
        reference_id: Uuid,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM inventory_transactions
            WHERE reference_model = $1 AND reference_id = $2
            ORDER BY transaction_date, id
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(reference_model)
        .bind(reference_id)
        .fetch_all(&self.db)
        .await?;

        stock::rows_to_transactions(rows)
    }

    /// Compare an item's stored quantity with the sum of its ledger
    pub async fn reconcile_item(&self, item_id: Uuid) -> AppResult<LedgerReconciliation> {
        let (recorded, ledger_total) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT i.quantity,
                   COALESCE((SELECT SUM(t.quantity) FROM inventory_transactions t WHERE t.item_id = i.id), 0)
            FROM items i
            WHERE i.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;

        let reconciliation = LedgerReconciliation::new(item_id, recorded, ledger_total);
        if !reconciliation.is_consistent() {
            tracing::warn!(
                "Ledger drift on item {}: recorded {}, ledger {}",
                item_id,
                recorded,
                ledger_total
            );
        }
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_and_sale_signs() {
        let qty = Decimal::from(5);
        assert_eq!(signed_delta(TransactionType::Purchase, -qty).unwrap(), qty);
        assert_eq!(signed_delta(TransactionType::Sale, qty).unwrap(), -qty);
        assert_eq!(signed_delta(TransactionType::Adjustment, -qty).unwrap(), -qty);
    }

    #[test]
    fn test_production_types_rejected() {
        for t in [
            TransactionType::ProductionIn,
            TransactionType::ProductionOut,
            TransactionType::ProductionReversal,
        ] {
            assert!(signed_delta(t, Decimal::ONE).is_err());
        }
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(signed_delta(TransactionType::Adjustment, Decimal::ZERO).is_err());
    }
}
