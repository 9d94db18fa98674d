//! Row mapping and stock-moving queries shared by the inventory services
//!
//! Every function takes a `&mut PgConnection` so callers decide the
//! transaction scope.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::bom::BomGraph;
use shared::production::{InventorySnapshot, StockLevel, StockMovement};
use shared::{BomEntry, InventoryTransaction, Item};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub(crate) const ITEM_COLUMNS: &str = "id, sku, name, description, item_type, unit_of_measure, \
     quantity, minimum_stock_level, purchase_price, selling_price, dealer_price, created_at, updated_at";

pub(crate) const BOM_COLUMNS: &str = "id, output_item_id, input_item_id, quantity_required, \
     unit_of_measure, sequence, is_optional, is_default, alternative_group";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, item_id, transaction_type, quantity, \
     reference_model, reference_id, notes, performed_by, transaction_date";

/// Row for item queries
#[derive(Debug, FromRow)]
pub(crate) struct ItemRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    item_type: String,
    unit_of_measure: String,
    quantity: Decimal,
    minimum_stock_level: Decimal,
    purchase_price: Decimal,
    selling_price: Decimal,
    dealer_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            item_type: row.item_type.parse().map_err(AppError::Internal)?,
            unit_of_measure: row.unit_of_measure,
            quantity: row.quantity,
            minimum_stock_level: row.minimum_stock_level,
            purchase_price: row.purchase_price,
            selling_price: row.selling_price,
            dealer_price: row.dealer_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row for BOM entry queries
#[derive(Debug, FromRow)]
pub(crate) struct BomEntryRow {
    id: Uuid,
    output_item_id: Uuid,
    input_item_id: Uuid,
    quantity_required: Decimal,
    unit_of_measure: String,
    sequence: i32,
    is_optional: bool,
    is_default: bool,
    alternative_group: Option<String>,
}

impl From<BomEntryRow> for BomEntry {
    fn from(row: BomEntryRow) -> Self {
        BomEntry {
            id: row.id,
            output_item_id: row.output_item_id,
            input_item_id: row.input_item_id,
            quantity_required: row.quantity_required,
            unit_of_measure: row.unit_of_measure,
            sequence: row.sequence,
            is_optional: row.is_optional,
            is_default: row.is_default,
            alternative_group: row.alternative_group,
        }
    }
}

/// Row for ledger queries
#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    id: Uuid,
    item_id: Uuid,
    transaction_type: String,
    quantity: Decimal,
    reference_model: Option<String>,
    reference_id: Option<Uuid>,
    notes: Option<String>,
    performed_by: Option<Uuid>,
    transaction_date: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for InventoryTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(InventoryTransaction {
            id: row.id,
            item_id: row.item_id,
            transaction_type: row.transaction_type.parse().map_err(AppError::Internal)?,
            quantity: row.quantity,
            reference_model: row.reference_model,
            reference_id: row.reference_id,
            notes: row.notes,
            performed_by: row.performed_by,
            transaction_date: row.transaction_date,
        })
    }
}

pub(crate) fn rows_to_items(rows: Vec<ItemRow>) -> AppResult<Vec<Item>> {
    rows.into_iter().map(Item::try_from).collect()
}

pub(crate) fn rows_to_transactions(rows: Vec<TransactionRow>) -> AppResult<Vec<InventoryTransaction>> {
    rows.into_iter().map(InventoryTransaction::try_from).collect()
}

/// Fetch one item
pub(crate) async fn fetch_item(conn: &mut PgConnection, item_id: Uuid) -> AppResult<Item> {
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {} FROM items WHERE id = $1",
        ITEM_COLUMNS
    ))
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;

    row.try_into()
}

/// Load every item and BOM entry reachable from `root` in two queries
pub(crate) async fn load_graph(conn: &mut PgConnection, root: Uuid) -> AppResult<BomGraph> {
    const REACHABLE: &str = r#"
        WITH RECURSIVE reachable(item_id) AS (
            SELECT $1::uuid
            UNION
            SELECT b.input_item_id
            FROM bom_entries b
            JOIN reachable r ON b.output_item_id = r.item_id
        )
    "#;

    let item_rows = sqlx::query_as::<_, ItemRow>(&format!(
        "{} SELECT {} FROM items WHERE id IN (SELECT item_id FROM reachable)",
        REACHABLE, ITEM_COLUMNS
    ))
    .bind(root)
    .fetch_all(&mut *conn)
    .await?;

    let entry_rows = sqlx::query_as::<_, BomEntryRow>(&format!(
        "{} SELECT {} FROM bom_entries \
         WHERE output_item_id IN (SELECT item_id FROM reachable) \
         ORDER BY output_item_id, sequence, created_at",
        REACHABLE, BOM_COLUMNS
    ))
    .bind(root)
    .fetch_all(&mut *conn)
    .await?;

    tracing::debug!(
        "Loaded BOM graph for {}: {} items, {} entries",
        root,
        item_rows.len(),
        entry_rows.len()
    );

    Ok(BomGraph::from_parts(
        rows_to_items(item_rows)?,
        entry_rows.into_iter().map(BomEntry::from),
    ))
}

/// Lock the given item rows for the rest of the transaction, in id order so
/// concurrent runs cannot deadlock, and return their stock
pub(crate) async fn lock_stock(
    conn: &mut PgConnection,
    item_ids: &BTreeSet<Uuid>,
) -> AppResult<InventorySnapshot> {
    let ids: Vec<Uuid> = item_ids.iter().copied().collect();
    let rows = sqlx::query_as::<_, (Uuid, String, Decimal)>(
        "SELECT id, name, quantity FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    if rows.len() != ids.len() {
        let found: BTreeSet<Uuid> = rows.iter().map(|(id, _, _)| *id).collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
            return Err(AppError::NotFound(format!("Item {}", missing)));
        }
    }

    Ok(InventorySnapshot::from_levels(rows.into_iter().map(
        |(item_id, item_name, quantity)| StockLevel {
            item_id,
            item_name,
            quantity,
        },
    )))
}

/// Reference a ledger entry points back to
#[derive(Debug, Clone, Copy)]
pub(crate) struct LedgerReference<'a> {
    pub model: &'a str,
    pub id: Uuid,
}

/// Apply one movement: guarded quantity update plus its ledger entry.
///
/// The update only succeeds while the result stays non-negative, so a stock
/// change that slipped past the lock aborts the transaction instead of
/// overdrawing.
pub(crate) async fn apply_movement(
    conn: &mut PgConnection,
    movement: &StockMovement,
    reference: Option<LedgerReference<'_>>,
    actor: Uuid,
) -> AppResult<InventoryTransaction> {
    let updated = sqlx::query(
        r#"
        UPDATE items
        SET quantity = quantity + $1, updated_at = NOW()
        WHERE id = $2 AND quantity + $1 >= 0
        "#,
    )
    .bind(movement.delta)
    .bind(movement.item_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::StockConflict(movement.item_id));
    }

    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        INSERT INTO inventory_transactions (
            item_id, transaction_type, quantity, reference_model, reference_id, notes, performed_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(movement.item_id)
    .bind(movement.transaction_type.as_str())
    .bind(movement.delta)
    .bind(reference.map(|r| r.model))
    .bind(reference.map(|r| r.id))
    .bind(&movement.note)
    .bind(actor)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TransactionType;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;

    async fn database() -> Option<PgPool> {
        let _ = dotenvy::dotenv();
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Some(pool)
    }

    async fn insert_item(conn: &mut PgConnection, item_type: &str, quantity: Decimal) -> Uuid {
        let sku = format!("STOCK-{}", Uuid::new_v4().simple()).to_uppercase();
        sqlx::query_scalar(
            "INSERT INTO items (sku, name, item_type, unit_of_measure, quantity) \
             VALUES ($1, $1, $2, 'pcs', $3) RETURNING id",
        )
        .bind(&sku)
        .bind(item_type)
        .bind(quantity)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_overdraw_is_a_conflict() {
        let Some(db) = database().await else { return };
        let mut tx = db.begin().await.unwrap();
        let item_id = insert_item(&mut tx, "RAW", Decimal::ONE).await;

        let movement = StockMovement {
            item_id,
            delta: Decimal::new(-15, 1),
            transaction_type: TransactionType::Adjustment,
            note: String::new(),
        };
        let err = apply_movement(&mut tx, &movement, None, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StockConflict(id) if id == item_id));
        assert_eq!(fetch_item(&mut tx, item_id).await.unwrap().quantity, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_movement_writes_matching_ledger_entry() {
        let Some(db) = database().await else { return };
        let mut tx = db.begin().await.unwrap();
        let item_id = insert_item(&mut tx, "RAW", Decimal::ONE).await;

        let movement = StockMovement {
            item_id,
            delta: Decimal::new(-4, 4),
            transaction_type: TransactionType::Sale,
            note: "sample".to_string(),
        };
        let entry = apply_movement(&mut tx, &movement, None, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(entry.quantity, Decimal::new(-4, 4));
        assert_eq!(
            fetch_item(&mut tx, item_id).await.unwrap().quantity,
            Decimal::new(9996, 4)
        );
    }

    #[tokio::test]
    async fn test_lock_names_missing_item() {
        let Some(db) = database().await else { return };
        let mut tx = db.begin().await.unwrap();
        let present = insert_item(&mut tx, "RAW", Decimal::TEN).await;
        let missing = Uuid::new_v4();

        let ids: BTreeSet<Uuid> = [present, missing].into_iter().collect();
        let err = lock_stock(&mut tx, &ids).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains(&missing.to_string())));
    }

    #[tokio::test]
    async fn test_graph_reaches_nested_inputs_only() {
        let Some(db) = database().await else { return };
        let mut tx = db.begin().await.unwrap();
        let raw = insert_item(&mut tx, "RAW", Decimal::TEN).await;
        let part = insert_item(&mut tx, "INTERMEDIATE", Decimal::ZERO).await;
        let product = insert_item(&mut tx, "FINAL", Decimal::ZERO).await;
        let unrelated = insert_item(&mut tx, "RAW", Decimal::TEN).await;

        for (output, input) in [(part, raw), (product, part)] {
            sqlx::query(
                "INSERT INTO bom_entries (output_item_id, input_item_id, quantity_required, unit_of_measure) \
                 VALUES ($1, $2, 2, 'pcs')",
            )
            .bind(output)
            .bind(input)
            .execute(&mut *tx)
            .await
            .unwrap();
        }

        let graph = load_graph(&mut tx, product).await.unwrap();
        assert!(graph.item(raw).is_ok());
        assert!(graph.item(part).is_ok());
        assert!(graph.item(unrelated).is_err());
        assert!(graph.has_bom(product));
        assert!(graph.has_bom(part));
    }
}
