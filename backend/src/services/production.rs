//! Production service: atomic production runs, their edits and audit trail
//!
//! Every write path follows the same shape inside one transaction: load the
//! BOM graph, lock the involved item rows, let the planner in
//! `shared::production` decide the movements, then persist them. A rejected
//! plan returns before any write, and any later failure drops the
//! transaction.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::bom::{BomResolver, DEFAULT_MAX_DEPTH};
use shared::production::{plan_production, plan_update, InventorySnapshot, ProductionPlan};
use shared::{
    BomError, HistoryAction, Pagination, ProductionHistory, ProductionItem, ProductionRecord,
    ProductionResult, Selection,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::rules::positive;
use super::stock::{self, LedgerReference};
use crate::error::{AppError, AppResult};

const REFERENCE_MODEL: &str = "production";

/// Production service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    max_depth: usize,
}

/// Input for a production run
#[derive(Debug, Deserialize, Validate)]
pub struct ProduceInput {
    pub item_id: Uuid,
    #[validate(custom = "positive")]
    pub quantity: Decimal,
    #[serde(default)]
    pub component_selections: Vec<Selection>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Material line supplied when editing a run
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConsumedItemInput {
    pub input_item_id: Uuid,
    #[validate(custom = "positive")]
    pub quantity_consumed: Decimal,
}

/// Input for editing a recorded run. Without `consumed_items` the
/// consumption is recomputed from the BOM with the run's stored selections.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductionInput {
    #[validate(custom = "positive")]
    pub output_quantity: Option<Decimal>,
    #[validate]
    pub consumed_items: Option<Vec<ConsumedItemInput>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl UpdateProductionInput {
    /// Field rules plus the cross-field ones `Validate` cannot express
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if matches!(&self.consumed_items, Some(items) if items.is_empty()) {
            return Err(AppError::Validation {
                field: "consumed_items".to_string(),
                message: "At least one consumed item is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Query filter for listing production runs
#[derive(Debug, Default, Deserialize)]
pub struct ProductionFilter {
    pub item_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductionFilter {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            per_page: self.per_page.unwrap_or(default.per_page),
        }
    }
}

/// Row for production queries
#[derive(Debug, FromRow)]
struct ProductionRow {
    id: Uuid,
    output_item_id: Uuid,
    output_quantity: Decimal,
    executed_by: Uuid,
    execution_date: DateTime<Utc>,
    notes: Option<String>,
    component_selections: Json<Vec<Selection>>,
}

impl ProductionRow {
    fn into_record(self, consumed_items: Vec<ProductionItem>) -> ProductionRecord {
        ProductionRecord {
            id: self.id,
            output_item_id: self.output_item_id,
            output_quantity: self.output_quantity,
            executed_by: self.executed_by,
            execution_date: self.execution_date,
            notes: self.notes,
            component_selections: self.component_selections.0,
            consumed_items,
        }
    }
}

/// Row for consumed item queries
#[derive(Debug, FromRow)]
struct ProductionItemRow {
    production_id: Uuid,
    input_item_id: Uuid,
    quantity_consumed: Decimal,
    unit_of_measure: String,
}

impl From<ProductionItemRow> for ProductionItem {
    fn from(row: ProductionItemRow) -> Self {
        ProductionItem {
            input_item_id: row.input_item_id,
            quantity_consumed: row.quantity_consumed,
            unit_of_measure: row.unit_of_measure,
        }
    }
}

/// Row for history queries
#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    production_id: Uuid,
    action: String,
    performed_by: Uuid,
    timestamp: DateTime<Utc>,
    notes: Option<String>,
    previous_data: Option<serde_json::Value>,
    new_data: Option<serde_json::Value>,
}

impl TryFrom<HistoryRow> for ProductionHistory {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(ProductionHistory {
            id: row.id,
            production_id: row.production_id,
            action: row.action.parse().map_err(AppError::Internal)?,
            performed_by: row.performed_by,
            timestamp: row.timestamp,
            notes: row.notes,
            previous_data: row.previous_data,
            new_data: row.new_data,
        })
    }
}

const PRODUCTION_COLUMNS: &str =
    "id, output_item_id, output_quantity, executed_by, execution_date, notes, component_selections";

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Produce `quantity` units of an item, consuming its leaf materials
    pub async fn produce_product(&self, actor: Uuid, input: ProduceInput) -> AppResult<ProductionResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let graph = stock::load_graph(&mut tx, input.item_id).await?;
        let output = graph.item(input.item_id)?.clone();
        if !output.is_raw_material() && !graph.has_bom(output.id) {
            return Err(AppError::InvalidBom(format!(
                "{} has no bill of materials",
                output.name
            )));
        }

        let requirements = BomResolver::new(&graph)
            .with_max_depth(self.max_depth)
            .requirements(output.id, input.quantity, &input.component_selections)?;

        let mut involved: BTreeSet<Uuid> = requirements.keys().copied().collect();
        involved.insert(output.id);
        let snapshot = stock::lock_stock(&mut tx, &involved).await?;

        let (plan, materials) = plan_production(&output, input.quantity, requirements, &snapshot)
            .map_err(|err| log_rejection(&output.name, err))?;

        let production = sqlx::query_as::<_, ProductionRow>(&format!(
            r#"
            INSERT INTO productions (output_item_id, output_quantity, executed_by, notes, component_selections)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(output.id)
        .bind(input.quantity)
        .bind(actor)
        .bind(&input.notes)
        .bind(Json(&input.component_selections))
        .fetch_one(&mut *tx)
        .await?;

        let record = production.into_record(plan.consumed.clone());
        let after = self.apply_plan(&mut tx, &plan, record.id, actor, &snapshot).await?;
        insert_consumed_items(&mut tx, record.id, &record.consumed_items).await?;

        let touched = plan.touched_items();
        insert_history(
            &mut tx,
            record.id,
            HistoryAction::Created,
            actor,
            input.notes.clone(),
            Some(json!({ "stock": snapshot.quantities_of(&touched) })),
            Some(json!({ "production": &record, "stock": after.quantities_of(&touched) })),
        )
        .await?;

        let product = stock::fetch_item(&mut tx, output.id).await?;
        tx.commit().await?;

        tracing::info!(
            "Production {} completed: {} x {} by {}, {} materials consumed",
            record.id,
            input.quantity,
            product.name,
            actor,
            materials.len()
        );

        Ok(ProductionResult {
            production_id: record.id,
            product,
            quantity_produced: input.quantity,
            materials_consumed: materials.into_values().collect(),
        })
    }

    /// Edit a recorded run by reversing it and applying the new figures
    pub async fn update_production(
        &self,
        actor: Uuid,
        production_id: Uuid,
        input: UpdateProductionInput,
    ) -> AppResult<ProductionRecord> {
        input.check()?;

        let mut tx = self.db.begin().await?;

        let original = load_record(&mut tx, production_id, true).await?;
        let new_quantity = input.output_quantity.unwrap_or(original.output_quantity);

        let new_consumed = match &input.consumed_items {
            Some(items) => explicit_consumption(&mut tx, items).await?,
            None => {
                let graph = stock::load_graph(&mut tx, original.output_item_id).await?;
                BomResolver::new(&graph)
                    .with_max_depth(self.max_depth)
                    .requirements(original.output_item_id, new_quantity, &original.component_selections)?
                    .into_values()
                    .map(|req| ProductionItem {
                        input_item_id: req.item_id,
                        quantity_consumed: req.quantity,
                        unit_of_measure: req.unit_of_measure,
                    })
                    .collect()
            }
        };

        let mut involved: BTreeSet<Uuid> = original
            .consumed_items
            .iter()
            .chain(new_consumed.iter())
            .map(|c| c.input_item_id)
            .collect();
        involved.insert(original.output_item_id);
        let snapshot = stock::lock_stock(&mut tx, &involved).await?;

        let plan = plan_update(&original, new_quantity, new_consumed, &snapshot)
            .map_err(|err| log_rejection(&snapshot.name(original.output_item_id), err))?;

        let after = self.apply_plan(&mut tx, &plan, original.id, actor, &snapshot).await?;

        sqlx::query("DELETE FROM production_items WHERE production_id = $1")
            .bind(original.id)
            .execute(&mut *tx)
            .await?;
        insert_consumed_items(&mut tx, original.id, &plan.consumed).await?;

        let updated = sqlx::query_as::<_, ProductionRow>(&format!(
            r#"
            UPDATE productions
            SET output_quantity = $2, notes = COALESCE($3, notes)
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(original.id)
        .bind(plan.output_quantity)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?
        .into_record(plan.consumed.clone());

        let touched = plan.touched_items();
        insert_history(
            &mut tx,
            original.id,
            HistoryAction::Updated,
            actor,
            input.notes.clone(),
            Some(json!({ "production": &original, "stock": snapshot.quantities_of(&touched) })),
            Some(json!({ "production": &updated, "stock": after.quantities_of(&touched) })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Production {} updated by {}: output {} -> {}, {} ledger movements",
            updated.id,
            actor,
            original.output_quantity,
            updated.output_quantity,
            plan.movements.len()
        );
        Ok(updated)
    }

    /// Get a production run with its consumed items
    pub async fn get_production(&self, production_id: Uuid) -> AppResult<ProductionRecord> {
        let mut conn = self.db.acquire().await?;
        load_record(&mut conn, production_id, false).await
    }

    /// List production runs, newest first
    pub async fn list_productions(&self, filter: ProductionFilter) -> AppResult<Vec<ProductionRecord>> {
        let pagination = filter.pagination();

        let rows = sqlx::query_as::<_, ProductionRow>(&format!(
            r#"
            SELECT {}
            FROM productions
            WHERE ($1::uuid IS NULL OR output_item_id = $1)
              AND ($2::timestamptz IS NULL OR execution_date >= $2)
              AND ($3::timestamptz IS NULL OR execution_date < $3)
            ORDER BY execution_date DESC, id
            LIMIT $4 OFFSET $5
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(filter.item_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, ProductionItemRow>(
            r#"
            SELECT production_id, input_item_id, quantity_consumed, unit_of_measure
            FROM production_items
            WHERE production_id = ANY($1)
            ORDER BY production_id, input_item_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut consumed: HashMap<Uuid, Vec<ProductionItem>> = HashMap::new();
        for row in item_rows {
            consumed.entry(row.production_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = consumed.remove(&row.id).unwrap_or_default();
                row.into_record(items)
            })
            .collect())
    }

    /// Audit trail of a production run, oldest first
    pub async fn get_production_history(&self, production_id: Uuid) -> AppResult<Vec<ProductionHistory>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM productions WHERE id = $1)")
            .bind(production_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(BomError::ProductionNotFound(production_id).into());
        }

        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, production_id, action, performed_by, timestamp, notes, previous_data, new_data
            FROM production_history
            WHERE production_id = $1
            ORDER BY timestamp, id
            "#,
        )
        .bind(production_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionHistory::try_from).collect()
    }

    /// Write every movement of a plan in order, returning the stock after it
    async fn apply_plan(
        &self,
        conn: &mut PgConnection,
        plan: &ProductionPlan,
        production_id: Uuid,
        actor: Uuid,
        snapshot: &InventorySnapshot,
    ) -> AppResult<InventorySnapshot> {
        let reference = LedgerReference {
            model: REFERENCE_MODEL,
            id: production_id,
        };
        for movement in &plan.movements {
            stock::apply_movement(&mut *conn, movement, Some(reference), actor).await?;
        }

        let mut after = snapshot.clone();
        after.apply(&plan.movements);
        Ok(after)
    }
}

/// Log a business rejection before it becomes a response
fn log_rejection(product: &str, err: BomError) -> AppError {
    if let BomError::InsufficientStock(shortages) = &err {
        tracing::warn!(
            "Production of {} rejected: {} materials short",
            product,
            shortages.len()
        );
    }
    err.into()
}

async fn load_record(conn: &mut PgConnection, production_id: Uuid, for_update: bool) -> AppResult<ProductionRecord> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ProductionRow>(&format!(
        "SELECT {} FROM productions WHERE id = $1{}",
        PRODUCTION_COLUMNS, lock
    ))
    .bind(production_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(BomError::ProductionNotFound(production_id))?;

    let items = sqlx::query_as::<_, ProductionItemRow>(
        r#"
        SELECT production_id, input_item_id, quantity_consumed, unit_of_measure
        FROM production_items
        WHERE production_id = $1
        ORDER BY input_item_id
        "#,
    )
    .bind(production_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(row.into_record(items.into_iter().map(ProductionItem::from).collect()))
}

/// Explicit consumption lines with units taken from the items themselves
async fn explicit_consumption(
    conn: &mut PgConnection,
    items: &[ConsumedItemInput],
) -> AppResult<Vec<ProductionItem>> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.input_item_id).collect();
    let units: HashMap<Uuid, String> = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, unit_of_measure FROM items WHERE id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    items
        .iter()
        .map(|item| {
            let unit = units
                .get(&item.input_item_id)
                .ok_or_else(|| AppError::NotFound(format!("Item {}", item.input_item_id)))?;
            Ok(ProductionItem {
                input_item_id: item.input_item_id,
                quantity_consumed: item.quantity_consumed,
                unit_of_measure: unit.clone(),
            })
        })
        .collect()
}

async fn insert_consumed_items(
    conn: &mut PgConnection,
    production_id: Uuid,
    items: &[ProductionItem],
) -> AppResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO production_items (production_id, input_item_id, quantity_consumed, unit_of_measure)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(production_id)
        .bind(item.input_item_id)
        .bind(item.quantity_consumed)
        .bind(&item.unit_of_measure)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_history(
    conn: &mut PgConnection,
    production_id: Uuid,
    action: HistoryAction,
    actor: Uuid,
    notes: Option<String>,
    previous_data: Option<serde_json::Value>,
    new_data: Option<serde_json::Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO production_history (production_id, action, performed_by, notes, previous_data, new_data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(production_id)
    .bind(action.as_str())
    .bind(actor)
    .bind(notes)
    .bind(previous_data)
    .bind(new_data)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
