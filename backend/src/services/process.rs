//! Production process service: planned jobs, their lifecycle and the inputs
//! and outputs recorded against them
//!
//! Processes are planning records. Stock only moves through production runs
//! and the inventory ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::bom::{BomResolver, DEFAULT_MAX_DEPTH};
use shared::process::{self, ensure_accepts_inputs, ensure_accepts_outputs};
use shared::{
    Pagination, ProcessAction, ProcessDetails, ProcessInput, ProcessOutput, ProcessStatus,
    ProductionProcess, SuggestedInput,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::rules::positive;
use super::stock;
use crate::error::{AppError, AppResult};

const PROCESS_COLUMNS: &str = "id, name, description, status, target_output_item_id, \
     target_output_quantity, process_start_date, process_end_date, performed_by, created_at, updated_at";

/// Production process service
#[derive(Clone)]
pub struct ProcessService {
    db: PgPool,
    max_depth: usize,
}

/// Input for planning a process
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProcessInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub target_output_item_id: Uuid,
    #[validate(custom = "positive")]
    pub target_output_quantity: Decimal,
}

/// Optional timestamp for start and complete; defaults to now
#[derive(Debug, Default, Deserialize)]
pub struct TransitionInput {
    pub date: Option<DateTime<Utc>>,
}

/// Material used by a process
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessInputRequest {
    pub item_id: Uuid,
    #[validate(custom = "positive")]
    pub quantity_consumed: Decimal,
}

/// Product made by a process
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessOutputRequest {
    pub item_id: Uuid,
    #[validate(custom = "positive")]
    pub quantity_produced: Decimal,
}

/// Query filter for listing processes
#[derive(Debug, Default, Deserialize)]
pub struct ProcessFilter {
    pub status: Option<ProcessStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProcessFilter {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            per_page: self.per_page.unwrap_or(default.per_page),
        }
    }
}

#[derive(Debug, FromRow)]
struct ProcessRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    target_output_item_id: Uuid,
    target_output_quantity: Decimal,
    process_start_date: Option<DateTime<Utc>>,
    process_end_date: Option<DateTime<Utc>>,
    performed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProcessRow> for ProductionProcess {
    type Error = AppError;

    fn try_from(row: ProcessRow) -> Result<Self, Self::Error> {
        Ok(ProductionProcess {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row.status.parse().map_err(AppError::Internal)?,
            target_output_item_id: row.target_output_item_id,
            target_output_quantity: row.target_output_quantity,
            process_start_date: row.process_start_date,
            process_end_date: row.process_end_date,
            performed_by: row.performed_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProcessLineRow {
    id: Uuid,
    process_id: Uuid,
    item_id: Uuid,
    quantity: Decimal,
    created_at: DateTime<Utc>,
}

impl From<ProcessLineRow> for ProcessInput {
    fn from(row: ProcessLineRow) -> Self {
        ProcessInput {
            id: row.id,
            process_id: row.process_id,
            item_id: row.item_id,
            quantity_consumed: row.quantity,
            created_at: row.created_at,
        }
    }
}

impl From<ProcessLineRow> for ProcessOutput {
    fn from(row: ProcessLineRow) -> Self {
        ProcessOutput {
            id: row.id,
            process_id: row.process_id,
            item_id: row.item_id,
            quantity_produced: row.quantity,
            created_at: row.created_at,
        }
    }
}

impl ProcessService {
    /// Create a new ProcessService instance
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

    /// Plan a process for a producible item
    pub async fn create_process(&self, actor: Uuid, input: CreateProcessInput) -> AppResult<ProductionProcess> {
        input.validate()?;

        let mut conn = self.db.acquire().await?;
        let target = stock::fetch_item(&mut conn, input.target_output_item_id).await?;
        if target.is_raw_material() {
            return Err(AppError::Validation {
                field: "target_output_item_id".to_string(),
                message: "Raw materials cannot be produced".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ProcessRow>(&format!(
            r#"
            INSERT INTO production_processes (name, description, target_output_item_id, target_output_quantity, performed_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROCESS_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(target.id)
        .bind(input.target_output_quantity)
        .bind(actor)
        .fetch_one(&mut *conn)
        .await?;

        let process = ProductionProcess::try_from(row)?;
        tracing::info!(
            "Planned process {} ({}): {} x {}",
            process.name,
            process.id,
            process.target_output_quantity,
            target.sku
        );
        Ok(process)
    }

    /// Get a process
    pub async fn get_process(&self, process_id: Uuid) -> AppResult<ProductionProcess> {
        let mut conn = self.db.acquire().await?;
        load_process(&mut conn, process_id, false).await
    }

    /// List processes, newest first
    pub async fn list_processes(&self, filter: ProcessFilter) -> AppResult<Vec<ProductionProcess>> {
        let pagination = filter.pagination();
        let rows = sqlx::query_as::<_, ProcessRow>(&format!(
            r#"
            SELECT {}
            FROM production_processes
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            PROCESS_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionProcess::try_from).collect()
    }

    /// Planned and in-progress processes
    pub async fn active_processes(&self) -> AppResult<Vec<ProductionProcess>> {
        let rows = sqlx::query_as::<_, ProcessRow>(&format!(
            "SELECT {} FROM production_processes WHERE status IN ('PLANNED', 'IN_PROGRESS') ORDER BY created_at DESC, id",
            PROCESS_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionProcess::try_from).collect()
    }

    /// A process with its inputs, outputs and efficiency
    pub async fn get_process_details(&self, process_id: Uuid) -> AppResult<ProcessDetails> {
        let mut conn = self.db.acquire().await?;
        let process = load_process(&mut conn, process_id, false).await?;

        let inputs: Vec<ProcessInput> = lines(&mut conn, "process_inputs", "quantity_consumed", process_id)
            .await?
            .into_iter()
            .map(ProcessInput::from)
            .collect();
        let outputs: Vec<ProcessOutput> = lines(&mut conn, "process_outputs", "quantity_produced", process_id)
            .await?
            .into_iter()
            .map(ProcessOutput::from)
            .collect();

        let efficiency = process::efficiency(process.status, process.target_output_quantity, &outputs);
        Ok(ProcessDetails {
            process,
            inputs,
            outputs,
            efficiency,
        })
    }

    pub async fn start_process(&self, process_id: Uuid, input: TransitionInput) -> AppResult<ProductionProcess> {
        self.advance(process_id, ProcessAction::Start, input.date).await
    }

    pub async fn complete_process(&self, process_id: Uuid, input: TransitionInput) -> AppResult<ProductionProcess> {
        self.advance(process_id, ProcessAction::Complete, input.date).await
    }

    pub async fn cancel_process(&self, process_id: Uuid) -> AppResult<ProductionProcess> {
        self.advance(process_id, ProcessAction::Cancel, None).await
    }

    /// Apply one lifecycle step under a row lock
    async fn advance(
        &self,
        process_id: Uuid,
        action: ProcessAction,
        date: Option<DateTime<Utc>>,
    ) -> AppResult<ProductionProcess> {
        let mut tx = self.db.begin().await?;
        let current = load_process(&mut tx, process_id, true).await?;

        let has_outputs = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM process_outputs WHERE process_id = $1)",
        )
        .bind(process_id)
        .fetch_one(&mut *tx)
        .await?;

        let next = process::transition(current.status, action, has_outputs)?;

        let row = sqlx::query_as::<_, ProcessRow>(&format!(
            r#"
            UPDATE production_processes SET
                status = $2,
                process_start_date = CASE WHEN $3 THEN COALESCE($5, NOW()) ELSE process_start_date END,
                process_end_date = CASE WHEN $4 THEN COALESCE($5, NOW()) ELSE process_end_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROCESS_COLUMNS
        ))
        .bind(process_id)
        .bind(next.as_str())
        .bind(action == ProcessAction::Start)
        .bind(action == ProcessAction::Complete)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Process {}: {} -> {}", process_id, current.status, next);
        ProductionProcess::try_from(row)
    }

    /// Record material used by an active process
    pub async fn add_process_input(&self, process_id: Uuid, input: ProcessInputRequest) -> AppResult<ProcessInput> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let process = load_process(&mut tx, process_id, true).await?;
        ensure_accepts_inputs(process.status)?;
        let item = stock::fetch_item(&mut tx, input.item_id).await?;

        let row = insert_line(
            &mut tx,
            "process_inputs",
            "quantity_consumed",
            process_id,
            item.id,
            input.quantity_consumed,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!("Process {} input: {} x {}", process_id, input.quantity_consumed, item.sku);
        Ok(row.into())
    }

    /// Record product made by a running process
    pub async fn add_process_output(&self, process_id: Uuid, input: ProcessOutputRequest) -> AppResult<ProcessOutput> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let process = load_process(&mut tx, process_id, true).await?;
        ensure_accepts_outputs(process.status)?;
        let item = stock::fetch_item(&mut tx, input.item_id).await?;
        if item.is_raw_material() {
            return Err(AppError::Validation {
                field: "item_id".to_string(),
                message: "Raw materials cannot be produced".to_string(),
            });
        }

        let row = insert_line(
            &mut tx,
            "process_outputs",
            "quantity_produced",
            process_id,
            item.id,
            input.quantity_produced,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!("Process {} output: {} x {}", process_id, input.quantity_produced, item.sku);
        Ok(row.into())
    }

    /// Direct BOM inputs of the target item scaled to the target quantity
    pub async fn suggest_inputs(&self, process_id: Uuid) -> AppResult<Vec<SuggestedInput>> {
        let mut conn = self.db.acquire().await?;
        let process = load_process(&mut conn, process_id, false).await?;
        let graph = stock::load_graph(&mut conn, process.target_output_item_id).await?;

        Ok(BomResolver::new(&graph)
            .with_max_depth(self.max_depth)
            .suggest_inputs(process.target_output_item_id, process.target_output_quantity)?)
    }
}

async fn load_process(conn: &mut PgConnection, process_id: Uuid, for_update: bool) -> AppResult<ProductionProcess> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ProcessRow>(&format!(
        "SELECT {} FROM production_processes WHERE id = $1{}",
        PROCESS_COLUMNS, lock
    ))
    .bind(process_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Production process {}", process_id)))?;

    row.try_into()
}

/// Input and output lines share a shape; `table` and `column` are fixed names
async fn lines(
    conn: &mut PgConnection,
    table: &str,
    column: &str,
    process_id: Uuid,
) -> AppResult<Vec<ProcessLineRow>> {
    let rows = sqlx::query_as::<_, ProcessLineRow>(&format!(
        "SELECT id, process_id, item_id, {} AS quantity, created_at FROM {} WHERE process_id = $1 ORDER BY created_at, id",
        column, table
    ))
    .bind(process_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn insert_line(
    conn: &mut PgConnection,
    table: &str,
    column: &str,
    process_id: Uuid,
    item_id: Uuid,
    quantity: Decimal,
) -> AppResult<ProcessLineRow> {
    let row = sqlx::query_as::<_, ProcessLineRow>(&format!(
        r#"
        INSERT INTO {table} (process_id, item_id, {column})
        VALUES ($1, $2, $3)
        RETURNING id, process_id, item_id, {column} AS quantity, created_at
        "#,
        table = table,
        column = column
    ))
    .bind(process_id)
    .bind(item_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}
