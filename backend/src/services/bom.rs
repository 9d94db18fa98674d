//! Bill of materials service: structure queries, customization, material
//! requirements and BOM administration

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::bom::{self, BomGraph, BomResolver, DEFAULT_MAX_DEPTH};
use shared::{BomEntry, BomSlot, BomTree, Item, MaterialRequirement, Selection, SuggestedInput};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::rules::positive;
use super::stock::{self, BomEntryRow, BOM_COLUMNS};
use crate::error::{map_unique_violation, AppError, AppResult};

/// Transaction-scoped advisory lock serializing BOM structure changes, so two
/// concurrent edits cannot each pass the cycle check and close a loop together
const BOM_STRUCTURE_LOCK: i64 = 0x424f4d;

const DEFAULT_SEQUENCE: i32 = 10;

/// BOM service
#[derive(Clone)]
pub struct BomService {
    db: PgPool,
    max_depth: usize,
}

/// One component line of a bill of materials
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BomComponentInput {
    pub input_item_id: Uuid,
    #[validate(custom = "positive")]
    pub quantity_required: Decimal,
    /// Defaults to the input item's unit
    #[validate(custom = "super::rules::unit_of_measure")]
    pub unit_of_measure: Option<String>,
    pub sequence: Option<i32>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default = "default_true")]
    pub is_default: bool,
    #[validate(custom = "super::rules::alternative_group")]
    pub alternative_group: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Input for replacing the whole BOM of an output item
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteBomInput {
    #[validate]
    pub components: Vec<BomComponentInput>,
}

/// Input for updating a BOM entry. Output and input items are fixed; delete
/// and recreate the entry to change them.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBomEntryInput {
    #[validate(custom = "positive")]
    pub quantity_required: Option<Decimal>,
    #[validate(custom = "super::rules::unit_of_measure")]
    pub unit_of_measure: Option<String>,
    pub sequence: Option<i32>,
    pub is_optional: Option<bool>,
    pub is_default: Option<bool>,
    #[validate(custom = "super::rules::alternative_group")]
    pub alternative_group: Option<String>,
    /// Move the entry out of its alternative group
    #[serde(default)]
    pub clear_alternative_group: bool,
}

/// Input for previewing a product variant or its material needs
#[derive(Debug, Default, Deserialize)]
pub struct CustomizationInput {
    #[serde(default)]
    pub component_selections: Vec<Selection>,
}

/// Input for computing material requirements
#[derive(Debug, Deserialize)]
pub struct RequirementsInput {
    pub quantity: Decimal,
    #[serde(default)]
    pub component_selections: Vec<Selection>,
}

impl BomService {
    /// Create a new BomService instance
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

    async fn graph_for(&self, item_id: Uuid) -> AppResult<BomGraph> {
        let mut conn = self.db.acquire().await?;
        stock::load_graph(&mut conn, item_id).await
    }

    fn resolver<'g>(&self, graph: &'g BomGraph) -> BomResolver<'g> {
        BomResolver::new(graph).with_max_depth(self.max_depth)
    }

    // ========================================================================
    // Structure queries
    // ========================================================================

    /// Direct BOM of a product grouped by alternative group
    pub async fn get_product_bom(&self, item_id: Uuid) -> AppResult<Vec<BomSlot>> {
        let graph = self.graph_for(item_id).await?;
        Ok(bom::product_bom(&graph, item_id)?)
    }

    /// Fully expanded BOM tree of an item
    pub async fn get_recursive_bom(&self, item_id: Uuid) -> AppResult<BomTree> {
        let graph = self.graph_for(item_id).await?;
        let tree = self.resolver(&graph).tree(item_id)?;
        tracing::debug!("Expanded BOM of {} to depth {}", tree.item_name, tree.depth());
        Ok(tree)
    }

    /// Concrete component list for a product variant
    pub async fn customize_product(
        &self,
        item_id: Uuid,
        selections: &[Selection],
    ) -> AppResult<Vec<BomEntry>> {
        let graph = self.graph_for(item_id).await?;
        Ok(bom::customize(&graph, item_id, selections)?)
    }

    /// Leaf material totals for producing `quantity` units of a variant
    pub async fn calculate_material_requirements(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        selections: &[Selection],
    ) -> AppResult<Vec<MaterialRequirement>> {
        let graph = self.graph_for(item_id).await?;
        let requirements = self.resolver(&graph).requirements(item_id, quantity, selections)?;
        tracing::debug!(
            "Resolved {} leaf materials for {} x {}",
            requirements.len(),
            quantity,
            item_id
        );
        Ok(requirements.into_values().collect())
    }

    /// Direct inputs of the default structure scaled to `quantity`
    pub async fn suggest_inputs(&self, item_id: Uuid, quantity: Decimal) -> AppResult<Vec<SuggestedInput>> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
            });
        }
        let graph = self.graph_for(item_id).await?;
        Ok(self.resolver(&graph).suggest_inputs(item_id, quantity)?)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Direct BOM entries of an output item, in sequence order
    pub async fn list_bom_entries(&self, output_item_id: Uuid) -> AppResult<Vec<BomEntry>> {
        let mut conn = self.db.acquire().await?;
        // Surface a missing output as 404 rather than an empty list
        stock::fetch_item(&mut conn, output_item_id).await?;
        entries_of(&mut conn, output_item_id).await
    }

    /// Add one component to an output item's BOM
    pub async fn create_bom_entry(
        &self,
        output_item_id: Uuid,
        input: BomComponentInput,
    ) -> AppResult<BomEntry> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_bom_structure(&mut tx).await?;

        let output = stock::fetch_item(&mut tx, output_item_id).await?;
        let entry = add_component(&mut tx, &output, &input, DEFAULT_SEQUENCE).await?;

        tx.commit().await?;

        tracing::info!(
            "Added {} x {} to BOM of {}",
            entry.quantity_required,
            entry.input_item_id,
            output.sku
        );
        Ok(entry)
    }

    /// Replace the whole BOM of an output item; nothing changes unless every
    /// component is valid
    pub async fn create_complete_bom(
        &self,
        output_item_id: Uuid,
        input: CompleteBomInput,
    ) -> AppResult<Vec<BomEntry>> {
        input.validate()?;
        if input.components.is_empty() {
            return Err(AppError::Validation {
                field: "components".to_string(),
                message: "At least one component is required".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        lock_bom_structure(&mut tx).await?;

        let output = stock::fetch_item(&mut tx, output_item_id).await?;
        shared::validate_bom_output(output.item_type).map_err(|msg| AppError::Validation {
            field: "output_item_id".to_string(),
            message: msg.to_string(),
        })?;

        let removed = sqlx::query("DELETE FROM bom_entries WHERE output_item_id = $1")
            .bind(output.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for (index, component) in input.components.iter().enumerate() {
            let fallback_sequence = DEFAULT_SEQUENCE * (index as i32 + 1);
            add_component(&mut tx, &output, component, fallback_sequence).await?;
        }

        let entries = entries_of(&mut tx, output.id).await?;
        tx.commit().await?;

        tracing::info!(
            "Replaced BOM of {}: {} entries removed, {} created",
            output.sku,
            removed,
            entries.len()
        );
        Ok(entries)
    }

    /// Update quantities and grouping of a BOM entry
    pub async fn update_bom_entry(
        &self,
        entry_id: Uuid,
        input: UpdateBomEntryInput,
    ) -> AppResult<BomEntry> {
        input.validate()?;

        let row = sqlx::query_as::<_, BomEntryRow>(&format!(
            r#"
            UPDATE bom_entries SET
                quantity_required = COALESCE($2, quantity_required),
                unit_of_measure = COALESCE($3, unit_of_measure),
                sequence = COALESCE($4, sequence),
                is_optional = COALESCE($5, is_optional),
                is_default = COALESCE($6, is_default),
                alternative_group = CASE WHEN $7 THEN NULL ELSE COALESCE($8, alternative_group) END
            WHERE id = $1
            RETURNING {}
            "#,
            BOM_COLUMNS
        ))
        .bind(entry_id)
        .bind(input.quantity_required)
        .bind(input.unit_of_measure.as_deref().map(str::trim))
        .bind(input.sequence)
        .bind(input.is_optional)
        .bind(input.is_default)
        .bind(input.clear_alternative_group)
        .bind(input.alternative_group.as_deref().map(str::trim))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("BOM entry {}", entry_id)))?;

        tracing::info!("Updated BOM entry {}", entry_id);
        Ok(row.into())
    }

    /// Remove a BOM entry
    pub async fn delete_bom_entry(&self, entry_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bom_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("BOM entry {}", entry_id)));
        }

        tracing::info!("Deleted BOM entry {}", entry_id);
        Ok(())
    }
}

async fn lock_bom_structure(conn: &mut PgConnection) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(BOM_STRUCTURE_LOCK)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn entries_of(conn: &mut PgConnection, output_item_id: Uuid) -> AppResult<Vec<BomEntry>> {
    let rows = sqlx::query_as::<_, BomEntryRow>(&format!(
        "SELECT {} FROM bom_entries WHERE output_item_id = $1 ORDER BY sequence, created_at",
        BOM_COLUMNS
    ))
    .bind(output_item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(BomEntry::from).collect())
}

/// Validate and insert one component. The caller holds the structure lock.
async fn add_component(
    conn: &mut PgConnection,
    output: &Item,
    component: &BomComponentInput,
    fallback_sequence: i32,
) -> AppResult<BomEntry> {
    let input = stock::fetch_item(&mut *conn, component.input_item_id).await?;
    shared::validate_bom_entry(output, &input, component.quantity_required).map_err(|msg| {
        AppError::Validation {
            field: "input_item_id".to_string(),
            message: msg.to_string(),
        }
    })?;

    // Everything reachable from the new input; reaching the output closes a loop
    let graph = stock::load_graph(&mut *conn, input.id).await?;
    if graph.would_create_cycle(output.id, input.id) {
        return Err(AppError::InvalidBom(format!(
            "Adding {} as a component of {} would create a cycle",
            input.name, output.name
        )));
    }

    let unit = component
        .unit_of_measure
        .as_deref()
        .map(str::trim)
        .unwrap_or(&input.unit_of_measure);

    let row = sqlx::query_as::<_, BomEntryRow>(&format!(
        r#"
        INSERT INTO bom_entries (
            output_item_id, input_item_id, quantity_required, unit_of_measure,
            sequence, is_optional, is_default, alternative_group
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        BOM_COLUMNS
    ))
    .bind(output.id)
    .bind(input.id)
    .bind(component.quantity_required)
    .bind(unit)
    .bind(component.sequence.unwrap_or(fallback_sequence))
    .bind(component.is_optional)
    .bind(component.is_default)
    .bind(component.alternative_group.as_deref().map(str::trim))
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, "input_item_id"))?;

    Ok(row.into())
}
