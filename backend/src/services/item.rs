//! Item catalog service

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::production::StockMovement;
use shared::{Item, ItemType, Pagination, TransactionType};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::rules::{non_negative, price, sku};
use super::stock::{self, ItemRow, LedgerReference, ITEM_COLUMNS};
use crate::error::{map_unique_violation, AppError, AppResult};

/// Item catalog service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(custom = "sku")]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    #[validate(custom = "super::rules::unit_of_measure")]
    pub unit_of_measure: String,
    /// Opening stock, booked as an adjustment so the ledger explains it
    #[validate(custom = "non_negative")]
    pub initial_quantity: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub minimum_stock_level: Option<Decimal>,
    #[validate(custom = "price")]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "price")]
    pub selling_price: Option<Decimal>,
    #[validate(custom = "price")]
    pub dealer_price: Option<Decimal>,
}

/// Input for updating an item. Stock is only changed through the ledger.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "super::rules::unit_of_measure")]
    pub unit_of_measure: Option<String>,
    #[validate(custom = "non_negative")]
    pub minimum_stock_level: Option<Decimal>,
    #[validate(custom = "price")]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "price")]
    pub selling_price: Option<Decimal>,
    #[validate(custom = "price")]
    pub dealer_price: Option<Decimal>,
}

/// Query filter for listing items
#[derive(Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    /// Case-insensitive match on name or SKU
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ItemFilter {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            per_page: self.per_page.unwrap_or(default.per_page),
        }
    }
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an item, booking any opening stock through the ledger
    pub async fn create_item(&self, actor: Uuid, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let item_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO items (
                sku, name, description, item_type, unit_of_measure, quantity,
                minimum_stock_level, purchase_price, selling_price, dealer_price
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&input.sku)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.item_type.as_str())
        .bind(input.unit_of_measure.trim())
        .bind(input.minimum_stock_level.unwrap_or(Decimal::ZERO))
        .bind(input.purchase_price.unwrap_or(Decimal::ZERO))
        .bind(input.selling_price.unwrap_or(Decimal::ZERO))
        .bind(input.dealer_price.unwrap_or(Decimal::ZERO))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "sku"))?;

        if let Some(opening) = input.initial_quantity.filter(|q| *q > Decimal::ZERO) {
            let movement = StockMovement {
                item_id,
                delta: opening,
                transaction_type: TransactionType::Adjustment,
                note: "Opening stock".to_string(),
            };
            let reference = LedgerReference {
                model: "item",
                id: item_id,
            };
            stock::apply_movement(&mut tx, &movement, Some(reference), actor).await?;
        }

        let item = stock::fetch_item(&mut tx, item_id).await?;
        tx.commit().await?;

        tracing::info!("Created {} item {} ({})", item.item_type.as_str(), item.sku, item.id);
        Ok(item)
    }

    /// Get an item by id
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let mut conn = self.db.acquire().await?;
        stock::fetch_item(&mut conn, item_id).await
    }

    /// List items, optionally filtered by type or name/SKU search
    pub async fn list_items(&self, filter: ItemFilter) -> AppResult<Vec<Item>> {
        let pagination = filter.pagination();
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {}
            FROM items
            WHERE ($1::text IS NULL OR item_type = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2)
            ORDER BY sku
            LIMIT $3 OFFSET $4
            "#,
            ITEM_COLUMNS
        ))
        .bind(filter.item_type.map(|t| t.as_str()))
        .bind(search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        stock::rows_to_items(rows)
    }

    /// Update descriptive fields and prices of an item
    pub async fn update_item(&self, item_id: Uuid, input: UpdateItemInput) -> AppResult<Item> {
        input.validate()?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                unit_of_measure = COALESCE($4, unit_of_measure),
                minimum_stock_level = COALESCE($5, minimum_stock_level),
                purchase_price = COALESCE($6, purchase_price),
                selling_price = COALESCE($7, selling_price),
                dealer_price = COALESCE($8, dealer_price),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.unit_of_measure.as_deref().map(str::trim))
        .bind(input.minimum_stock_level)
        .bind(input.purchase_price)
        .bind(input.selling_price)
        .bind(input.dealer_price)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;

        let item = Item::try_from(row)?;
        tracing::info!("Updated item {} ({})", item.sku, item.id);
        Ok(item)
    }

    /// Items at or below their minimum stock level
    pub async fn low_stock_items(&self) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE quantity <= minimum_stock_level ORDER BY quantity - minimum_stock_level, sku",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        stock::rows_to_items(rows)
    }
}
