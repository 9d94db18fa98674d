//! Persistence tests against a live PostgreSQL database
//!
//! These run only when `DATABASE_URL` is set (a `.env` file works too);
//! otherwise each test returns early. Migrations are applied on connect and
//! every test works on its own items under unique SKUs.

mod common;

use rust_decimal::Decimal;
use shared::{ItemType, ProcessStatus, TransactionType};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use erp_backend::error::AppError;
use erp_backend::services::bom::BomComponentInput;
use erp_backend::services::inventory::TransactionFilter;
use erp_backend::services::item::CreateItemInput;
use erp_backend::services::process::{
    CreateProcessInput, ProcessInputRequest, ProcessOutputRequest, TransitionInput,
};
use erp_backend::services::production::{ProduceInput, ProductionFilter, UpdateProductionInput};
use erp_backend::services::{BomService, InventoryService, ItemService, ProcessService, ProductionService};

use common::dec;

async fn database() -> Option<PgPool> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    Some(pool)
}

/// Items and BOM lines for one test, namespaced by a random tag
struct Shop {
    db: PgPool,
    actor: Uuid,
    tag: String,
}

impl Shop {
    fn new(db: PgPool) -> Self {
        let tag = Uuid::new_v4().simple().to_string()[..12].to_uppercase();
        Self {
            db,
            actor: Uuid::new_v4(),
            tag,
        }
    }

    async fn item(&self, name: &str, item_type: ItemType, quantity: &str) -> Uuid {
        let input = CreateItemInput {
            sku: format!("{}-{}", name, self.tag),
            name: name.to_string(),
            description: None,
            item_type,
            unit_of_measure: "pcs".to_string(),
            initial_quantity: Some(dec(quantity)),
            minimum_stock_level: None,
            purchase_price: None,
            selling_price: None,
            dealer_price: None,
        };
        ItemService::new(self.db.clone())
            .create_item(self.actor, input)
            .await
            .unwrap()
            .id
    }

    async fn link(&self, output: Uuid, input: Uuid, quantity: &str) {
        let component = BomComponentInput {
            input_item_id: input,
            quantity_required: dec(quantity),
            unit_of_measure: None,
            sequence: None,
            is_optional: false,
            is_default: true,
            alternative_group: None,
        };
        BomService::new(self.db.clone())
            .create_bom_entry(output, component)
            .await
            .unwrap();
    }

    async fn stock(&self, item_id: Uuid) -> Decimal {
        ItemService::new(self.db.clone())
            .get_item(item_id)
            .await
            .unwrap()
            .quantity
    }

    async fn produce(&self, item_id: Uuid, quantity: &str, notes: Option<String>) -> Result<Uuid, AppError> {
        let input = ProduceInput {
            item_id,
            quantity: dec(quantity),
            component_selections: vec![],
            notes,
        };
        ProductionService::new(self.db.clone())
            .produce_product(self.actor, input)
            .await
            .map(|result| result.production_id)
    }

    /// Sum of the ledger deltas a production wrote against one item
    async fn production_delta(&self, production_id: Uuid, item_id: Uuid) -> Decimal {
        InventoryService::new(self.db.clone())
            .get_transactions_by_reference("production", production_id)
            .await
            .unwrap()
            .iter()
            .filter(|t| t.item_id == item_id)
            .map(|t| t.quantity)
            .sum()
    }

    async fn ledger_len(&self, item_id: Uuid) -> usize {
        let filter = TransactionFilter {
            item_id: Some(item_id),
            ..Default::default()
        };
        InventoryService::new(self.db.clone())
            .list_transactions(filter)
            .await
            .unwrap()
            .len()
    }

    async fn assert_reconciled(&self, item_id: Uuid) {
        let reconciliation = InventoryService::new(self.db.clone())
            .reconcile_item(item_id)
            .await
            .unwrap();
        assert!(reconciliation.is_consistent(), "{:?}", reconciliation);
    }
}

// ============================================================================
// Production Runs
// ============================================================================

#[tokio::test]
async fn test_nested_ratios_stored_exactly() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let resin = shop.item("RESIN", ItemType::Raw, "1").await;
    let cap = shop.item("CAP", ItemType::Intermediate, "0").await;
    let knob = shop.item("KNOB", ItemType::Final, "0").await;
    shop.link(cap, resin, "0.125").await;
    shop.link(knob, cap, "0.5").await;

    let production_id = shop.produce(knob, "1", None).await.unwrap();

    assert_eq!(shop.stock(resin).await, dec("0.9375"));
    assert_eq!(shop.stock(knob).await, dec("1"));
    assert_eq!(shop.stock(cap).await, Decimal::ZERO);
    assert_eq!(shop.production_delta(production_id, resin).await, dec("-0.0625"));
    assert_eq!(shop.production_delta(production_id, knob).await, dec("1"));

    let record = ProductionService::new(shop.db.clone())
        .get_production(production_id)
        .await
        .unwrap();
    assert_eq!(record.consumed_items.len(), 1);
    assert_eq!(record.consumed_items[0].quantity_consumed, dec("0.0625"));

    for id in [resin, cap, knob] {
        shop.assert_reconciled(id).await;
    }
}

#[tokio::test]
async fn test_sub_thousandth_consumption_persists() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let gold = shop.item("GOLD", ItemType::Raw, "1").await;
    let die = shop.item("DIE", ItemType::Intermediate, "0").await;
    let chip = shop.item("CHIP", ItemType::Final, "0").await;
    shop.link(die, gold, "0.002").await;
    shop.link(chip, die, "0.2").await;

    let production_id = shop.produce(chip, "1", None).await.unwrap();

    let record = ProductionService::new(shop.db.clone())
        .get_production(production_id)
        .await
        .unwrap();
    assert_eq!(record.consumed_items[0].quantity_consumed, dec("0.0004"));
    assert_eq!(shop.stock(gold).await, dec("0.9996"));
    shop.assert_reconciled(gold).await;
}

#[tokio::test]
async fn test_shortage_writes_nothing() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let steel = shop.item("STEEL", ItemType::Raw, "3").await;
    let widget = shop.item("WIDGET", ItemType::Final, "0").await;
    shop.link(widget, steel, "2").await;

    let err = shop.produce(widget, "2", None).await.unwrap_err();
    match err {
        AppError::InsufficientStock { shortages } => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].item_id, steel);
            assert_eq!(shortages[0].shortage, dec("1"));
        }
        other => panic!("expected insufficient stock, got {:?}", other),
    }

    assert_eq!(shop.stock(steel).await, dec("3"));
    assert_eq!(shop.stock(widget).await, Decimal::ZERO);
    assert_eq!(shop.ledger_len(steel).await, 1);
    assert_eq!(shop.ledger_len(widget).await, 0);

    let runs = ProductionService::new(shop.db.clone())
        .list_productions(ProductionFilter {
            item_id: Some(widget),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn test_failure_after_stock_moved_rolls_back() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db.clone());

    let steel = shop.item("STEEL", ItemType::Raw, "10").await;
    let bolt = shop.item("BOLT", ItemType::Raw, "10").await;
    let widget = shop.item("WIDGET", ItemType::Final, "0").await;
    shop.link(widget, steel, "2").await;
    shop.link(widget, bolt, "4").await;

    // The history row is written after every stock movement, so failing it
    // aborts a run whose ledger and quantities are already updated.
    let marker = format!("abort-{}", shop.tag);
    let function = format!("abort_history_{}", shop.tag.to_lowercase());
    sqlx::query(&format!(
        "CREATE FUNCTION {}() RETURNS trigger AS $$ BEGIN RAISE EXCEPTION 'history write refused'; END $$ LANGUAGE plpgsql",
        function
    ))
    .execute(&db)
    .await
    .unwrap();
    sqlx::query(&format!(
        "CREATE TRIGGER {f} BEFORE INSERT ON production_history FOR EACH ROW \
         WHEN (NEW.notes = '{m}') EXECUTE FUNCTION {f}()",
        f = function,
        m = marker
    ))
    .execute(&db)
    .await
    .unwrap();

    let result = shop.produce(widget, "2", Some(marker.clone())).await;

    sqlx::query(&format!("DROP TRIGGER {f} ON production_history", f = function))
        .execute(&db)
        .await
        .unwrap();
    sqlx::query(&format!("DROP FUNCTION {}()", function))
        .execute(&db)
        .await
        .unwrap();

    assert!(matches!(result, Err(AppError::DatabaseError(_))), "{:?}", result);
    assert_eq!(shop.stock(steel).await, dec("10"));
    assert_eq!(shop.stock(bolt).await, dec("10"));
    assert_eq!(shop.stock(widget).await, Decimal::ZERO);
    assert_eq!(shop.ledger_len(steel).await, 1);
    assert_eq!(shop.ledger_len(bolt).await, 1);
    assert_eq!(shop.ledger_len(widget).await, 0);

    let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM productions WHERE notes = $1")
        .bind(&marker)
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(leftover, 0);

    // Same run without the marker goes through
    shop.produce(widget, "2", None).await.unwrap();
    assert_eq!(shop.stock(steel).await, dec("6"));
    assert_eq!(shop.stock(bolt).await, dec("2"));
}

#[tokio::test]
async fn test_update_replaces_consumption_and_nets_ledger() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let steel = shop.item("STEEL", ItemType::Raw, "10").await;
    let widget = shop.item("WIDGET", ItemType::Final, "0").await;
    shop.link(widget, steel, "2").await;

    let production_id = shop.produce(widget, "2", None).await.unwrap();
    assert_eq!(shop.stock(steel).await, dec("6"));

    let service = ProductionService::new(shop.db.clone());
    let updated = service
        .update_production(
            shop.actor,
            production_id,
            UpdateProductionInput {
                output_quantity: Some(dec("3")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.output_quantity, dec("3"));
    assert_eq!(updated.consumed_items.len(), 1);
    assert_eq!(updated.consumed_items[0].quantity_consumed, dec("6"));

    let stored = service.get_production(production_id).await.unwrap();
    assert_eq!(stored.consumed_items, updated.consumed_items);

    assert_eq!(shop.stock(steel).await, dec("4"));
    assert_eq!(shop.stock(widget).await, dec("3"));
    assert_eq!(shop.production_delta(production_id, steel).await, dec("-6"));
    assert_eq!(shop.production_delta(production_id, widget).await, dec("3"));

    let reversals = InventoryService::new(shop.db.clone())
        .get_transactions_by_reference("production", production_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::ProductionReversal)
        .count();
    assert_eq!(reversals, 2);

    let history = service.get_production_history(production_id).await.unwrap();
    assert_eq!(history.len(), 2);

    shop.assert_reconciled(steel).await;
    shop.assert_reconciled(widget).await;
}

// ============================================================================
// Production Processes
// ============================================================================

#[tokio::test]
async fn test_process_lifecycle_persists() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let steel = shop.item("STEEL", ItemType::Raw, "100").await;
    let widget = shop.item("WIDGET", ItemType::Final, "0").await;
    shop.link(widget, steel, "2").await;

    let service = ProcessService::new(shop.db.clone());
    let process = service
        .create_process(
            shop.actor,
            CreateProcessInput {
                name: "Widget batch".to_string(),
                description: None,
                target_output_item_id: widget,
                target_output_quantity: dec("10"),
            },
        )
        .await
        .unwrap();
    assert_eq!(process.status, ProcessStatus::Planned);
    assert_eq!(process.performed_by, Some(shop.actor));

    let suggested = service.suggest_inputs(process.id).await.unwrap();
    assert_eq!(suggested.len(), 1);
    assert_eq!(suggested[0].item_id, steel);
    assert_eq!(suggested[0].quantity_required, dec("20"));

    let early = service
        .add_process_output(
            process.id,
            ProcessOutputRequest {
                item_id: widget,
                quantity_produced: dec("1"),
            },
        )
        .await;
    assert!(matches!(early, Err(AppError::InvalidState(_))));

    let started = service.start_process(process.id, TransitionInput::default()).await.unwrap();
    assert_eq!(started.status, ProcessStatus::InProgress);
    assert!(started.process_start_date.is_some());

    service
        .add_process_input(
            process.id,
            ProcessInputRequest {
                item_id: steel,
                quantity_consumed: dec("19"),
            },
        )
        .await
        .unwrap();
    service
        .add_process_output(
            process.id,
            ProcessOutputRequest {
                item_id: widget,
                quantity_produced: dec("9.5"),
            },
        )
        .await
        .unwrap();

    let completed = service
        .complete_process(process.id, TransitionInput::default())
        .await
        .unwrap();
    assert_eq!(completed.status, ProcessStatus::Completed);
    assert!(completed.process_end_date.is_some());

    let details = service.get_process_details(process.id).await.unwrap();
    assert_eq!(details.inputs.len(), 1);
    assert_eq!(details.outputs.len(), 1);
    assert_eq!(details.efficiency, Some(dec("95")));

    let again = service.cancel_process(process.id).await;
    assert!(matches!(again, Err(AppError::InvalidState(_))));

    // Processes record work; stock only moves through production runs
    assert_eq!(shop.stock(steel).await, dec("100"));
    assert_eq!(shop.stock(widget).await, Decimal::ZERO);

    let active = service.active_processes().await.unwrap();
    assert!(active.iter().all(|p| p.id != process.id));
}

#[tokio::test]
async fn test_process_cannot_complete_without_outputs() {
    let Some(db) = database().await else { return };
    let shop = Shop::new(db);

    let widget = shop.item("WIDGET", ItemType::Final, "0").await;
    let service = ProcessService::new(shop.db.clone());
    let process = service
        .create_process(
            shop.actor,
            CreateProcessInput {
                name: "Empty batch".to_string(),
                description: None,
                target_output_item_id: widget,
                target_output_quantity: dec("5"),
            },
        )
        .await
        .unwrap();
    service.start_process(process.id, TransitionInput::default()).await.unwrap();

    let err = service
        .complete_process(process.id, TransitionInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "outputs"));

    let stored = service.get_process(process.id).await.unwrap();
    assert_eq!(stored.status, ProcessStatus::InProgress);

    let cancelled = service.cancel_process(process.id).await.unwrap();
    assert_eq!(cancelled.status, ProcessStatus::Cancelled);
}
