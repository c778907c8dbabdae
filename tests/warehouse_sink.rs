//! Behavior tests for the DuckDB item sink.
//!
//! Items written through [`WarehouseSink`] must land in the warehouse idempotently: rewriting
//! the same items changes nothing, and endpoints that fill different columns of one row merge
//! into that row instead of replacing it.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use supplyline_core::{
    ConfigError, Harvester, ItemSink, ItemTable, NormalizedItem, PassStop, PremierConnector,
    PremierInventory, PremierPricing, PriceSet, SqlValue, TableCount, Turn14ItemData, Turn14Media,
    Warehouse, WarehouseConfig, WarehouseSink,
};
use tempfile::TempDir;

use support::{options, premier_pricing_body, ScriptedHttp};

fn warehouse() -> (TempDir, Warehouse) {
    let dir = tempfile::tempdir().expect("temp dir");
    let warehouse =
        Warehouse::open(WarehouseConfig::at(dir.path().join("w.duckdb"))).expect("warehouse");
    (dir, warehouse)
}

fn rows_in(counts: &[TableCount], table: ItemTable) -> u64 {
    counts
        .iter()
        .find(|count| count.table == table)
        .map_or(0, |count| count.rows)
}

fn pricing(supplier_item_id: i64, cost: f64) -> NormalizedItem {
    NormalizedItem::PremierPricing(PremierPricing {
        supplier_item_id,
        item_number: format!("A{supplier_item_id}"),
        usd: PriceSet {
            cost: Some(cost),
            retail: Some(cost * 1.5),
            ..PriceSet::default()
        },
        cad: PriceSet::default(),
    })
}

fn inventory(supplier_item_id: i64, quantity: i64) -> NormalizedItem {
    NormalizedItem::PremierInventory(PremierInventory {
        supplier_item_id,
        item_number: format!("A{supplier_item_id}"),
        quantities: BTreeMap::from([(String::from("UT-1-US"), quantity)]),
    })
}

fn premier_columns(warehouse: &Warehouse, supplier_item_id: i64) -> Option<Vec<SqlValue>> {
    warehouse
        .fetch_fields(
            ItemTable::PremierItem,
            &[("supplier_item_id", SqlValue::Int(supplier_item_id))],
            &["cost_usd", "qty_ut_1_us"],
        )
        .expect("lookup")
}

// =============================================================================
// Idempotent writes
// =============================================================================

#[test]
fn when_the_same_items_are_written_twice_the_warehouse_is_unchanged() {
    // Given: a sink writing in transactions of two rows
    let (_dir, warehouse) = warehouse();
    let mut sink = WarehouseSink::new(warehouse.clone(), 2).expect("sink");
    let items = [pricing(1, 10.0), pricing(2, 20.0), pricing(3, 30.0)];

    // When: the same items are written twice
    assert_eq!(sink.write(&items).expect("first write"), 3);
    let once = warehouse.table_counts().expect("counts");
    assert_eq!(sink.write(&items).expect("second write"), 3);

    // Then: row counts and values match a single write
    assert_eq!(warehouse.table_counts().expect("counts"), once);
    assert_eq!(rows_in(&once, ItemTable::PremierItem), 3);
    assert_eq!(
        premier_columns(&warehouse, 2),
        Some(vec![SqlValue::Float(20.0), SqlValue::Null])
    );
}

#[test]
fn when_a_price_changes_the_row_is_updated_in_place() {
    // Given: a stored price
    let (_dir, warehouse) = warehouse();
    let mut sink = WarehouseSink::new(warehouse.clone(), 10).expect("sink");
    sink.write(&[pricing(1, 10.0)]).expect("first write");

    // When: a later harvest reports another price
    sink.write(&[pricing(1, 11.0)]).expect("second write");

    // Then: one row holds the latest price
    let counts = warehouse.table_counts().expect("counts");
    assert_eq!(rows_in(&counts, ItemTable::PremierItem), 1);
    assert_eq!(
        premier_columns(&warehouse, 1),
        Some(vec![SqlValue::Float(11.0), SqlValue::Null])
    );
}

#[test]
fn when_pricing_and_inventory_are_written_they_merge_into_one_row() {
    // Given: pricing already stored for item 1
    let (_dir, warehouse) = warehouse();
    let mut sink = WarehouseSink::new(warehouse.clone(), 10).expect("sink");
    sink.write(&[pricing(1, 10.0)]).expect("pricing");

    // When: inventory for the same item arrives
    sink.write(&[inventory(1, 7)]).expect("inventory");

    // Then: both column sets are present on the single row
    let counts = warehouse.table_counts().expect("counts");
    assert_eq!(rows_in(&counts, ItemTable::PremierItem), 1);
    assert_eq!(
        premier_columns(&warehouse, 1),
        Some(vec![SqlValue::Float(10.0), SqlValue::Int(7)])
    );
}

#[test]
fn when_turn14_item_data_is_written_media_and_fitments_get_their_own_rows() {
    // Given: one API item with two media files and three fitments
    let (_dir, warehouse) = warehouse();
    let mut sink = WarehouseSink::new(warehouse.clone(), 2).expect("sink");
    let media = |url: &str| Turn14Media {
        url: url.to_owned(),
        media_content: Some(String::from("Photo - Primary")),
        height: Some(1000),
        width: Some(800),
    };
    let item = NormalizedItem::Turn14ItemData(Turn14ItemData {
        item_id_in_api: String::from("10030"),
        media: vec![media("https://cdn.test/1.jpg"), media("https://cdn.test/2.jpg")],
        vehicle_ids: vec![1, 2, 3],
    });

    // When: the item is written twice
    assert_eq!(sink.write(std::slice::from_ref(&item)).expect("write"), 5);
    sink.write(&[item]).expect("rewrite");

    // Then: each media file and fitment is one row
    let counts = warehouse.table_counts().expect("counts");
    assert_eq!(rows_in(&counts, ItemTable::Turn14Media), 2);
    assert_eq!(rows_in(&counts, ItemTable::Turn14Fitment), 3);
    assert_eq!(
        warehouse
            .fetch_fields(
                ItemTable::Turn14Media,
                &[
                    ("item_id_in_api", SqlValue::from("10030")),
                    ("url", SqlValue::from("https://cdn.test/2.jpg")),
                ],
                &["height", "width"],
            )
            .expect("lookup"),
        Some(vec![SqlValue::Int(1000), SqlValue::Int(800)])
    );
}

#[test]
fn zero_write_batch_size_is_rejected() {
    let (_dir, warehouse) = warehouse();
    assert!(matches!(
        WarehouseSink::new(warehouse, 0),
        Err(ConfigError::InvalidWriteBatchSize)
    ));
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn when_a_catalog_is_harvested_every_item_lands_in_the_warehouse() {
    // Given: three Premier items registered in the warehouse catalog
    let (_dir, warehouse) = warehouse();
    warehouse
        .register_supplier_items("premier", &[(1, "A1"), (2, "A2"), (3, "A3")])
        .expect("register");
    let catalog = warehouse.supplier_catalog("premier").expect("catalog");
    let connector = Arc::new(PremierConnector::pricing(
        "https://premier.test/api/v5/",
        "key",
        Arc::new(catalog),
    ));
    let http = ScriptedHttp::new(|request, _| {
        Ok(supplyline_core::HttpResponse::ok_json(premier_pricing_body(&request.url)))
    });
    let mut sink = WarehouseSink::new(warehouse.clone(), 2).expect("sink");

    // When: pricing is harvested in batches of two
    let report = Harvester::new(connector, http.clone(), &mut sink, options(2))
        .run()
        .await
        .expect("harvest completes");

    // Then: two requests wrote all three rows
    assert_eq!(report.stop_reason(), PassStop::Exhausted);
    assert_eq!(http.data_calls(), 2);
    assert_eq!(report.items_written(), 3);
    let counts = warehouse.table_counts().expect("counts");
    assert_eq!(rows_in(&counts, ItemTable::PremierItem), 3);
    assert_eq!(
        premier_columns(&warehouse, 3),
        Some(vec![SqlValue::Float(10.0), SqlValue::Null])
    );
}
