use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_supplier_catalog",
        sql: r#"
CREATE TABLE IF NOT EXISTS supplier_item (
    supplier_item_id BIGINT PRIMARY KEY,
    supplier TEXT NOT NULL,
    supplier_number TEXT NOT NULL,
    available BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (supplier, supplier_number)
);
"#,
    },
    Migration {
        version: "0002_item_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS meyer_item (
    supplier_item_id BIGINT PRIMARY KEY,
    customer_price DOUBLE,
    jobber_price DOUBLE,
    map DOUBLE,
    suggested_retail_price DOUBLE,
    description TEXT,
    upc TEXT,
    height DOUBLE,
    length DOUBLE,
    weight DOUBLE,
    width DOUBLE,
    qty_available BIGINT,
    discontinued BOOLEAN,
    kit BOOLEAN,
    kit_only BOOLEAN,
    ltl_required BOOLEAN,
    oversize BOOLEAN,
    additional_handling_charge BOOLEAN,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS premier_item (
    supplier_item_id BIGINT PRIMARY KEY,
    cost_usd DOUBLE,
    jobber_usd DOUBLE,
    map_usd DOUBLE,
    retail_usd DOUBLE,
    cost_cad DOUBLE,
    jobber_cad DOUBLE,
    map_cad DOUBLE,
    retail_cad DOUBLE,
    qty_ut_1_us BIGINT,
    qty_ky_1_us BIGINT,
    qty_tx_1_us BIGINT,
    qty_ca_1_us BIGINT,
    qty_ab_1_ca BIGINT,
    qty_wa_1_us BIGINT,
    qty_co_1_us BIGINT,
    qty_po_1_ca BIGINT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS turn14_item (
    supplier_item_id BIGINT PRIMARY KEY,
    item_id_in_api TEXT NOT NULL,
    product_name TEXT,
    category TEXT,
    subcategory TEXT,
    dimensions TEXT,
    thumbnail TEXT,
    barcode TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS turn14_media (
    item_id_in_api TEXT NOT NULL,
    url TEXT NOT NULL,
    media_content TEXT,
    height INTEGER,
    width INTEGER,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (item_id_in_api, url)
);

CREATE TABLE IF NOT EXISTS turn14_fitment (
    item_id_in_api TEXT NOT NULL,
    vehicle_id BIGINT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (item_id_in_api, vehicle_id)
);
"#,
    },
    Migration {
        version: "0003_harvest_bookkeeping",
        sql: r#"
CREATE TABLE IF NOT EXISTS harvest_checkpoint (
    supplier TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    kind TEXT NOT NULL,
    position TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (supplier, endpoint)
);

CREATE TABLE IF NOT EXISTS harvest_log (
    run_id TEXT PRIMARY KEY,
    supplier TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    status TEXT NOT NULL,
    requests BIGINT NOT NULL,
    items_written BIGINT NOT NULL,
    malformed_rows BIGINT NOT NULL,
    unresolved BIGINT NOT NULL,
    stop_reason TEXT,
    detail TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        tracing::debug!(version = migration.version, "applying warehouse migration");
        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params![migration.version],
        )?;
    }

    Ok(())
}
