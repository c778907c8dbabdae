//! # Supplyline Warehouse
//!
//! DuckDB-backed persistence for harvested supplier items.
//!
//! The harvesting engine only ever talks to this crate through an idempotent
//! `insert_or_update` contract ([`Warehouse::upsert_rows`]): every row names its table, its
//! key columns and the columns it owns. Re-delivering the same row leaves the stored state
//! unchanged, and rows that own disjoint columns of the same record (Premier pricing and
//! Premier inventory) merge instead of clobbering each other.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `supplier_item` | Catalog of known supplier numbers and their internal ids |
//! | `meyer_item` | Meyer item information |
//! | `premier_item` | Premier pricing and per-warehouse inventory |
//! | `turn14_item` | Turn14 item attributes |
//! | `turn14_media` | Turn14 media files, one row per distinct URL |
//! | `turn14_fitment` | Turn14 vehicle fitments |
//! | `harvest_checkpoint` | Continuation position of an interrupted harvest |
//! | `harvest_log` | One row per harvest run |
//!
//! ## Security
//!
//! Values are always bound as parameters. Table and column names come from [`ItemTable`] and
//! static column lists and are checked against a conservative identifier pattern before they
//! are spliced into SQL.

pub mod duckdb;
pub mod migrations;
pub mod rows;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{params, Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{ConnectionPool, PooledConnection};
pub use rows::{ItemTable, SqlValue, UpsertRow};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error while preparing the database directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row that cannot be turned into a valid statement.
    #[error("invalid row for {table}: {reason}")]
    InvalidRow { table: ItemTable, reason: String },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for supplyline data.
    pub supplyline_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connection handles kept for reuse.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let supplyline_home = resolve_supplyline_home();
        let db_path = supplyline_home.join("warehouse.duckdb");
        Self {
            supplyline_home,
            db_path,
            max_pool_size: 2,
        }
    }
}

impl WarehouseConfig {
    /// Configuration for an explicit database file.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let supplyline_home = db_path
            .parent()
            .map_or_else(resolve_supplyline_home, Path::to_path_buf);
        Self {
            supplyline_home,
            db_path,
            ..Self::default()
        }
    }
}

/// Persisted continuation position of a harvest that stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointRecord {
    /// Position flavour, `after_identifier` or `next_page`.
    pub kind: String,
    pub position: String,
}

/// Summary of one harvest run as stored in `harvest_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestRunRecord {
    pub run_id: String,
    pub supplier: String,
    pub endpoint: String,
    pub status: String,
    pub requests: u64,
    pub items_written: u64,
    pub malformed_rows: u64,
    pub unresolved: u64,
    pub stop_reason: Option<String>,
    pub detail: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

/// Row count of one item table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: ItemTable,
    pub rows: u64,
}

/// DuckDB warehouse handle.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open the warehouse at the default location (`$SUPPLYLINE_HOME/warehouse.duckdb`).
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration and apply pending migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Insert or update every row inside one transaction.
    ///
    /// Returns the number of rows applied. Either all rows are applied or none are.
    pub fn upsert_rows(&self, rows: &[UpsertRow]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statements = rows
            .iter()
            .map(upsert_statement)
            .collect::<Result<Vec<_>, _>>()?;

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for (row, sql) in rows.iter().zip(&statements) {
                let params = row
                    .key
                    .iter()
                    .chain(&row.fields)
                    .map(|(_, value)| value as &dyn ToSql)
                    .collect::<Vec<_>>();
                let mut statement = connection.prepare_cached(sql)?;
                statement.execute(params.as_slice())?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Register (or re-activate) catalog entries for a supplier.
    pub fn register_supplier_items(
        &self,
        supplier: &str,
        items: &[(i64, &str)],
    ) -> Result<usize, WarehouseError> {
        if items.is_empty() {
            return Ok(0);
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare_cached(
                "INSERT INTO supplier_item (supplier_item_id, supplier, supplier_number, available) \
                 VALUES (?, ?, ?, TRUE) \
                 ON CONFLICT (supplier_item_id) DO UPDATE SET \
                 supplier = excluded.supplier, \
                 supplier_number = excluded.supplier_number, \
                 available = TRUE, \
                 updated_at = now()",
            )?;
            for (supplier_item_id, number) in items {
                statement.execute(params![supplier_item_id, supplier, number])?;
            }
            Ok(items.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Map of supplier number to internal `supplier_item_id` for available items.
    pub fn supplier_catalog(&self, supplier: &str) -> Result<BTreeMap<String, i64>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT supplier_number, supplier_item_id FROM supplier_item \
             WHERE supplier = ? AND available = TRUE",
        )?;
        let rows = statement.query_map(params![supplier], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut catalog = BTreeMap::new();
        for row in rows {
            let (number, id) = row?;
            catalog.insert(number, id);
        }
        Ok(catalog)
    }

    pub fn load_checkpoint(
        &self,
        supplier: &str,
        endpoint: &str,
    ) -> Result<Option<CheckpointRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT kind, position FROM harvest_checkpoint WHERE supplier = ? AND endpoint = ?",
        )?;
        let mut rows = statement.query(params![supplier, endpoint])?;
        match rows.next()? {
            Some(row) => Ok(Some(CheckpointRecord {
                kind: row.get(0)?,
                position: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    pub fn save_checkpoint(
        &self,
        supplier: &str,
        endpoint: &str,
        checkpoint: &CheckpointRecord,
    ) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute(
            "INSERT INTO harvest_checkpoint (supplier, endpoint, kind, position) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (supplier, endpoint) DO UPDATE SET \
             kind = excluded.kind, \
             position = excluded.position, \
             updated_at = now()",
            params![supplier, endpoint, checkpoint.kind, checkpoint.position],
        )?;
        Ok(())
    }

    /// Remove a stored checkpoint. Returns whether one existed.
    pub fn clear_checkpoint(&self, supplier: &str, endpoint: &str) -> Result<bool, WarehouseError> {
        let connection = self.pool.acquire()?;
        let removed = connection.execute(
            "DELETE FROM harvest_checkpoint WHERE supplier = ? AND endpoint = ?",
            params![supplier, endpoint],
        )?;
        Ok(removed > 0)
    }

    pub fn record_run(&self, run: &HarvestRunRecord) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        let params: [&dyn ToSql; 12] = [
            &run.run_id,
            &run.supplier,
            &run.endpoint,
            &run.status,
            &clamp_count(run.requests),
            &clamp_count(run.items_written),
            &clamp_count(run.malformed_rows),
            &clamp_count(run.unresolved),
            &run.stop_reason,
            &run.detail,
            &run.started_at,
            &run.finished_at,
        ];
        connection.execute(
            "INSERT INTO harvest_log \
             (run_id, supplier, endpoint, status, requests, items_written, malformed_rows, \
              unresolved, stop_reason, detail, started_at, finished_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Most recent harvest runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<HarvestRunRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT run_id, supplier, endpoint, status, requests, items_written, malformed_rows, \
             unresolved, stop_reason, detail, started_at, finished_at \
             FROM harvest_log ORDER BY recorded_at DESC, finished_at DESC LIMIT ?",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement.query_map(params![limit], |row| {
            Ok(HarvestRunRecord {
                run_id: row.get(0)?,
                supplier: row.get(1)?,
                endpoint: row.get(2)?,
                status: row.get(3)?,
                requests: count_from_sql(row.get(4)?),
                items_written: count_from_sql(row.get(5)?),
                malformed_rows: count_from_sql(row.get(6)?),
                unresolved: count_from_sql(row.get(7)?),
                stop_reason: row.get(8)?,
                detail: row.get(9)?,
                started_at: row.get(10)?,
                finished_at: row.get(11)?,
            })
        })?;

        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    pub fn table_counts(&self) -> Result<Vec<TableCount>, WarehouseError> {
        let connection = self.pool.acquire()?;
        ItemTable::ALL
            .iter()
            .map(|table| -> Result<TableCount, WarehouseError> {
                let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
                let rows: i64 = connection.query_row(&sql, [], |row| row.get(0))?;
                Ok(TableCount {
                    table: *table,
                    rows: count_from_sql(rows),
                })
            })
            .collect()
    }

    /// Read selected columns of one item row identified by its key.
    pub fn fetch_fields(
        &self,
        table: ItemTable,
        key: &[(&str, SqlValue)],
        columns: &[&str],
    ) -> Result<Option<Vec<SqlValue>>, WarehouseError> {
        for column in key.iter().map(|(column, _)| *column).chain(columns.iter().copied()) {
            ensure_identifier(table, column)?;
        }
        if key.is_empty() || columns.is_empty() {
            return Err(WarehouseError::InvalidRow {
                table,
                reason: String::from("lookup requires key and columns"),
            });
        }

        let predicate = key
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {predicate}",
            columns.join(", "),
            table.as_str()
        );

        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(&sql)?;
        let params = key
            .iter()
            .map(|(_, value)| value as &dyn ToSql)
            .collect::<Vec<_>>();
        let mut rows = statement.query(params.as_slice())?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            let value: DuckValue = row.get(index)?;
            values.push(SqlValue::from_duck(value));
        }
        Ok(Some(values))
    }
}

/// Build the `INSERT ... ON CONFLICT` statement for a row.
fn upsert_statement(row: &UpsertRow) -> Result<String, WarehouseError> {
    let table = row.table;
    let expected_key = table.key_columns();
    let key_columns = row.key.iter().map(|(column, _)| *column).collect::<Vec<_>>();
    if key_columns.as_slice() != expected_key {
        return Err(WarehouseError::InvalidRow {
            table,
            reason: format!(
                "key columns {key_columns:?} do not match {expected_key:?}"
            ),
        });
    }
    if let Some((column, _)) = row.key.iter().find(|(_, value)| value.is_null()) {
        return Err(WarehouseError::InvalidRow {
            table,
            reason: format!("key column '{column}' is null"),
        });
    }

    let field_columns = row.fields.iter().map(|(column, _)| *column).collect::<Vec<_>>();
    for column in key_columns.iter().chain(&field_columns) {
        ensure_identifier(table, column)?;
    }

    let all_columns = key_columns
        .iter()
        .chain(&field_columns)
        .copied()
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; all_columns.len()].join(", ");
    let conflict_target = key_columns.join(", ");

    let action = if field_columns.is_empty() {
        String::from("DO NOTHING")
    } else {
        let assignments = field_columns
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {assignments}, updated_at = now()")
    };

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT ({conflict_target}) {action}",
        table.as_str(),
        all_columns.join(", "),
    ))
}

fn ensure_identifier(table: ItemTable, column: &str) -> Result<(), WarehouseError> {
    let valid = !column.is_empty()
        && column
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
        && !column.starts_with(|ch: char| ch.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidRow {
            table,
            reason: format!("'{column}' is not a valid column name"),
        })
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn clamp_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn resolve_supplyline_home() -> PathBuf {
    if let Some(path) = env::var_os("SUPPLYLINE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".supplyline");
    }

    PathBuf::from(".supplyline")
}
