//! Item sinks: where decoded items go.

use std::collections::BTreeMap;

use supplyline_warehouse::{SqlValue, Warehouse};
use tracing::debug;

use crate::error::{ConfigError, PersistenceError};
use crate::items::NormalizedItem;

/// Default number of rows per warehouse transaction.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 500;

/// Idempotent destination for normalized items.
///
/// Writing the same item twice must leave the stored state as if it was written once.
pub trait ItemSink: Send {
    /// Persist `items`; returns the number of rows written.
    fn write(&mut self, items: &[NormalizedItem]) -> Result<usize, PersistenceError>;
}

/// In-memory sink keyed by row natural key. Later writes merge into earlier ones field by
/// field, the same way the warehouse upsert does.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    rows: BTreeMap<String, BTreeMap<&'static str, SqlValue>>,
    write_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, natural_key: &str) -> Option<&BTreeMap<&'static str, SqlValue>> {
        self.rows.get(natural_key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Number of `write` calls received, including empty ones.
    pub const fn write_calls(&self) -> usize {
        self.write_calls
    }
}

impl ItemSink for MemorySink {
    fn write(&mut self, items: &[NormalizedItem]) -> Result<usize, PersistenceError> {
        self.write_calls += 1;
        let mut written = 0;
        for row in items.iter().flat_map(NormalizedItem::upsert_rows) {
            let stored = self.rows.entry(row.natural_key()).or_default();
            stored.extend(row.fields);
            written += 1;
        }
        Ok(written)
    }
}

/// DuckDB-backed sink. Rows are written in transactions of at most `write_batch_size`
/// rows, independently of how many identifiers a request carried.
#[derive(Clone)]
pub struct WarehouseSink {
    warehouse: Warehouse,
    write_batch_size: usize,
}

impl WarehouseSink {
    pub fn new(warehouse: Warehouse, write_batch_size: usize) -> Result<Self, ConfigError> {
        if write_batch_size == 0 {
            return Err(ConfigError::InvalidWriteBatchSize);
        }
        Ok(Self {
            warehouse,
            write_batch_size,
        })
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

impl ItemSink for WarehouseSink {
    fn write(&mut self, items: &[NormalizedItem]) -> Result<usize, PersistenceError> {
        let rows = items
            .iter()
            .flat_map(NormalizedItem::upsert_rows)
            .collect::<Vec<_>>();

        let mut written = 0;
        for chunk in rows.chunks(self.write_batch_size) {
            written += self.warehouse.upsert_rows(chunk)?;
            debug!(rows = chunk.len(), "wrote item rows");
        }
        Ok(written)
    }
}
