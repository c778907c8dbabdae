//! Row model for the idempotent `insert_or_update` contract.

use std::fmt::{Display, Formatter};

use ::duckdb::types::{ToSql, ToSqlOutput, Value as DuckValue};
use serde::Serialize;

/// Tables that accept harvested item rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTable {
    MeyerItem,
    PremierItem,
    Turn14Item,
    Turn14Media,
    Turn14Fitment,
}

impl ItemTable {
    pub const ALL: [Self; 5] = [
        Self::MeyerItem,
        Self::PremierItem,
        Self::Turn14Item,
        Self::Turn14Media,
        Self::Turn14Fitment,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MeyerItem => "meyer_item",
            Self::PremierItem => "premier_item",
            Self::Turn14Item => "turn14_item",
            Self::Turn14Media => "turn14_media",
            Self::Turn14Fitment => "turn14_fitment",
        }
    }

    /// Columns forming the conflict target of each table.
    pub const fn key_columns(self) -> &'static [&'static str] {
        match self {
            Self::MeyerItem | Self::PremierItem | Self::Turn14Item => &["supplier_item_id"],
            Self::Turn14Media => &["item_id_in_api", "url"],
            Self::Turn14Fitment => &["item_id_in_api", "vehicle_id"],
        }
    }
}

impl Display for ItemTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar bound as a query parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub(crate) fn from_duck(value: DuckValue) -> Self {
        match value {
            DuckValue::Null => Self::Null,
            DuckValue::Boolean(value) => Self::Bool(value),
            DuckValue::TinyInt(value) => Self::Int(i64::from(value)),
            DuckValue::SmallInt(value) => Self::Int(i64::from(value)),
            DuckValue::Int(value) => Self::Int(i64::from(value)),
            DuckValue::BigInt(value) => Self::Int(value),
            DuckValue::UTinyInt(value) => Self::Int(i64::from(value)),
            DuckValue::USmallInt(value) => Self::Int(i64::from(value)),
            DuckValue::UInt(value) => Self::Int(i64::from(value)),
            DuckValue::Float(value) => Self::Float(f64::from(value)),
            DuckValue::Double(value) => Self::Float(value),
            DuckValue::Text(value) => Self::Text(value),
            other => Self::Text(format!("{other:?}")),
        }
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ::duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Null => DuckValue::Null,
            Self::Bool(value) => DuckValue::Boolean(*value),
            Self::Int(value) => DuckValue::BigInt(*value),
            Self::Float(value) => DuckValue::Double(*value),
            Self::Text(value) => DuckValue::Text(value.clone()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One `insert_or_update` against an item table.
///
/// `key` values identify the row; `fields` are the only columns written on conflict, so two
/// writers that own disjoint column sets of the same row never overwrite each other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertRow {
    pub table: ItemTable,
    pub key: Vec<(&'static str, SqlValue)>,
    pub fields: Vec<(&'static str, SqlValue)>,
}

impl UpsertRow {
    pub fn new(table: ItemTable) -> Self {
        Self {
            table,
            key: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_key(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.key.push((column, value.into()));
        self
    }

    pub fn with_field(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Stable textual identity of the row, `table:key1|key2`.
    pub fn natural_key(&self) -> String {
        let parts = self
            .key
            .iter()
            .map(|(_, value)| value.to_string())
            .collect::<Vec<_>>();
        format!("{}:{}", self.table, parts.join("|"))
    }
}
