use thiserror::Error;

use crate::source::Supplier;
use supplyline_warehouse::WarehouseError;

/// Pre-flight configuration problems. Raised before any request is issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    #[error("write batch size must be greater than zero")]
    InvalidWriteBatchSize,
    #[error("missing required setting '{name}'")]
    MissingSetting { name: String },
    #[error("invalid value '{value}' for setting '{name}'")]
    InvalidSetting { name: String, value: String },
    #[error("invalid supplier '{value}', expected one of meyer, premier, turn14")]
    InvalidSupplier { value: String },
}

/// Failures of the login call made by the credential store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{supplier} login rejected with status {status}: {body}")]
    Rejected {
        supplier: Supplier,
        status: u16,
        body: String,
    },
    #[error("{supplier} login transport failure: {message}")]
    Transport { supplier: Supplier, message: String },
    #[error("{supplier} login response did not carry a usable token: {detail}")]
    MalformedToken { supplier: Supplier, detail: String },
}

/// Item sink write failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// A single payload row failed validation; only that row is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed row: field '{field}' {reason}")]
pub struct MalformedRow {
    pub field: &'static str,
    pub reason: String,
}

impl MalformedRow {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, "is missing")
    }
}

/// Errors that unwind out of a harvest. Recoverable conditions (timeouts, transient server
/// errors, malformed rows) never appear here.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{supplier}/{endpoint}: authorization still rejected after reauthentication")]
    AuthenticationExhausted {
        supplier: Supplier,
        endpoint: &'static str,
    },

    #[error("protocol violation at {url}: {detail}")]
    ProtocolViolation { url: String, detail: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl HarvestError {
    /// Stable category name used in run logs.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::AuthenticationExhausted { .. } => "authentication_exhausted",
            Self::ProtocolViolation { .. } => "protocol_violation",
            Self::Persistence(_) => "persistence",
        }
    }
}
