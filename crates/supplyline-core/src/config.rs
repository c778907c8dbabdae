//! Harvest options, supplier credentials and base URLs.

use std::env;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::batch::{Continuation, DEFAULT_BATCH_SIZE};
use crate::error::ConfigError;
use crate::retry::Backoff;
use crate::sink::DEFAULT_WRITE_BATCH_SIZE;
use crate::source::{Environment, Supplier};

/// Caller-side knobs of one harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOptions {
    /// Identifiers per chunked request.
    pub batch_size: usize,
    /// Rows per sink transaction.
    pub write_batch_size: usize,
    /// Requests allowed per pass; `None` is unbounded.
    pub request_limit: Option<u64>,
    /// Allow the failure queue and pass two when the connector supports them.
    pub requeue: bool,
    /// Overrides the connector's consecutive-timeout ceiling.
    pub timeout_ceiling: Option<u32>,
    /// Overrides the connector's consecutive-failure ceiling.
    pub failure_ceiling: Option<u32>,
    pub backoff: Backoff,
    pub resume: Option<Continuation>,
    /// Overrides the per-call data timeout.
    pub data_timeout: Option<Duration>,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            request_limit: None,
            requeue: true,
            timeout_ceiling: None,
            failure_ceiling: None,
            backoff: Backoff::default(),
            resume: None,
            data_timeout: None,
        }
    }
}

impl HarvestOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_request_limit(mut self, limit: u64) -> Self {
        self.request_limit = Some(limit);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_resume(mut self, resume: Continuation) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn without_requeue(mut self) -> Self {
        self.requeue = false;
        self
    }

    /// Pre-flight checks; nothing is sent when this fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.write_batch_size == 0 {
            return Err(ConfigError::InvalidWriteBatchSize);
        }
        if self.request_limit == Some(0) {
            return Err(invalid("request limit", "0"));
        }
        if self.timeout_ceiling == Some(0) {
            return Err(invalid("timeout ceiling", "0"));
        }
        if self.failure_ceiling == Some(0) {
            return Err(invalid("failure ceiling", "0"));
        }
        if self.data_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(invalid("data timeout", "0s"));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_owned(),
        value: value.to_owned(),
    }
}

/// Login secrets of one supplier.
#[derive(Clone, PartialEq, Eq)]
pub enum SupplierCredentials {
    Meyer { username: String, password: String },
    Premier { api_key: String },
    Turn14 { client_id: String, client_secret: String },
}

impl SupplierCredentials {
    /// Read `SUPPLYLINE_<SUPPLIER>_*` variables.
    pub fn from_env(supplier: Supplier) -> Result<Self, ConfigError> {
        Self::from_lookup(supplier, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        supplier: Supplier,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |suffix: &str| {
            let name = format!("{}_{suffix}", supplier.env_prefix());
            lookup(&name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingSetting { name })
        };

        Ok(match supplier {
            Supplier::Meyer => Self::Meyer {
                username: required("USERNAME")?,
                password: required("PASSWORD")?,
            },
            Supplier::Premier => Self::Premier {
                api_key: required("API_KEY")?,
            },
            Supplier::Turn14 => Self::Turn14 {
                client_id: required("CLIENT_ID")?,
                client_secret: required("CLIENT_SECRET")?,
            },
        })
    }

    pub const fn supplier(&self) -> Supplier {
        match self {
            Self::Meyer { .. } => Supplier::Meyer,
            Self::Premier { .. } => Supplier::Premier,
            Self::Turn14 { .. } => Supplier::Turn14,
        }
    }
}

impl Debug for SupplierCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meyer { username, .. } => f
                .debug_struct("Meyer")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Premier { .. } => f
                .debug_struct("Premier")
                .field("api_key", &"<redacted>")
                .finish(),
            Self::Turn14 { client_id, .. } => f
                .debug_struct("Turn14")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Built-in API root of a supplier environment.
pub const fn default_base_url(supplier: Supplier, environment: Environment) -> &'static str {
    match (supplier, environment) {
        (Supplier::Meyer, Environment::Production) => {
            "https://meyerapi.meyerdistributing.com/http/default/ProdAPI/v2/"
        }
        (Supplier::Meyer, Environment::Sandbox) => {
            "https://meyerapitest.meyerdistributing.com/http/default/TestAPI/v2/"
        }
        (Supplier::Premier, Environment::Production) => "https://api.premierwd.com/api/v5/",
        (Supplier::Premier, Environment::Sandbox) => "https://api-test.premierwd.com/api/v5/",
        (Supplier::Turn14, Environment::Production) => "https://api.turn14.com",
        (Supplier::Turn14, Environment::Sandbox) => "https://apitest.turn14.com",
    }
}

/// `SUPPLYLINE_<SUPPLIER>_BASE_URL` when set, the built-in root otherwise.
pub fn base_url(supplier: Supplier, environment: Environment) -> String {
    base_url_with(supplier, environment, |name| env::var(name).ok())
}

pub fn base_url_with(
    supplier: Supplier,
    environment: Environment,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    lookup(&format!("{}_BASE_URL", supplier.env_prefix()))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default_base_url(supplier, environment).to_owned())
}
