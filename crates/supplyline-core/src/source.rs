use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Suppliers with an API integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplier {
    Meyer,
    Premier,
    Turn14,
}

impl Supplier {
    pub const ALL: [Self; 3] = [Self::Meyer, Self::Premier, Self::Turn14];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meyer => "meyer",
            Self::Premier => "premier",
            Self::Turn14 => "turn14",
        }
    }

    /// Prefix of the environment variables holding this supplier's settings.
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Meyer => "SUPPLYLINE_MEYER",
            Self::Premier => "SUPPLYLINE_PREMIER",
            Self::Turn14 => "SUPPLYLINE_TURN14",
        }
    }
}

impl Display for Supplier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Supplier {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "meyer" => Ok(Self::Meyer),
            "premier" => Ok(Self::Premier),
            "turn14" => Ok(Self::Turn14),
            other => Err(ConfigError::InvalidSupplier {
                value: other.to_owned(),
            }),
        }
    }
}

/// Remote API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }
}
