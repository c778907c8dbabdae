mod meyer;
mod premier;
mod turn14;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

pub use meyer::MeyerConnector;
pub use premier::{PremierConnector, PremierEndpoint};
pub use turn14::{Turn14Connector, Turn14Endpoint};

use crate::batch::{BatchSource, ChunkedIdentifiers, Continuation, CursorSource};
use crate::config::SupplierCredentials;
use crate::connector::Connector;
use crate::error::ConfigError;
use crate::items::Catalog;
use crate::source::Supplier;

/// Every harvestable supplier endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    MeyerItemInformation,
    PremierPricing,
    PremierInventory,
    Turn14Items,
    Turn14ItemData,
}

impl Target {
    pub const ALL: [Self; 5] = [
        Self::MeyerItemInformation,
        Self::PremierPricing,
        Self::PremierInventory,
        Self::Turn14Items,
        Self::Turn14ItemData,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MeyerItemInformation => "meyer-item-information",
            Self::PremierPricing => "premier-pricing",
            Self::PremierInventory => "premier-inventory",
            Self::Turn14Items => "turn14-items",
            Self::Turn14ItemData => "turn14-item-data",
        }
    }

    pub const fn supplier(self) -> Supplier {
        match self {
            Self::MeyerItemInformation => Supplier::Meyer,
            Self::PremierPricing | Self::PremierInventory => Supplier::Premier,
            Self::Turn14Items | Self::Turn14ItemData => Supplier::Turn14,
        }
    }

    /// Endpoint name as reported by the connector and stored in checkpoints.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::MeyerItemInformation => meyer::ITEM_INFORMATION,
            Self::PremierPricing => PremierEndpoint::Pricing.as_str(),
            Self::PremierInventory => PremierEndpoint::Inventory.as_str(),
            Self::Turn14Items => Turn14Endpoint::Items.as_str(),
            Self::Turn14ItemData => Turn14Endpoint::ItemData.as_str(),
        }
    }

    /// Whether decoding matches rows against the supplier catalog.
    pub const fn needs_catalog(self) -> bool {
        !matches!(self, Self::Turn14ItemData)
    }

    pub fn connector(
        self,
        base_url: impl Into<String>,
        credentials: &SupplierCredentials,
        catalog: Arc<Catalog>,
    ) -> Result<Arc<dyn Connector>, ConfigError> {
        let base_url = base_url.into();
        let connector: Arc<dyn Connector> = match (self, credentials) {
            (Self::MeyerItemInformation, SupplierCredentials::Meyer { username, password }) => {
                Arc::new(MeyerConnector::item_information(
                    base_url,
                    username.clone(),
                    password.clone(),
                    catalog,
                ))
            }
            (Self::PremierPricing, SupplierCredentials::Premier { api_key }) => Arc::new(
                PremierConnector::pricing(base_url, api_key.clone(), catalog),
            ),
            (Self::PremierInventory, SupplierCredentials::Premier { api_key }) => Arc::new(
                PremierConnector::inventory(base_url, api_key.clone(), catalog),
            ),
            (
                Self::Turn14Items,
                SupplierCredentials::Turn14 {
                    client_id,
                    client_secret,
                },
            ) => Arc::new(Turn14Connector::items(
                base_url,
                client_id.clone(),
                client_secret.clone(),
                catalog,
            )),
            (
                Self::Turn14ItemData,
                SupplierCredentials::Turn14 {
                    client_id,
                    client_secret,
                },
            ) => Arc::new(Turn14Connector::item_data(
                base_url,
                client_id.clone(),
                client_secret.clone(),
            )),
            (target, credentials) => {
                return Err(ConfigError::InvalidSetting {
                    name: format!("{target} credentials"),
                    value: credentials.supplier().to_string(),
                })
            }
        };
        Ok(connector)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|target| target.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: String::from("target"),
                value: value.to_owned(),
            })
    }
}

/// Chunked source over the catalog's supplier numbers.
pub(crate) fn chunked_source(
    catalog: &Catalog,
    batch_size: usize,
    resume: Option<&Continuation>,
) -> Result<BatchSource, ConfigError> {
    let chunks = ChunkedIdentifiers::new(catalog.keys().cloned(), batch_size)?;
    let chunks = match resume {
        None => chunks,
        Some(Continuation::AfterIdentifier(marker)) => chunks.resume_after(marker),
        Some(other @ Continuation::NextPage(_)) => return Err(resume_mismatch(other)),
    };
    Ok(BatchSource::Chunked(chunks))
}

pub(crate) fn cursor_source(resume: Option<&Continuation>) -> Result<BatchSource, ConfigError> {
    match resume {
        None => Ok(BatchSource::Cursor(CursorSource::new())),
        Some(Continuation::NextPage(path)) => {
            Ok(BatchSource::Cursor(CursorSource::starting_at(path.clone())))
        }
        Some(other @ Continuation::AfterIdentifier(_)) => Err(resume_mismatch(other)),
    }
}

fn resume_mismatch(continuation: &Continuation) -> ConfigError {
    ConfigError::InvalidSetting {
        name: String::from("resume"),
        value: format!("{}={}", continuation.kind(), continuation.position()),
    }
}
