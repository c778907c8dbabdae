use supplyline_core::{ConfigError, HarvestError, PersistenceError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Harvest(HarvestError::Config(_)) => 2,
            Self::Harvest(HarvestError::Auth(_))
            | Self::Harvest(HarvestError::AuthenticationExhausted { .. }) => 3,
            Self::Harvest(HarvestError::ProtocolViolation { .. }) => 4,
            Self::Harvest(HarvestError::Persistence(_)) | Self::Warehouse(_) => 5,
            Self::Logging(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

impl From<PersistenceError> for CliError {
    fn from(error: PersistenceError) -> Self {
        Self::Harvest(HarvestError::Persistence(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supplyline_core::{AuthError, Supplier};

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(CliError::from(ConfigError::InvalidBatchSize).exit_code(), 2);
        assert_eq!(
            CliError::from(HarvestError::Auth(AuthError::Transport {
                supplier: Supplier::Premier,
                message: String::from("refused"),
            }))
            .exit_code(),
            3
        );
        assert_eq!(
            CliError::from(HarvestError::AuthenticationExhausted {
                supplier: Supplier::Meyer,
                endpoint: "item_information",
            })
            .exit_code(),
            3
        );
        assert_eq!(
            CliError::from(HarvestError::ProtocolViolation {
                url: String::from("https://api.test"),
                detail: String::from("not an array"),
            })
            .exit_code(),
            4
        );
        assert_eq!(
            CliError::from(PersistenceError::Rejected(String::from("full"))).exit_code(),
            5
        );
        assert_eq!(CliError::Logging(String::from("bad filter")).exit_code(), 10);
    }
}
