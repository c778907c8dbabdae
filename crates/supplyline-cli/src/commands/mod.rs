mod checkpoint;
mod harvest;
mod status;

use serde_json::Value;
use supplyline_core::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    /// The command finished but did not cover everything it was asked to.
    pub degraded: bool,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            degraded: false,
        }
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    /// Process exit status of a command that did not fail: 1 when degraded.
    pub const fn exit_status(&self) -> u8 {
        if self.degraded {
            1
        } else {
            0
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let warehouse = open_warehouse(cli)?;

    match &cli.command {
        Command::Harvest(args) => harvest::run(args, warehouse).await,
        Command::Checkpoint(args) => checkpoint::run(args, &warehouse),
        Command::Status(args) => status::run(args, &warehouse),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let warehouse = match &cli.db {
        Some(path) => Warehouse::open(WarehouseConfig::at(path))?,
        None => Warehouse::open_default()?,
    };
    tracing::debug!(path = %warehouse.db_path().display(), "warehouse opened");
    Ok(warehouse)
}
