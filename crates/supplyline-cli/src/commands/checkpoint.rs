//! Inspect or drop the stored continuation of one endpoint.

use serde::Serialize;
use supplyline_core::{CheckpointRecord, Target, Warehouse};

use crate::cli::{CheckpointAction, CheckpointArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CheckpointResponse {
    target: Target,
    checkpoint: Option<CheckpointRecord>,
    cleared: bool,
}

pub fn run(args: &CheckpointArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let supplier = args.target.supplier();
    let endpoint = args.target.endpoint();

    let response = match args.action {
        CheckpointAction::Show => CheckpointResponse {
            target: args.target,
            checkpoint: warehouse.load_checkpoint(supplier.as_str(), endpoint)?,
            cleared: false,
        },
        CheckpointAction::Clear => {
            let checkpoint = warehouse.load_checkpoint(supplier.as_str(), endpoint)?;
            let cleared = warehouse.clear_checkpoint(supplier.as_str(), endpoint)?;
            if cleared {
                tracing::info!(%supplier, endpoint, "checkpoint cleared");
            }
            CheckpointResponse {
                target: args.target,
                checkpoint,
                cleared,
            }
        }
    };

    Ok(CommandResult::ok(serde_json::to_value(response)?))
}
