use serde::Serialize;
use supplyline_core::{HarvestRunRecord, TableCount, Warehouse};

use crate::cli::StatusArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct StatusResponse {
    db_path: String,
    tables: Vec<TableCount>,
    recent_runs: Vec<HarvestRunRecord>,
}

pub fn run(args: &StatusArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let response = StatusResponse {
        db_path: warehouse.db_path().display().to_string(),
        tables: warehouse.table_counts()?,
        recent_runs: warehouse.recent_runs(args.runs)?,
    };
    Ok(CommandResult::ok(serde_json::to_value(response)?))
}
