//! CLI argument definitions for supplyline.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest` | Harvest one supplier endpoint into the warehouse |
//! | `checkpoint` | Show or clear the stored resume position of an endpoint |
//! | `status` | Table row counts and recent harvest runs |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$SUPPLYLINE_HOME/warehouse.duckdb` | Warehouse database file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `RUST_LOG` or `info` | Log filter for stderr |
//!
//! # Examples
//!
//! ```bash
//! # Harvest Premier pricing for the whole catalog
//! supplyline harvest premier-pricing
//!
//! # Try the Turn14 sandbox, three pages only, without touching the warehouse
//! supplyline harvest turn14-items --sandbox --limit 3 --dry-run --pretty
//!
//! # Continue an interrupted Meyer harvest
//! supplyline harvest meyer-item-information --resume
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use supplyline_core::Target;

/// Supplier catalog, pricing and inventory harvester.
#[derive(Debug, Parser)]
#[command(
    name = "supplyline",
    author,
    version,
    about = "Harvest supplier catalog, pricing and inventory APIs",
    long_about = "supplyline pulls item data from supplier APIs (Meyer, Premier, Turn14) and \
upserts it into a local DuckDB warehouse.\n\
\n\
Supplier secrets are read from SUPPLYLINE_<SUPPLIER>_* environment variables.\n\
\n\
Use 'supplyline <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter (e.g. `debug`, `supplyline_core=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Harvest one supplier endpoint.
    ///
    /// # Examples
    ///
    ///   supplyline harvest premier-inventory
    ///   supplyline harvest meyer-item-information --batch-size 20 --limit 100
    Harvest(HarvestArgs),

    /// Show or clear the stored continuation of an endpoint.
    Checkpoint(CheckpointArgs),

    /// Row counts per item table and the most recent harvest runs.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct HarvestArgs {
    /// Supplier endpoint to harvest.
    #[arg(value_parser = parse_target)]
    pub target: Target,

    /// Use the supplier's test environment.
    #[arg(long, default_value_t = false)]
    pub sandbox: bool,

    /// Identifiers per request for chunked endpoints.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Rows per warehouse transaction.
    #[arg(long)]
    pub write_batch_size: Option<usize>,

    /// Maximum requests per pass.
    #[arg(long)]
    pub limit: Option<u64>,

    /// Drop failed identifiers instead of retrying them in a second pass.
    #[arg(long, default_value_t = false)]
    pub no_requeue: bool,

    /// Continue from the stored checkpoint of this endpoint.
    #[arg(long, default_value_t = false)]
    pub resume: bool,

    /// Decode and count items without writing them to the warehouse.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Also write every received row to a JSON-lines file in this directory.
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckpointArgs {
    #[arg(value_enum)]
    pub action: CheckpointAction,

    #[arg(value_parser = parse_target)]
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckpointAction {
    Show,
    Clear,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Number of recent runs to list.
    #[arg(long, default_value_t = 10)]
    pub runs: usize,
}

fn parse_target(value: &str) -> Result<Target, String> {
    value.parse::<Target>().map_err(|_| {
        let known = Target::ALL.map(Target::as_str).join(", ");
        format!("unknown target '{value}', expected one of {known}")
    })
}
