//! Run one harvest and record it in the warehouse.

use std::sync::Arc;

use serde::Serialize;
use supplyline_core::{
    base_url, CheckpointRecord, Continuation, Environment, HarvestError, HarvestOptions,
    HarvestReport, HarvestRunRecord, Harvester, HttpClient, ItemSink, MemorySink, PassStop,
    ReqwestHttpClient, RowArchive, Supplier, SupplierCredentials, Target, UtcDateTime, Warehouse,
    WarehouseSink,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::HarvestArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct HarvestResponse {
    run_id: String,
    target: Target,
    dry_run: bool,
    /// Items held by the in-memory sink of a dry run.
    items_held: Option<usize>,
    report: HarvestReport,
}

/// Supplier-facing side of a harvest: where to connect, as whom, and over which transport.
pub struct Transport {
    pub credentials: SupplierCredentials,
    pub base_url: String,
    pub http: Arc<dyn HttpClient>,
}

impl Transport {
    /// Credentials and base URL from the environment, reqwest as the client.
    pub fn from_env(supplier: Supplier, environment: Environment) -> Result<Self, CliError> {
        Ok(Self {
            credentials: SupplierCredentials::from_env(supplier)?,
            base_url: base_url(supplier, environment),
            http: Arc::new(ReqwestHttpClient::new()),
        })
    }
}

pub async fn run(args: &HarvestArgs, warehouse: Warehouse) -> Result<CommandResult, CliError> {
    let environment = if args.sandbox {
        Environment::Sandbox
    } else {
        Environment::Production
    };
    let transport = Transport::from_env(args.target.supplier(), environment)?;
    info!(harvest = %args.target, ?environment, "using supplier environment");
    execute(args, &warehouse, transport).await
}

/// Run one harvest over `transport` and record the outcome in `warehouse` (unless dry).
pub async fn execute(
    args: &HarvestArgs,
    warehouse: &Warehouse,
    transport: Transport,
) -> Result<CommandResult, CliError> {
    let run_id = Uuid::new_v4().to_string();
    let target = args.target;
    let supplier = target.supplier();
    let endpoint = target.endpoint();
    let started_at = UtcDateTime::now();

    let options = harvest_options(args, warehouse)?;

    let catalog = if target.needs_catalog() {
        let catalog = warehouse.supplier_catalog(supplier.as_str())?;
        if catalog.is_empty() {
            warn!(%supplier, "supplier catalog is empty; nothing to harvest");
        }
        catalog
    } else {
        Default::default()
    };

    let connector = target.connector(transport.base_url, &transport.credentials, Arc::new(catalog))?;

    info!(run_id = run_id.as_str(), harvest = %target, dry_run = args.dry_run, "harvest requested");

    let mut memory = MemorySink::new();
    let mut stored;
    let sink: &mut dyn ItemSink = if args.dry_run {
        &mut memory
    } else {
        stored = WarehouseSink::new(warehouse.clone(), options.write_batch_size)?;
        &mut stored
    };

    let mut harvester = Harvester::new(connector, transport.http, sink, options);
    if let Some(dir) = &args.backup_dir {
        harvester = harvester.with_archive(RowArchive::create(dir, supplier, endpoint)?);
    }

    let report = match harvester.run().await {
        Ok(report) => report,
        Err(error) => {
            if !args.dry_run {
                record_failure(warehouse, &run_id, target, started_at, &error);
            }
            return Err(error.into());
        }
    };

    if !args.dry_run {
        warehouse.record_run(&run_record(&run_id, &report))?;
        match &report.checkpoint {
            Some(checkpoint) => {
                warehouse.save_checkpoint(
                    supplier.as_str(),
                    endpoint,
                    &CheckpointRecord {
                        kind: checkpoint.kind().to_owned(),
                        position: checkpoint.position().to_owned(),
                    },
                )?;
                info!(%supplier, endpoint, position = checkpoint.position(), "checkpoint saved");
            }
            None if report.stop_reason() == PassStop::Exhausted => {
                warehouse.clear_checkpoint(supplier.as_str(), endpoint)?;
            }
            None => {}
        }
    }

    let degraded = report.is_degraded() || !report.unresolved.is_empty();
    let response = HarvestResponse {
        run_id,
        target,
        dry_run: args.dry_run,
        items_held: args.dry_run.then(|| memory.len()),
        report,
    };
    Ok(CommandResult::ok(serde_json::to_value(response)?).with_degraded(degraded))
}

fn harvest_options(args: &HarvestArgs, warehouse: &Warehouse) -> Result<HarvestOptions, CliError> {
    let mut options = HarvestOptions::default();
    if let Some(batch_size) = args.batch_size {
        options = options.with_batch_size(batch_size);
    }
    if let Some(write_batch_size) = args.write_batch_size {
        options.write_batch_size = write_batch_size;
    }
    if let Some(limit) = args.limit {
        options = options.with_request_limit(limit);
    }
    if args.no_requeue {
        options = options.without_requeue();
    }
    if args.resume {
        let supplier = args.target.supplier();
        match warehouse.load_checkpoint(supplier.as_str(), args.target.endpoint())? {
            Some(record) => {
                let continuation = Continuation::from_parts(&record.kind, record.position)?;
                info!(%supplier, position = continuation.position(), "resuming from checkpoint");
                options = options.with_resume(continuation);
            }
            None => warn!(harvest = %args.target, "no checkpoint stored; starting from the beginning"),
        }
    }
    options.validate()?;
    Ok(options)
}

fn run_record(run_id: &str, report: &HarvestReport) -> HarvestRunRecord {
    HarvestRunRecord {
        run_id: run_id.to_owned(),
        supplier: report.supplier.as_str().to_owned(),
        endpoint: report.endpoint.to_owned(),
        status: String::from(if report.is_degraded() {
            "degraded"
        } else {
            "completed"
        }),
        requests: report.requests(),
        items_written: report.items_written(),
        malformed_rows: report.malformed_rows(),
        unresolved: report.unresolved.len() as u64,
        stop_reason: Some(report.stop_reason().as_str().to_owned()),
        detail: None,
        started_at: report.started_at.format_rfc3339(),
        finished_at: report.finished_at.format_rfc3339(),
    }
}

fn record_failure(
    warehouse: &Warehouse,
    run_id: &str,
    target: Target,
    started_at: UtcDateTime,
    error: &HarvestError,
) {
    let record = HarvestRunRecord {
        run_id: run_id.to_owned(),
        supplier: target.supplier().as_str().to_owned(),
        endpoint: target.endpoint().to_owned(),
        status: format!("failed:{}", error.category()),
        requests: 0,
        items_written: 0,
        malformed_rows: 0,
        unresolved: 0,
        stop_reason: None,
        detail: Some(error.to_string()),
        started_at: started_at.format_rfc3339(),
        finished_at: UtcDateTime::now().format_rfc3339(),
    };
    if let Err(log_error) = warehouse.record_run(&record) {
        warn!(error = %log_error, "failed to record harvest run");
    }
}
