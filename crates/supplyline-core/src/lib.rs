//! # Supplyline Core
//!
//! Harvesting engine for supplier catalog, pricing and inventory APIs.
//!
//! ## Overview
//!
//! A harvest walks one supplier endpoint from start to finish:
//!
//! - **Credential store** logs in and refreshes the access token once per reauthentication episode
//! - **Batch source** yields fixed-size identifier batches or follows server-supplied page cursors
//! - **Response classifier** (one per connector) labels every response with a [`RequestOutcome`]
//! - **Retry controller** decides between delivering, reauthenticating, skipping and stopping
//! - **Failure queue** collects identifiers of failed batches for a single-identifier second pass
//! - **Item sink** persists decoded items idempotently
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`archive`] | Raw JSON-lines copy of received rows |
//! | [`batch`] | Work units, batch sources, failure queue, continuations |
//! | [`config`] | Harvest options, supplier credentials, base URLs |
//! | [`connector`] | Per-supplier capability trait |
//! | [`connectors`] | Meyer, Premier and Turn14 connectors |
//! | [`controller`] | Retry and reauthentication state machine |
//! | [`credential`] | Credentials, login calls, credential store |
//! | [`error`] | Error taxonomy |
//! | [`harvest`] | The harvest driver and its report |
//! | [`http_client`] | HTTP transport seam |
//! | [`items`] | Normalized supplier items |
//! | [`outcome`] | Classified request outcomes |
//! | [`retry`] | Backoff between failures |
//! | [`sink`] | Item sinks |
//! | [`source`] | Supplier and environment identifiers |
//! | [`throttling`] | Request rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use supplyline_core::{
//!     base_url, Environment, HarvestOptions, Harvester, MemorySink, ReqwestHttpClient,
//!     SupplierCredentials, Target,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let target = Target::Turn14ItemData;
//!     let credentials = SupplierCredentials::from_env(target.supplier())?;
//!     let connector = target.connector(
//!         base_url(target.supplier(), Environment::Sandbox),
//!         &credentials,
//!         Arc::default(),
//!     )?;
//!
//!     let mut sink = MemorySink::new();
//!     let report = Harvester::new(
//!         connector,
//!         Arc::new(ReqwestHttpClient::new()),
//!         &mut sink,
//!         HarvestOptions::default().with_request_limit(3),
//!     )
//!     .run()
//!     .await?;
//!
//!     println!("{} items in {} requests", report.items_written(), report.requests());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Harvester      │────▶│ Credential Store │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Connector       │────▶│ HTTP Client      │
//! │ (source, class.)│     │ (reqwest)        │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Retry Controller│────▶│ Failure Queue    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Item Sink       │
//! │ (DuckDB/memory) │
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - Supplier secrets are read from environment variables only
//! - Credentials and tokens are redacted from `Debug` output and never logged

pub mod archive;
pub mod batch;
pub mod config;
pub mod connector;
pub mod connectors;
pub mod controller;
pub mod credential;
pub mod error;
mod fields;
pub mod harvest;
pub mod http_client;
pub mod items;
pub mod outcome;
pub mod retry;
pub mod sink;
pub mod source;
pub mod throttling;
pub mod timestamp;

// Batch sources and the failure queue
pub use batch::{
    BatchSource, ChunkedIdentifiers, Continuation, CursorSource, FailureQueue, FailureRecord,
    WorkUnit, DEFAULT_BATCH_SIZE,
};

// Configuration
pub use config::{base_url, base_url_with, default_base_url, HarvestOptions, SupplierCredentials};

// Connectors
pub use connector::{Connector, ConnectorPolicy, Pagination};
pub use connectors::{
    MeyerConnector, PremierConnector, PremierEndpoint, Target, Turn14Connector, Turn14Endpoint,
};

// Retry controller
pub use controller::{ControllerState, Decision, PassStop, RetryController, RunState};

// Credentials
pub use credential::{AuthScheme, Authenticator, Credential, CredentialStore};

// Error types
pub use error::{AuthError, ConfigError, HarvestError, MalformedRow, PersistenceError};

// Harvest driver
pub use harvest::{HarvestReport, Harvester, PassKind, PassReport};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient, AUTH_TIMEOUT, DATA_TIMEOUT,
};

// Items
pub use items::{
    Catalog, MeyerItemInformation, NormalizedItem, PremierInventory, PremierPricing, PriceSet,
    Turn14Item, Turn14ItemData, Turn14Media, PREMIER_WAREHOUSES,
};

// Outcomes
pub use outcome::{OutcomeKind, PageEnvelope, Payload, RequestOutcome, ResponseBody};

pub use archive::RowArchive;
pub use retry::Backoff;
pub use sink::{ItemSink, MemorySink, WarehouseSink, DEFAULT_WRITE_BATCH_SIZE};
pub use source::{Environment, Supplier};
pub use throttling::RequestThrottle;
pub use timestamp::UtcDateTime;

// Warehouse (re-exported from supplyline-warehouse)
pub use supplyline_warehouse::{
    CheckpointRecord, HarvestRunRecord, ItemTable, SqlValue, TableCount, UpsertRow, Warehouse,
    WarehouseConfig, WarehouseError,
};
