//! Per-supplier capability set driven by the shared harvester.

use std::sync::Arc;

use serde_json::Value;

use crate::batch::{BatchSource, Continuation, WorkUnit};
use crate::credential::{Authenticator, Credential};
use crate::error::{ConfigError, MalformedRow};
use crate::http_client::{HttpError, HttpRequest, HttpResponse};
use crate::items::NormalizedItem;
use crate::outcome::{Payload, RequestOutcome};
use crate::source::Supplier;
use crate::throttling::RequestThrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Fixed-size batches of known identifiers.
    Chunked,
    /// Server-supplied `next` references.
    Cursor,
}

/// Retry behavior a connector asks for; callers may tighten it through `HarvestOptions`.
#[derive(Debug, Clone)]
pub struct ConnectorPolicy {
    pub pagination: Pagination,
    /// Push identifiers of failed units into the failure queue for a second pass.
    pub requeue: bool,
    pub timeout_ceiling: Option<u32>,
    pub failure_ceiling: Option<u32>,
    pub throttle: Option<RequestThrottle>,
}

impl ConnectorPolicy {
    pub const fn chunked() -> Self {
        Self {
            pagination: Pagination::Chunked,
            requeue: true,
            timeout_ceiling: None,
            failure_ceiling: None,
            throttle: None,
        }
    }

    pub const fn cursor(timeout_ceiling: u32, failure_ceiling: u32) -> Self {
        Self {
            pagination: Pagination::Cursor,
            requeue: false,
            timeout_ceiling: Some(timeout_ceiling),
            failure_ceiling: Some(failure_ceiling),
            throttle: None,
        }
    }
}

/// One harvestable supplier endpoint.
pub trait Connector: Send + Sync {
    fn supplier(&self) -> Supplier;

    /// Stable endpoint name, e.g. `pricing`.
    fn endpoint(&self) -> &'static str;

    fn base_url(&self) -> &str;

    fn policy(&self) -> ConnectorPolicy;

    fn authenticator(&self) -> Arc<dyn Authenticator>;

    /// Work units of pass one, resuming after `resume` when given.
    fn batch_source(
        &self,
        batch_size: usize,
        resume: Option<&Continuation>,
    ) -> Result<BatchSource, ConfigError>;

    fn build_request(&self, unit: &WorkUnit, credential: &Credential) -> HttpRequest;

    /// Label a response, or the transport failure that replaced it, with exactly one outcome.
    fn classify(&self, response: Result<HttpResponse, HttpError>, url: &str) -> RequestOutcome;

    /// Unit following a successful `previous`; `None` when the connector's source drives itself
    /// or the traversal is over.
    fn next_work_unit(&self, previous: &WorkUnit, payload: &Payload) -> Option<WorkUnit>;

    fn decode(&self, row: &Value) -> Result<NormalizedItem, MalformedRow>;
}
