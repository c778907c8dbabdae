//! The harvest driver.
//!
//! A [`Harvester`] pulls work units from the connector's batch source, sends one request at a
//! time, lets the connector classify the response and acts on the [`RetryController`]'s
//! decision. Chunked connectors with requeue enabled get a second pass over the failure
//! queue, one identifier per request, once the first pass has run to exhaustion.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::RowArchive;
use crate::batch::{BatchSource, Continuation, FailureQueue, WorkUnit};
use crate::config::HarvestOptions;
use crate::connector::{Connector, Pagination};
use crate::controller::{Decision, PassStop, RetryController, RunState};
use crate::credential::{Credential, CredentialStore};
use crate::error::HarvestError;
use crate::http_client::HttpClient;
use crate::outcome::{Payload, RequestOutcome};
use crate::sink::ItemSink;
use crate::source::Supplier;
use crate::throttling::RequestThrottle;
use crate::timestamp::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Traversal of the connector's batch source.
    Initial,
    /// Single-identifier retry of the failure queue.
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: PassKind,
    pub requests: u64,
    pub units_delivered: u64,
    pub units_empty: u64,
    pub units_failed: u64,
    pub items_written: u64,
    /// Sink rows; one item can span several rows.
    pub rows_written: u64,
    pub malformed_rows: u64,
    pub reauthentications: u32,
    pub stop: PassStop,
}

impl PassReport {
    fn new(pass: PassKind) -> Self {
        Self {
            pass,
            requests: 0,
            units_delivered: 0,
            units_empty: 0,
            units_failed: 0,
            items_written: 0,
            rows_written: 0,
            malformed_rows: 0,
            reauthentications: 0,
            stop: PassStop::Exhausted,
        }
    }
}

/// Summary of one harvest, returned by [`Harvester::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub supplier: Supplier,
    pub endpoint: &'static str,
    pub passes: Vec<PassReport>,
    /// Identifiers that failed in pass two, or were still queued when pass two did not run.
    pub unresolved: Vec<String>,
    /// Where to resume when the first pass stopped early.
    pub checkpoint: Option<Continuation>,
    pub logins: u32,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub elapsed_ms: u64,
}

impl HarvestReport {
    pub fn requests(&self) -> u64 {
        self.passes.iter().map(|pass| pass.requests).sum()
    }

    pub fn items_written(&self) -> u64 {
        self.passes.iter().map(|pass| pass.items_written).sum()
    }

    pub fn malformed_rows(&self) -> u64 {
        self.passes.iter().map(|pass| pass.malformed_rows).sum()
    }

    /// Stop reason of the first pass.
    pub fn stop_reason(&self) -> PassStop {
        self.passes
            .first()
            .map_or(PassStop::Exhausted, |pass| pass.stop)
    }

    pub fn is_degraded(&self) -> bool {
        self.passes.iter().any(|pass| pass.stop.is_degraded())
    }
}

/// Result of one pass before it is folded into the report.
struct PassOutcome {
    report: PassReport,
    /// Failed identifiers that were not queued.
    dropped: Vec<String>,
    /// Identifiers a requeued pass never got to.
    leftover: Vec<String>,
    resume: Option<Continuation>,
}

/// Drives one connector to completion against one sink.
pub struct Harvester<'a> {
    connector: Arc<dyn Connector>,
    http: Arc<dyn HttpClient>,
    credentials: CredentialStore,
    sink: &'a mut dyn ItemSink,
    options: HarvestOptions,
    archive: Option<RowArchive>,
}

impl<'a> Harvester<'a> {
    pub fn new(
        connector: Arc<dyn Connector>,
        http: Arc<dyn HttpClient>,
        sink: &'a mut dyn ItemSink,
        options: HarvestOptions,
    ) -> Self {
        let credentials = CredentialStore::new(
            Arc::clone(&http),
            connector.authenticator(),
            connector.base_url(),
        );
        Self {
            connector,
            http,
            credentials,
            sink,
            options,
            archive: None,
        }
    }

    /// Copy every received payload row into `archive` before decoding.
    pub fn with_archive(mut self, archive: RowArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn run(mut self) -> Result<HarvestReport, HarvestError> {
        let started_at = UtcDateTime::now();
        let clock = Instant::now();
        let supplier = self.connector.supplier();
        let endpoint = self.connector.endpoint();

        self.options.validate()?;
        let policy = self.connector.policy();
        let requeue = self.options.requeue
            && policy.requeue
            && policy.pagination == Pagination::Chunked;
        let controller = RetryController::new(
            self.options.timeout_ceiling.or(policy.timeout_ceiling),
            self.options.failure_ceiling.or(policy.failure_ceiling),
            self.options.request_limit,
        );
        let source = self
            .connector
            .batch_source(self.options.batch_size, self.options.resume.as_ref())?;

        info!(
            %supplier,
            endpoint,
            batch_size = self.options.batch_size,
            requeue,
            resume = ?self.options.resume,
            "starting harvest"
        );
        self.credentials.acquire().await?;

        let throttle = policy.throttle;
        let mut queue = FailureQueue::new();
        let first = self
            .run_pass(
                PassKind::Initial,
                source,
                &controller,
                throttle.as_ref(),
                requeue.then_some(&mut queue),
            )
            .await?;

        let mut passes = vec![first.report];
        let mut unresolved = first.dropped;
        let checkpoint = first.resume;

        if passes[0].stop == PassStop::Exhausted && !queue.is_empty() {
            info!(%supplier, endpoint, queued = queue.len(), "retrying failed identifiers one by one");
            let second = self
                .run_pass(
                    PassKind::Retry,
                    queue.drain_into_source(),
                    &controller,
                    throttle.as_ref(),
                    None,
                )
                .await?;
            unresolved.extend(second.dropped);
            unresolved.extend(second.leftover);
            passes.push(second.report);
        } else if !queue.is_empty() {
            warn!(
                %supplier,
                endpoint,
                queued = queue.len(),
                "first pass stopped early; failed identifiers left unresolved"
            );
            unresolved.extend(queue.identifiers());
        }

        if let Some(archive) = self.archive.take() {
            match archive.finish() {
                Ok(path) => info!(path = %path.display(), "raw rows archived"),
                Err(error) => warn!(%error, "failed to flush row archive"),
            }
        }

        let report = HarvestReport {
            supplier,
            endpoint,
            passes,
            unresolved,
            checkpoint,
            logins: self.credentials.logins(),
            started_at,
            finished_at: UtcDateTime::now(),
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            %supplier,
            endpoint,
            requests = report.requests(),
            items = report.items_written(),
            unresolved = report.unresolved.len(),
            stop = report.stop_reason().as_str(),
            "harvest finished"
        );
        Ok(report)
    }

    async fn run_pass(
        &mut self,
        pass: PassKind,
        mut source: BatchSource,
        controller: &RetryController,
        throttle: Option<&RequestThrottle>,
        mut queue: Option<&mut FailureQueue>,
    ) -> Result<PassOutcome, HarvestError> {
        let supplier = self.connector.supplier();
        let endpoint = self.connector.endpoint();
        let cursor = source.is_cursor();

        let mut report = PassReport::new(pass);
        let mut run = RunState::new();
        let mut dropped = Vec::new();
        let mut pending: Option<WorkUnit> = None;
        let mut last_settled: Option<String> = None;
        let mut failure_streak = 0_u32;

        let (stop, interrupted) = loop {
            let unit = match pending.take() {
                Some(unit) => unit,
                None => match source.next_unit() {
                    Some(unit) => {
                        run.begin_unit();
                        unit
                    }
                    None => break (PassStop::Exhausted, None),
                },
            };

            if !controller.admit(&mut run) {
                info!(%supplier, endpoint, requests = report.requests, "request limit reached");
                break (PassStop::RequestLimit, Some(unit));
            }
            report.requests += 1;

            if let Some(throttle) = throttle {
                throttle.ready().await;
            }
            let credential = self.credential().await?;
            let mut request = self.connector.build_request(&unit, &credential);
            if let Some(timeout) = self.options.data_timeout {
                request = request.with_timeout(timeout);
            }
            let url = request.url.clone();
            debug!(%supplier, endpoint, request = report.requests, %url, "sending request");

            let response = self.http.execute(request).await;
            let outcome = self.connector.classify(response, &url);

            match controller.on_outcome(&mut run, outcome.kind()) {
                Decision::Deliver => {
                    failure_streak = 0;
                    let payload = match outcome {
                        RequestOutcome::Success(payload) => {
                            report.units_delivered += 1;
                            payload
                        }
                        _ => {
                            report.units_empty += 1;
                            debug!(%supplier, endpoint, %url, "no results for unit");
                            Payload::default()
                        }
                    };
                    self.deliver(&payload, &mut report)?;
                    source.follow(self.connector.next_work_unit(&unit, &payload));
                    last_settled = unit.identifiers().last().cloned();
                }
                Decision::Reauthenticate => {
                    warn!(%supplier, endpoint, %url, "authorization rejected; refreshing credential");
                    self.credentials.refresh().await?;
                    report.reauthentications += 1;
                    pending = Some(unit);
                }
                Decision::Abort => {
                    return Err(HarvestError::AuthenticationExhausted { supplier, endpoint });
                }
                Decision::Reject => {
                    let detail = match outcome {
                        RequestOutcome::Fatal(detail) => detail,
                        other => format!("{:?}", other.kind()),
                    };
                    return Err(HarvestError::ProtocolViolation { url, detail });
                }
                Decision::Skip => {
                    report.units_failed += 1;
                    log_failure(supplier, endpoint, &outcome);
                    if cursor {
                        pending = Some(unit);
                    } else {
                        settle_failure(&unit, queue.as_deref_mut(), &mut dropped);
                        last_settled = unit.identifiers().last().cloned();
                    }
                    self.options.backoff.wait(failure_streak).await;
                    failure_streak = failure_streak.saturating_add(1);
                }
                Decision::Stop(stop) => {
                    report.units_failed += 1;
                    log_failure(supplier, endpoint, &outcome);
                    warn!(%supplier, endpoint, stop = stop.as_str(), "failure ceiling reached; stopping pass");
                    if cursor {
                        break (stop, Some(unit));
                    }
                    settle_failure(&unit, queue.as_deref_mut(), &mut dropped);
                    last_settled = unit.identifiers().last().cloned();
                    break (stop, None);
                }
            }
        };
        report.stop = stop;

        let resume = if pass == PassKind::Initial && stop.is_degraded() {
            if cursor {
                match &interrupted {
                    Some(WorkUnit::Page(Some(path))) => Some(Continuation::NextPage(path.clone())),
                    _ => None,
                }
            } else {
                last_settled.map(Continuation::AfterIdentifier)
            }
        } else {
            None
        };

        let mut leftover = Vec::new();
        if pass == PassKind::Retry && stop.is_degraded() {
            leftover.extend(interrupted.iter().flat_map(|unit| unit.identifiers().to_vec()));
            while let Some(unit) = source.next_unit() {
                leftover.extend(unit.identifiers().iter().cloned());
            }
        }

        info!(
            %supplier,
            endpoint,
            pass = ?pass,
            requests = report.requests,
            delivered = report.units_delivered,
            failed = report.units_failed,
            items = report.items_written,
            stop = stop.as_str(),
            "pass finished"
        );
        Ok(PassOutcome {
            report,
            dropped,
            leftover,
            resume,
        })
    }

    async fn credential(&mut self) -> Result<Credential, HarvestError> {
        match self.credentials.current() {
            Some(credential) => Ok(credential.clone()),
            None => Ok(self.credentials.acquire().await?),
        }
    }

    /// Archive, decode and write the rows of one successful response.
    fn deliver(&mut self, payload: &Payload, report: &mut PassReport) -> Result<(), HarvestError> {
        if payload.rows.is_empty() {
            return Ok(());
        }
        if let Some(archive) = self.archive.as_mut() {
            if let Err(error) = archive.append(&payload.rows) {
                warn!(%error, path = %archive.path().display(), "failed to archive raw rows");
            }
        }

        let mut items = Vec::with_capacity(payload.rows.len());
        for row in &payload.rows {
            match self.connector.decode(row) {
                Ok(item) => items.push(item),
                Err(malformed) => {
                    report.malformed_rows += 1;
                    debug!(field = malformed.field, reason = %malformed.reason, "skipping malformed row");
                }
            }
        }
        if items.is_empty() {
            return Ok(());
        }

        let rows = self.sink.write(&items)?;
        report.items_written += items.len() as u64;
        report.rows_written += rows as u64;
        Ok(())
    }
}

fn settle_failure(unit: &WorkUnit, queue: Option<&mut FailureQueue>, dropped: &mut Vec<String>) {
    match queue {
        Some(queue) => {
            let queued = queue.push_unit(unit);
            debug!(queued, total = queue.len(), "identifiers requeued");
        }
        None => {
            for identifier in unit.identifiers() {
                warn!(identifier = identifier.as_str(), "dropping identifier after failed retry");
            }
            dropped.extend(unit.identifiers().iter().cloned());
        }
    }
}

fn log_failure(supplier: Supplier, endpoint: &str, outcome: &RequestOutcome) {
    match outcome {
        RequestOutcome::Timeout { url, message } => {
            warn!(%supplier, endpoint, %url, message = message.as_str(), "request timed out");
        }
        RequestOutcome::TransientServerError { status, url, body } => {
            warn!(
                %supplier,
                endpoint,
                %url,
                status = ?status,
                body = truncate(body, 512),
                "transient server error"
            );
        }
        other => warn!(%supplier, endpoint, outcome = ?other.kind(), "request failed"),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
