//! Work unit sources: chunked identifiers, cursor pages and the failure queue.

use serde::Serialize;
use tracing::debug;

use crate::error::ConfigError;

/// Default number of identifiers per chunked request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Parameters of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WorkUnit {
    /// Sorted identifiers sent together in one call.
    Batch(Vec<String>),
    /// Cursor page; `None` is the implicit first page.
    Page(Option<String>),
}

impl WorkUnit {
    /// Identifiers carried by a batch unit; empty for pages.
    pub fn identifiers(&self) -> &[String] {
        match self {
            Self::Batch(identifiers) => identifiers,
            Self::Page(_) => &[],
        }
    }
}

/// Lazy, finite sequence of identifier slices `[i, i + B)` over sorted identifiers.
#[derive(Debug, Clone)]
pub struct ChunkedIdentifiers {
    identifiers: Vec<String>,
    batch_size: usize,
    position: usize,
}

impl ChunkedIdentifiers {
    pub fn new(
        identifiers: impl IntoIterator<Item = String>,
        batch_size: usize,
    ) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        let mut identifiers = identifiers.into_iter().collect::<Vec<_>>();
        identifiers.sort_unstable();

        Ok(Self {
            identifiers,
            batch_size,
            position: 0,
        })
    }

    /// Skip every identifier that sorts at or before `marker`.
    pub fn resume_after(mut self, marker: &str) -> Self {
        self.position = self
            .identifiers
            .partition_point(|identifier| identifier.as_str() <= marker);
        debug!(
            marker,
            skipped = self.position,
            total = self.identifiers.len(),
            "resuming chunked harvest"
        );
        self
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn remaining(&self) -> usize {
        self.identifiers.len().saturating_sub(self.position)
    }

    pub fn total(&self) -> usize {
        self.identifiers.len()
    }
}

impl Iterator for ChunkedIdentifiers {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.identifiers.len() {
            return None;
        }
        let end = (self.position + self.batch_size).min(self.identifiers.len());
        debug!(
            from = self.position,
            to = end,
            total = self.identifiers.len(),
            "next identifier batch"
        );
        let batch = self.identifiers[self.position..end].to_vec();
        self.position = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let batches = self.remaining().div_ceil(self.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for ChunkedIdentifiers {}

/// Cursor traversal driven by the server's `next` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSource {
    pending: Option<WorkUnit>,
}

impl CursorSource {
    pub fn new() -> Self {
        Self {
            pending: Some(WorkUnit::Page(None)),
        }
    }

    /// Start from a previously seen continuation instead of the first page.
    pub fn starting_at(path: impl Into<String>) -> Self {
        Self {
            pending: Some(WorkUnit::Page(Some(path.into()))),
        }
    }

    pub fn next_unit(&mut self) -> Option<WorkUnit> {
        self.pending.take()
    }

    /// Record the unit following the last successful page. `None` ends the traversal.
    pub fn follow(&mut self, next: Option<WorkUnit>) {
        self.pending = next;
    }
}

impl Default for CursorSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered source of work units for one pass.
#[derive(Debug)]
pub enum BatchSource {
    Chunked(ChunkedIdentifiers),
    Cursor(CursorSource),
    /// Pass two: one identifier per unit.
    Requeued(std::vec::IntoIter<FailureRecord>),
}

impl BatchSource {
    pub fn next_unit(&mut self) -> Option<WorkUnit> {
        match self {
            Self::Chunked(chunks) => chunks.next().map(WorkUnit::Batch),
            Self::Cursor(cursor) => cursor.next_unit(),
            Self::Requeued(records) => records
                .next()
                .map(|record| WorkUnit::Batch(vec![record.identifier])),
        }
    }

    /// Feed the continuation of a successful response back into a cursor source.
    /// Chunked and requeued sources drive themselves and ignore it.
    pub fn follow(&mut self, next: Option<WorkUnit>) {
        if let Self::Cursor(cursor) = self {
            cursor.follow(next);
        }
    }

    pub const fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor(_))
    }
}

/// One identifier that failed in pass one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub identifier: String,
}

/// Identifiers awaiting the second, single-identifier pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureQueue {
    records: Vec<FailureRecord>,
}

impl FailureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push every identifier of `unit` as its own record. Returns how many were queued.
    pub fn push_unit(&mut self, unit: &WorkUnit) -> usize {
        let identifiers = unit.identifiers();
        self.records
            .extend(identifiers.iter().map(|identifier| FailureRecord {
                identifier: identifier.clone(),
            }));
        identifiers.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.identifier.clone())
            .collect()
    }

    /// Empty the queue into a pass-two source.
    pub fn drain_into_source(&mut self) -> BatchSource {
        BatchSource::Requeued(std::mem::take(&mut self.records).into_iter())
    }
}

/// Position from which an interrupted pass can be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "position", rename_all = "snake_case")]
pub enum Continuation {
    /// Every identifier sorting at or before this one has been dispatched.
    AfterIdentifier(String),
    /// Cursor reference of the next page to request.
    NextPage(String),
}

impl Continuation {
    pub const AFTER_IDENTIFIER: &'static str = "after_identifier";
    pub const NEXT_PAGE: &'static str = "next_page";

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AfterIdentifier(_) => Self::AFTER_IDENTIFIER,
            Self::NextPage(_) => Self::NEXT_PAGE,
        }
    }

    pub fn position(&self) -> &str {
        match self {
            Self::AfterIdentifier(position) | Self::NextPage(position) => position,
        }
    }

    pub fn from_parts(kind: &str, position: impl Into<String>) -> Result<Self, ConfigError> {
        match kind {
            Self::AFTER_IDENTIFIER => Ok(Self::AfterIdentifier(position.into())),
            Self::NEXT_PAGE => Ok(Self::NextPage(position.into())),
            other => Err(ConfigError::InvalidSetting {
                name: String::from("checkpoint kind"),
                value: other.to_owned(),
            }),
        }
    }
}
