//! Aggregated reporting
//!
//! Curators append [`Record`]s through a [`ReportHandle`]. Every record must
//! carry exactly the fields of the report's [`Schema`], which is fixed either
//! up front or by the first record appended through any handle.
//!
//! Two modes are available:
//!
//! - [`Reporter::direct`]: each append is written synchronously by the caller.
//! - [`Reporter::spawn`]: every handle sends records over one bounded channel
//!   to a dedicated `report-writer` thread, the only code that touches the
//!   output artifact. [`Reporter::finish`] sends a single shutdown message and
//!   waits for the writer to flush.
//!
//! ```text
//!   worker 0 ──┐
//!   worker 1 ──┼── channel ──▶ report-writer ──▶ sink (.jsonl / .csv / .db)
//!   main     ──┘
//! ```

pub mod outcome;
pub mod sink;
pub mod writer;

pub use outcome::{OutcomeHandle, OutcomeLog, OutcomeStatus};
pub use sink::{CsvSink, JsonLinesSink, RecordSink, ReportFormat, SqliteSink};
pub use writer::ReportMessage;

use crate::error::{ReportError, ReportResult};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// One structured report row: ordered field/value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value under the same name
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for Record {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().collect(),
        }
    }
}

/// Ordered field list every record of a report must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Schema taken from a record's field names
    pub fn of(record: &Record) -> Self {
        Self {
            fields: record.names(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Check a record and return its values in schema order
    pub fn align(&self, record: &Record) -> ReportResult<Vec<Value>> {
        let mismatch = || ReportError::SchemaMismatch {
            expected: self.fields.clone(),
            got: record.names(),
        };

        if record.len() != self.fields.len() {
            return Err(mismatch());
        }
        self.fields
            .iter()
            .map(|name| record.get(name).cloned().ok_or_else(mismatch))
            .collect()
    }
}

/// Schema slot shared by every handle of one report
type SchemaCell = Arc<OnceLock<Schema>>;

fn align(cell: &SchemaCell, record: &Record) -> ReportResult<Vec<Value>> {
    if record.is_empty() {
        return Err(ReportError::EmptyRecord);
    }
    cell.get_or_init(|| Schema::of(record)).align(record)
}

/// Statistics about report writes
#[derive(Debug, Default)]
pub struct ReporterStats {
    /// Records accepted by `append`
    pub records_appended: AtomicU64,

    /// Records written to the sink
    pub records_written: AtomicU64,

    /// Batches handed to the sink
    pub batches: AtomicU64,
}

impl ReporterStats {
    pub fn records_appended(&self) -> u64 {
        self.records_appended.load(Ordering::Relaxed)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

/// Sink written in place by direct reporters
struct DirectState {
    sink: Box<dyn RecordSink>,
    begun: bool,
}

#[derive(Clone)]
enum Target {
    /// Appends are written synchronously by the caller
    Direct(Arc<Mutex<DirectState>>),

    /// Appends are queued for the writer thread
    Queued(Sender<ReportMessage>),
}

/// Cloneable handle used to append records
#[derive(Clone)]
pub struct ReportHandle {
    target: Target,
    schema: SchemaCell,
    stats: Arc<ReporterStats>,
}

impl ReportHandle {
    /// Validate a record against the schema and write or queue it
    ///
    /// Fails with [`ReportError::SchemaMismatch`] if the record's field set
    /// differs from the schema.
    pub fn append(&self, record: Record) -> ReportResult<()> {
        let row = align(&self.schema, &record)?;
        match &self.target {
            Target::Direct(state) => {
                let mut state = state.lock();
                let schema = self.schema.get().ok_or(ReportError::EmptyRecord)?;
                if !state.begun {
                    state.sink.begin(schema)?;
                    state.begun = true;
                }
                state.sink.write_batch(schema, std::slice::from_ref(&row))?;
                self.stats.records_written.fetch_add(1, Ordering::Relaxed);
                self.stats.batches.fetch_add(1, Ordering::Relaxed);
            }
            Target::Queued(sender) => {
                sender
                    .send(ReportMessage::Record(row))
                    .map_err(|_| ReportError::ChannelClosed)?;
            }
        }
        self.stats.records_appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Ask the sink to flush pending records
    pub fn flush(&self) -> ReportResult<()> {
        match &self.target {
            Target::Direct(state) => state.lock().sink.flush(),
            Target::Queued(sender) => sender
                .send(ReportMessage::Flush)
                .map_err(|_| ReportError::ChannelClosed),
        }
    }

    /// The established schema, if any
    pub fn schema(&self) -> Option<Schema> {
        self.schema.get().cloned()
    }

    pub fn stats(&self) -> &ReporterStats {
        &self.stats
    }

    /// Whether appends go through the writer thread
    pub fn is_queued(&self) -> bool {
        matches!(self.target, Target::Queued(_))
    }
}

/// Owner of a report; hands out handles and finalizes the output
pub struct Reporter {
    handle: ReportHandle,
    writer: Option<JoinHandle<ReportResult<()>>>,
    stats: Arc<ReporterStats>,
    description: String,
}

impl Reporter {
    /// Create a synchronous, single-producer reporter
    pub fn direct(sink: Box<dyn RecordSink>, schema: Option<Schema>) -> Self {
        let stats = Arc::new(ReporterStats::default());
        let description = sink.describe();
        let handle = ReportHandle {
            target: Target::Direct(Arc::new(Mutex::new(DirectState { sink, begun: false }))),
            schema: schema_cell(schema),
            stats: Arc::clone(&stats),
        };
        Self {
            handle,
            writer: None,
            stats,
            description,
        }
    }

    /// Create a multi-producer reporter backed by a writer thread
    pub fn spawn(
        sink: Box<dyn RecordSink>,
        schema: Option<Schema>,
        batch_size: usize,
        channel_size: usize,
    ) -> ReportResult<Self> {
        let (sender, receiver) = bounded(channel_size);
        let stats = Arc::new(ReporterStats::default());
        let schema = schema_cell(schema);
        let description = sink.describe();

        let handle = ReportHandle {
            target: Target::Queued(sender),
            schema: Arc::clone(&schema),
            stats: Arc::clone(&stats),
        };

        let stats_clone = Arc::clone(&stats);
        let writer = thread::Builder::new()
            .name("report-writer".into())
            .spawn(move || writer::writer_thread(sink, receiver, schema, stats_clone, batch_size))
            .map_err(|e| ReportError::CreateFailed {
                path: description.clone().into(),
                reason: format!("Failed to spawn writer thread: {}", e),
            })?;

        Ok(Self {
            handle,
            writer: Some(writer),
            stats,
            description,
        })
    }

    /// Open a sink for `path` (format chosen by extension) and spawn a writer
    pub fn spawn_at(
        path: &Path,
        schema: Option<Schema>,
        batch_size: usize,
        channel_size: usize,
    ) -> ReportResult<Self> {
        let sink = sink::open(path)?;
        Self::spawn(sink, schema, batch_size, channel_size)
    }

    /// Open a sink for `path` and write synchronously
    pub fn direct_at(path: &Path, schema: Option<Schema>) -> ReportResult<Self> {
        Ok(Self::direct(sink::open(path)?, schema))
    }

    /// Get a handle for appending records
    pub fn handle(&self) -> ReportHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> &ReporterStats {
        &self.stats
    }

    /// Send the shutdown sentinel, wait for the writer and close the sink
    ///
    /// Returns the number of records written.
    pub fn finish(mut self) -> ReportResult<u64> {
        match self.writer.take() {
            Some(writer) => {
                // A failed send means the writer already exited; its result says why
                let sent = match &self.handle.target {
                    Target::Queued(sender) => sender.send(ReportMessage::Shutdown).is_ok(),
                    Target::Direct(_) => true,
                };
                writer.join().map_err(|_| ReportError::WriterPanicked)??;
                if !sent {
                    return Err(ReportError::ChannelClosed);
                }
            }
            None => {
                if let Target::Direct(state) = &self.handle.target {
                    let mut state = state.lock();
                    if !state.begun {
                        if let Some(schema) = self.handle.schema.get() {
                            state.sink.begin(schema)?;
                            state.begun = true;
                        }
                    }
                    state.sink.finish()?;
                }
            }
        }

        let written = self.stats.records_written();
        debug!(report = %self.description, records = written, "Report finished");
        Ok(written)
    }
}

fn schema_cell(schema: Option<Schema>) -> SchemaCell {
    let cell = OnceLock::new();
    if let Some(schema) = schema {
        let _ = cell.set(schema);
    }
    Arc::new(cell)
}
