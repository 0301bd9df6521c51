//! Report writer thread
//!
//! Receives aligned rows over a bounded channel and hands them to the sink
//! in batches. The writer is the only code that touches the sink once a
//! reporter has been spawned.

use crate::error::ReportResult;
use crate::report::{RecordSink, ReporterStats, Schema};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, trace};

/// Message types sent to the writer thread
#[derive(Debug)]
pub enum ReportMessage {
    /// A row already aligned to the report schema
    Record(Vec<Value>),

    /// Flush pending rows
    Flush,

    /// Flush and stop; sent exactly once by `Reporter::finish`
    Shutdown,
}

/// Pending rows plus the sink they are destined for
struct Batcher {
    sink: Box<dyn RecordSink>,
    schema: Arc<OnceLock<Schema>>,
    stats: Arc<ReporterStats>,
    buffer: Vec<Vec<Value>>,
    begun: bool,
}

impl Batcher {
    fn flush(&mut self) -> ReportResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        // Rows only exist once a schema has been established
        let Some(schema) = self.schema.get() else {
            return Ok(());
        };
        if !self.begun {
            self.sink.begin(schema)?;
            self.begun = true;
        }

        self.sink.write_batch(schema, &self.buffer)?;
        self.sink.flush()?;
        self.stats
            .records_written
            .fetch_add(self.buffer.len() as u64, Ordering::Relaxed);
        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        trace!(rows = self.buffer.len(), "Flushed report batch");
        self.buffer.clear();
        Ok(())
    }

    fn close(mut self) -> ReportResult<()> {
        self.flush()?;
        if !self.begun {
            if let Some(schema) = self.schema.get() {
                self.sink.begin(schema)?;
            }
        }
        self.sink.finish()
    }
}

/// Internal writer thread function
pub(crate) fn writer_thread(
    sink: Box<dyn RecordSink>,
    receiver: Receiver<ReportMessage>,
    schema: Arc<OnceLock<Schema>>,
    stats: Arc<ReporterStats>,
    batch_size: usize,
) -> ReportResult<()> {
    let batch_size = batch_size.max(1);
    let mut batcher = Batcher {
        sink,
        schema,
        stats,
        buffer: Vec::with_capacity(batch_size),
        begun: false,
    };

    loop {
        // Drain without blocking first
        let msg = match receiver.try_recv() {
            Ok(msg) => msg,
            Err(TryRecvError::Empty) => {
                if batcher.buffer.len() >= batch_size / 4 {
                    batcher.flush()?;
                }
                match receiver.recv_timeout(Duration::from_millis(100)) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        // Idle: don't hold rows back
                        batcher.flush()?;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };

        match msg {
            ReportMessage::Record(row) => {
                batcher.buffer.push(row);
                if batcher.buffer.len() >= batch_size {
                    batcher.flush()?;
                }
            }
            ReportMessage::Flush => batcher.flush()?,
            ReportMessage::Shutdown => {
                debug!("Report writer received shutdown");
                break;
            }
        }
    }

    batcher.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Record;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;

    /// Sink that records every call for inspection
    #[derive(Default)]
    struct Capture {
        rows: Vec<Vec<Value>>,
        batches: usize,
        begun: usize,
        finished: bool,
    }

    struct CaptureSink(Arc<Mutex<Capture>>);

    impl RecordSink for CaptureSink {
        fn begin(&mut self, _schema: &Schema) -> ReportResult<()> {
            self.0.lock().begun += 1;
            Ok(())
        }

        fn write_batch(&mut self, _schema: &Schema, rows: &[Vec<Value>]) -> ReportResult<()> {
            let mut capture = self.0.lock();
            capture.rows.extend(rows.iter().cloned());
            capture.batches += 1;
            Ok(())
        }

        fn finish(&mut self) -> ReportResult<()> {
            self.0.lock().finished = true;
            Ok(())
        }

        fn describe(&self) -> String {
            "capture".into()
        }
    }

    fn run(messages: Vec<ReportMessage>, schema: Option<Schema>, batch: usize) -> Capture {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let (sender, receiver) = bounded(messages.len() + 1);
        for msg in messages {
            sender.send(msg).unwrap();
        }
        let cell = Arc::new(OnceLock::new());
        if let Some(schema) = schema {
            cell.set(schema).unwrap();
        }
        writer_thread(
            Box::new(CaptureSink(Arc::clone(&capture))),
            receiver,
            cell,
            Arc::new(ReporterStats::default()),
            batch,
        )
        .unwrap();
        let mut guard = capture.lock();
        std::mem::take(&mut *guard)
    }

    fn row(n: i64) -> ReportMessage {
        let schema = Schema::new(["n"]);
        ReportMessage::Record(schema.align(&Record::new().field("n", n)).unwrap())
    }

    #[test]
    fn test_batches_by_size() {
        let mut messages: Vec<_> = (0..10).map(row).collect();
        messages.push(ReportMessage::Shutdown);
        let capture = run(messages, Some(Schema::new(["n"])), 4);

        assert_eq!(capture.rows.len(), 10);
        assert_eq!(capture.batches, 3);
        assert_eq!(capture.begun, 1);
        assert!(capture.finished);
    }

    #[test]
    fn test_rows_after_shutdown_are_not_written() {
        let messages = vec![row(1), ReportMessage::Shutdown, row(2)];
        let capture = run(messages, Some(Schema::new(["n"])), 100);
        assert_eq!(capture.rows, vec![vec![Value::from(1)]]);
    }

    #[test]
    fn test_explicit_schema_begins_without_rows() {
        let capture = run(vec![ReportMessage::Shutdown], Some(Schema::new(["n"])), 10);
        assert_eq!(capture.begun, 1);
        assert!(capture.rows.is_empty());
        assert!(capture.finished);
    }
}
