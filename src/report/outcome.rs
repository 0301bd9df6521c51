//! Per-node outcome log
//!
//! A second report with a fixed schema that records what happened to every
//! node a run reached, so failed and skipped nodes can be found afterwards.

use crate::error::ReportResult;
use crate::hierarchy::{Container, Level, NodeId};
use crate::report::{Record, ReportHandle, Reporter, Schema};
use std::fmt;
use std::path::{Path, PathBuf};

/// Fields of every outcome row, in order
pub const OUTCOME_FIELDS: [&str; 6] = ["worker", "level", "id", "label", "status", "detail"];

/// Final state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Curated,
    Skipped,
    Failed,
    Unresolved,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Curated => "curated",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the outcome log written next to a report
///
/// `out/report.jsonl` becomes `out/report.outcomes.jsonl`.
pub fn outcomes_path(report: &Path) -> PathBuf {
    let stem = report
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let name = match report.extension() {
        Some(ext) => format!("{}.outcomes.{}", stem, ext.to_string_lossy()),
        None => format!("{}.outcomes", stem),
    };
    report.with_file_name(name)
}

/// Owner of the outcome report
pub struct OutcomeLog {
    reporter: Reporter,
}

impl OutcomeLog {
    fn schema() -> Schema {
        Schema::new(OUTCOME_FIELDS)
    }

    /// Spawn a writer thread for the outcome log at `path`
    pub fn spawn_at(path: &Path, batch_size: usize, channel_size: usize) -> ReportResult<Self> {
        Ok(Self {
            reporter: Reporter::spawn_at(path, Some(Self::schema()), batch_size, channel_size)?,
        })
    }

    /// Write the outcome log at `path` synchronously
    pub fn direct_at(path: &Path) -> ReportResult<Self> {
        Ok(Self {
            reporter: Reporter::direct_at(path, Some(Self::schema()))?,
        })
    }

    pub fn handle(&self) -> OutcomeHandle {
        OutcomeHandle(self.reporter.handle())
    }

    /// Flush and close; returns the number of rows written
    pub fn finish(self) -> ReportResult<u64> {
        self.reporter.finish()
    }
}

/// Cloneable handle for recording node outcomes
#[derive(Clone)]
pub struct OutcomeHandle(ReportHandle);

impl OutcomeHandle {
    /// Record the outcome of a resolved container
    pub fn record(
        &self,
        worker: Option<usize>,
        node: &Container,
        status: OutcomeStatus,
        detail: &str,
    ) -> ReportResult<()> {
        self.append(worker, node.level(), node.id(), node.label(), status, detail)
    }

    /// Record a node that could not be resolved
    pub fn unresolved(
        &self,
        worker: Option<usize>,
        level: Level,
        id: &NodeId,
        detail: &str,
    ) -> ReportResult<()> {
        self.append(worker, level, id, "", OutcomeStatus::Unresolved, detail)
    }

    fn append(
        &self,
        worker: Option<usize>,
        level: Level,
        id: &NodeId,
        label: &str,
        status: OutcomeStatus,
        detail: &str,
    ) -> ReportResult<()> {
        self.0.append(
            Record::new()
                .field("worker", worker.map(|w| w as u64))
                .field("level", level.as_str())
                .field("id", id.as_str())
                .field("label", label)
                .field("status", status.as_str())
                .field("detail", detail),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_outcomes_path() {
        assert_eq!(
            outcomes_path(Path::new("out/report.jsonl")),
            PathBuf::from("out/report.outcomes.jsonl")
        );
        assert_eq!(
            outcomes_path(Path::new("report.db")),
            PathBuf::from("report.outcomes.db")
        );
        assert_eq!(outcomes_path(Path::new("log")), PathBuf::from("log.outcomes"));
    }

    #[test]
    fn test_outcome_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("o.jsonl");
        let log = OutcomeLog::direct_at(&path).unwrap();
        let handle = log.handle();

        let root = Container::root("p", "Project");
        handle.record(None, &root, OutcomeStatus::Curated, "").unwrap();
        handle
            .unresolved(Some(2), Level::Leaf, &"f9".into(), "leaf 'f9' not found")
            .unwrap();
        assert_eq!(log.finish().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows[0]["worker"], serde_json::Value::Null);
        assert_eq!(rows[0]["status"], "curated");
        assert_eq!(rows[1]["worker"], 2);
        assert_eq!(rows[1]["status"], "unresolved");
    }
}
