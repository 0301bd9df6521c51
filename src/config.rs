//! Configuration types for hierarchy-curator
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::curator::builtin::BUILTIN_NAMES;
use crate::error::ConfigError;
use crate::hierarchy::{Container, Level};
use crate::walker::TraversalOrder;
use clap::Parser;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Report batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 100_000;

/// Predicate replacing the curator's `validate` as the walker's admission gate
pub type AdmissionFn = Arc<dyn Fn(&Container) -> bool + Send + Sync>;

/// Walk a container hierarchy and curate every node
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hierarchy-curator",
    version,
    about = "Walk a container hierarchy and apply curation to every node",
    long_about = "Walks a hierarchy stored in a SQLite store, depth-first or breadth-first,\n\
                  and runs a curator on every container. The root's children are split\n\
                  across worker threads, each with its own store connection.",
    after_help = "EXAMPLES:\n    \
        hierarchy-curator import project.json store.db\n    \
        hierarchy-curator store.db p1 -c container-path -r paths.jsonl\n    \
        hierarchy-curator store.db p1 -w 8 --breadth-first --stop-level subgroup\n    \
        hierarchy-curator store.db p1 --prune-label '^scratch' -r report.db",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// SQLite hierarchy store
    #[arg(value_name = "STORE")]
    pub store: Option<PathBuf>,

    /// Id of the root container to curate
    #[arg(value_name = "ROOT_ID")]
    pub root: Option<String>,

    /// Subcommand (import)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Built-in curator to run
    #[arg(short = 'c', long, default_value = "print-hierarchy", value_name = "NAME")]
    pub curator: String,

    /// Number of worker threads (1 runs everything in the main thread)
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Visit nodes level by level instead of depth-first
    #[arg(long)]
    pub breadth_first: bool,

    /// Never expand containers at or below this level
    #[arg(long, value_name = "LEVEL")]
    pub stop_level: Option<String>,

    /// Re-fetch every container right before it is curated
    #[arg(long)]
    pub reload: bool,

    /// Write curator records to FILE (.db/.sqlite for SQLite, .csv for CSV, otherwise JSON lines)
    #[arg(short = 'r', long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Skip the per-node outcome log written next to the report
    #[arg(long)]
    pub no_outcomes: bool,

    /// Report writer batch size
    #[arg(short = 'b', long, default_value = "1000", value_name = "NUM")]
    pub batch_size: usize,

    /// Do not expand containers whose label matches PATTERN (can be repeated)
    #[arg(long = "prune-label", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub prune_labels: Vec<String>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Load a JSON fixture into a new SQLite store
    Import {
        /// Nested JSON fixture ({id, level, label, info, children})
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,

        /// SQLite store to create
        #[arg(value_name = "STORE")]
        output: PathBuf,
    },
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Where and how to write reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    /// Curator record output
    pub path: PathBuf,

    /// Rows per writer batch
    pub batch_size: usize,

    /// Capacity of the writer channel
    pub channel_size: usize,

    /// Also write `<stem>.outcomes.<ext>`
    pub outcomes: bool,
}

impl ReportConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_size: 1000,
            channel_size: 2000,
            outcomes: true,
        }
    }

    pub fn without_outcomes(mut self) -> Self {
        self.outcomes = false;
        self
    }
}

/// Validated runtime configuration for one curation run
#[derive(Clone)]
pub struct CurateConfig {
    /// Depth-first or breadth-first
    pub traversal_order: TraversalOrder,

    /// Containers at or below this level are never expanded
    pub stop_level: Option<Level>,

    /// Re-fetch every container before it is curated
    pub reload: bool,

    /// Number of workers; 1 walks the whole tree in the calling thread
    pub worker_count: usize,

    /// Report output; `None` disables reporting
    pub report: Option<ReportConfig>,

    /// Replaces `Curator::validate` as the admission predicate
    pub admission_override: Option<AdmissionFn>,

    /// Show progress indicator
    pub show_progress: bool,
}

impl Default for CurateConfig {
    fn default() -> Self {
        Self {
            traversal_order: TraversalOrder::DepthFirst,
            stop_level: None,
            reload: false,
            worker_count: 1,
            report: None,
            admission_override: None,
            show_progress: false,
        }
    }
}

impl fmt::Debug for CurateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurateConfig")
            .field("traversal_order", &self.traversal_order)
            .field("stop_level", &self.stop_level)
            .field("reload", &self.reload)
            .field("worker_count", &self.worker_count)
            .field("report", &self.report)
            .field("admission_override", &self.admission_override.is_some())
            .field("show_progress", &self.show_progress)
            .finish()
    }
}

impl CurateConfig {
    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.traversal_order = order;
        self
    }

    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_stop_level(mut self, level: Option<Level>) -> Self {
        self.stop_level = level;
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_report(mut self, report: ReportConfig) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_admission<F>(mut self, admit: F) -> Self
    where
        F: Fn(&Container) -> bool + Send + Sync + 'static,
    {
        self.admission_override = Some(Arc::new(admit));
        self
    }

    pub fn report_enabled(&self) -> bool {
        self.report.is_some()
    }

    /// Check the worker count
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }
        Ok(())
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            traversal_order: if args.breadth_first {
                TraversalOrder::BreadthFirst
            } else {
                TraversalOrder::DepthFirst
            },
            stop_level: args.stop_level.as_deref().map(str::parse::<Level>).transpose()?,
            reload: args.reload,
            worker_count: args.workers,
            report: None,
            admission_override: prune_predicate(&args.prune_labels)?,
            show_progress: !args.quiet,
        };
        config.validate()?;

        if args.batch_size < MIN_BATCH_SIZE || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        let report = match &args.report {
            Some(path) => {
                check_output_path(path)?;
                let mut report = ReportConfig::new(path.clone());
                report.batch_size = args.batch_size;
                report.channel_size = args.batch_size * 2;
                report.outcomes = !args.no_outcomes;
                Some(report)
            }
            None => None,
        };

        Ok(Self { report, ..config })
    }
}

/// Build the admission override from `--prune-label` patterns
fn prune_predicate(patterns: &[String]) -> Result<Option<AdmissionFn>, ConfigError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let compiled = patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPrunePattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Arc::new(move |node: &Container| {
        !compiled.iter().any(|re| re.is_match(node.label()))
    })))
}

fn check_output_path(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: path.to_path_buf(),
                reason: format!("Parent directory '{}' does not exist", parent.display()),
            });
        }
    }
    Ok(())
}

impl CliArgs {
    /// Store path and root id for a curation run
    pub fn target(&self) -> Result<(&Path, &str), ConfigError> {
        let store = self.store.as_deref().ok_or(ConfigError::Missing("STORE"))?;
        let root = self.root.as_deref().ok_or(ConfigError::Missing("ROOT_ID"))?;
        Ok((store, root))
    }

    /// Validated built-in curator name
    pub fn curator_name(&self) -> Result<&str, ConfigError> {
        BUILTIN_NAMES
            .iter()
            .copied()
            .find(|name| *name == self.curator)
            .ok_or_else(|| ConfigError::UnknownCurator {
                name: self.curator.clone(),
                known: BUILTIN_NAMES.join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("hierarchy-curator").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["store.db", "p1"]);
        let config = CurateConfig::from_args(&args).unwrap();
        assert_eq!(config.traversal_order, TraversalOrder::DepthFirst);
        assert_eq!(config.stop_level, None);
        assert!(!config.report_enabled());
        assert!(config.admission_override.is_none());
        assert_eq!(args.target().unwrap(), (Path::new("store.db"), "p1"));
        assert_eq!(args.curator_name().unwrap(), "print-hierarchy");
    }

    #[test]
    fn test_full_arguments() {
        let args = parse(&[
            "store.db", "p1", "-w", "3", "--breadth-first", "--stop-level", "SubGroup",
            "--reload", "-r", "out.db", "-b", "50", "--no-outcomes",
        ]);
        let config = CurateConfig::from_args(&args).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.traversal_order, TraversalOrder::BreadthFirst);
        assert_eq!(config.stop_level, Some(Level::SubGroup));
        assert!(config.reload);

        let report = config.report.unwrap();
        assert_eq!(report.path, PathBuf::from("out.db"));
        assert_eq!(report.batch_size, 50);
        assert_eq!(report.channel_size, 100);
        assert!(!report.outcomes);
    }

    #[test]
    fn test_invalid_worker_count() {
        for count in ["0", "513"] {
            let args = parse(&["s.db", "p", "-w", count]);
            assert!(matches!(
                CurateConfig::from_args(&args),
                Err(ConfigError::InvalidWorkerCount { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_level_and_curator() {
        let args = parse(&["s.db", "p", "--stop-level", "session", "-c", "nope"]);
        assert!(matches!(
            CurateConfig::from_args(&args),
            Err(ConfigError::UnknownLevel(_))
        ));
        assert!(matches!(
            args.curator_name(),
            Err(ConfigError::UnknownCurator { .. })
        ));
    }

    #[test]
    fn test_prune_label_predicate() {
        let args = parse(&["s.db", "p", "--prune-label", "^scratch", "--prune-label", "tmp$"]);
        let config = CurateConfig::from_args(&args).unwrap();
        let admit = config.admission_override.unwrap();

        let root = Container::root("p", "Project");
        let scratch = Container::child("a", Level::Group, "scratch-01", &root);
        let tmp = Container::child("b", Level::Group, "data-tmp", &root);
        let keep = Container::child("c", Level::Group, "sub-01", &root);
        assert!(!admit(&scratch));
        assert!(!admit(&tmp));
        assert!(admit(&keep));
    }

    #[test]
    fn test_bad_prune_pattern() {
        let args = parse(&["s.db", "p", "--prune-label", "("]);
        assert!(matches!(
            CurateConfig::from_args(&args),
            Err(ConfigError::InvalidPrunePattern { .. })
        ));
    }

    #[test]
    fn test_import_subcommand() {
        let args = parse(&["import", "tree.json", "store.db"]);
        assert!(args.store.is_none());
        match &args.command {
            Some(Command::Import { fixture, output }) => {
                assert_eq!(*fixture, PathBuf::from("tree.json"));
                assert_eq!(*output, PathBuf::from("store.db"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(matches!(args.target(), Err(ConfigError::Missing("STORE"))));
    }
}
