//! hierarchy-curator - Parallel curation walker for container hierarchies
//!
//! Walks a fixed-depth hierarchy of typed containers (Root, Group, SubGroup,
//! LeafGroup, and the Leaf/Output items attached to them) and runs a
//! user-supplied [`Curator`] on every node.
//!
//! # Features
//!
//! - **Depth-first or breadth-first**: One frontier, two pop ends.
//!
//! - **Pruning**: A stop level and an admission predicate decide which
//!   containers have their children enumerated.
//!
//! - **Parallel curation**: The root's children are split round-robin over
//!   worker threads, each with its own store connection. A failing worker
//!   never takes down the others.
//!
//! - **Aggregated reports**: Records from every worker funnel into one
//!   writer thread, producing a single JSON-lines or SQLite artifact with a
//!   checked schema.
//!
//! # Architecture
//!
//! ```text
//!                    ┌───────────────────────┐
//!                    │   Hierarchy store     │
//!                    │  (SQLite / memory)    │
//!                    └───────────┬───────────┘
//!                                │ one connection per worker
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!   ┌─────────┐             ┌─────────┐             ┌─────────┐
//!   │curator-0│             │curator-1│    ...      │curator-N│
//!   │ walker  │             │ walker  │             │ walker  │
//!   └────┬────┘             └────┬────┘             └────┬────┘
//!        │     Record rows       │                       │
//!        └───────────────────────┼───────────────────────┘
//!                                ▼
//!                    ┌───────────────────────┐
//!                    │    report-writer      │
//!                    │ (crossbeam bounded)   │
//!                    │  schema-checked rows  │
//!                    └───────────┬───────────┘
//!                                ▼
//!                      report.jsonl / report.db
//! ```
//!
//! # Example
//!
//! ```bash
//! # Load a fixture into a store
//! hierarchy-curator import project.json store.db
//!
//! # Report every container path with 8 workers
//! hierarchy-curator store.db p1 -w 8 -c container-path -r paths.db
//!
//! # Query results
//! sqlite3 paths.db "SELECT path FROM records WHERE level = 'leaf'"
//! ```

pub mod config;
pub mod curator;
pub mod distributor;
pub mod error;
pub mod hierarchy;
pub mod progress;
pub mod report;
pub mod walker;

pub use config::{CliArgs, CurateConfig, ReportConfig};
pub use curator::{Context, Curator, NodeOutcome};
pub use distributor::{run, Distributor, RunResult, RunStatus};
pub use error::{CurationError, CuratorError, Result};
pub use hierarchy::{Connect, Container, HierarchyStore, Level, NodeId, WorkRef};
pub use report::{Record, ReportHandle, Reporter, Schema};
pub use walker::{TraversalOrder, Walker};
