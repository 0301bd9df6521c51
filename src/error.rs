//! Error types for hierarchy-curator
//!
//! This module defines the error hierarchy for a curation run:
//! - Store errors (fetching and enumerating containers)
//! - Curation errors raised by visitor code
//! - Report errors (schema mismatches, writer failures)
//! - Configuration and worker errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Node-level failures are values, not aborts
//! - Preserve error chains for debugging

use crate::hierarchy::{Level, NodeId};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a curation run
#[derive(Error, Debug)]
pub enum CuratorError {
    /// Hierarchy store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Report errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Curation error escalated out of node-level isolation
    #[error("Curation error: {0}")]
    Curation(#[from] CurationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a hierarchy store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The id no longer resolves (deleted between enumeration and fetch)
    #[error("{level} '{id}' not found")]
    NotFound { level: Level, id: NodeId },

    /// A child accessor was called that is not valid for the parent's level
    #[error("{parent} containers have no {child} children")]
    InvalidAccessor { parent: Level, child: Level },

    /// Failed to open a connection to the store
    #[error("Failed to connect to store: {0}")]
    Connect(String),

    /// Stored data could not be decoded
    #[error("Corrupt node '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON error (info payloads, fixtures)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised from inside a curator's `curate` hook
#[derive(Error, Debug)]
pub enum CurationError {
    /// Free-form failure reported by visitor code
    #[error("{0}")]
    Message(String),

    /// Store access from inside curation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Appending a report record failed
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

impl CurationError {
    /// Build a message error from anything displayable
    pub fn msg(message: impl std::fmt::Display) -> Self {
        CurationError::Message(message.to_string())
    }

    /// Whether this error must abort the worker instead of being isolated
    pub fn is_fatal(&self) -> bool {
        matches!(self, CurationError::Report(ReportError::SchemaMismatch { .. }))
    }
}

/// Report errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// Record fields do not match the established schema
    #[error("Record fields {got:?} do not match report fields {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// A record was appended with no fields
    #[error("Record has no fields")]
    EmptyRecord,

    /// Failed to create the output artifact
    #[error("Failed to create report at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Writer channel closed unexpectedly
    #[error("Report writer channel closed unexpectedly")]
    ChannelClosed,

    /// Writer thread panicked
    #[error("Report writer thread panicked")]
    WriterPanicked,

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Unknown level name
    #[error("Unknown level '{0}': expected root, group, subgroup, leafgroup, leaf or output")]
    UnknownLevel(String),

    /// Unknown built-in curator name
    #[error("Unknown curator '{name}': expected one of {known}")]
    UnknownCurator { name: String, known: String },

    /// Invalid prune pattern
    #[error("Invalid prune pattern '{pattern}': {reason}")]
    InvalidPrunePattern { pattern: String, reason: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Required argument missing
    #[error("Missing argument: {0}")]
    Missing(&'static str),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// An error escaped the worker's loop
    #[error("Worker {id} aborted: {reason}")]
    Fatal { id: usize, reason: String },
}

impl WorkerError {
    /// Worker this error belongs to
    pub fn worker_id(&self) -> usize {
        match self {
            WorkerError::Panicked { id, .. }
            | WorkerError::InitFailed { id, .. }
            | WorkerError::Fatal { id, .. } => *id,
        }
    }
}

/// Result type alias for CuratorError
pub type Result<T> = std::result::Result<T, CuratorError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for ReportError
pub type ReportResult<T> = std::result::Result<T, ReportError>;
