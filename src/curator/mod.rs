//! Curator contract
//!
//! A [`Curator`] is the caller-supplied logic applied to every node a run
//! reaches. It sees nodes one at a time through [`process`], together with a
//! [`Context`] carrying everything the node's worker owns: its store
//! connection, the report handle, the shared lock and the root snapshot.
//!
//! The root snapshot is the only state that flows from root curation into the
//! workers. It is writable while the root is being curated and read-only for
//! the rest of the run; each worker receives its own clone at spawn.

pub mod builtin;

use crate::error::{CurationError, CuratorError, ReportError};
use crate::hierarchy::{Container, HierarchyStore, Level};
use crate::report::{Record, ReportHandle};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Lock handed to every worker for curator-chosen shared resources
///
/// The framework never takes this lock itself.
pub type SharedLock = Arc<Mutex<()>>;

/// Create a new shared lock
pub fn shared_lock() -> SharedLock {
    Arc::new(Mutex::new(()))
}

/// Per-level validation and curation hooks
///
/// Implementations dispatch on `node.level()`; both hooks see every level.
///
/// # Example
///
/// ```
/// use hierarchy_curator::curator::{Context, Curator};
/// use hierarchy_curator::error::CurationError;
/// use hierarchy_curator::hierarchy::{Container, Level};
///
/// #[derive(Clone, Default)]
/// struct CountSessions {
///     seen: usize,
/// }
///
/// impl Curator for CountSessions {
///     type Snapshot = ();
///
///     fn curate(&mut self, node: &Container, _ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
///         match node.level() {
///             Level::SubGroup => self.seen += 1,
///             Level::Root | Level::Group | Level::LeafGroup | Level::Leaf | Level::Output => {}
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Curator: Clone + Send + 'static {
    /// State established while curating the root and copied into each worker
    type Snapshot: Clone + Default + Send + 'static;

    /// Whether `node` should be curated and have its children enumerated
    fn validate(&self, _node: &Container, _ctx: &Context<'_, Self::Snapshot>) -> bool {
        true
    }

    /// Apply curation to one node
    fn curate(
        &mut self,
        node: &Container,
        ctx: &mut Context<'_, Self::Snapshot>,
    ) -> Result<(), CurationError>;
}

/// What happened to one node in [`process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// `curate` ran and returned `Ok`
    Curated,
    /// `validate` returned false; `curate` was not called
    Skipped,
    /// `curate` returned an error, isolated to this node
    Failed(String),
}

/// Everything a curator may touch while curating a node
pub struct Context<'a, S> {
    worker: Option<usize>,
    store: &'a dyn HierarchyStore,
    reporter: Option<ReportHandle>,
    lock: SharedLock,
    snapshot: S,
    root_phase: bool,
}

impl<'a, S> Context<'a, S> {
    pub fn new(store: &'a dyn HierarchyStore, snapshot: S, lock: SharedLock) -> Self {
        Self {
            worker: None,
            store,
            reporter: None,
            lock,
            snapshot,
            root_phase: false,
        }
    }

    /// Mark this context as owned by worker `id`
    pub fn with_worker(mut self, id: usize) -> Self {
        self.worker = Some(id);
        self
    }

    pub fn with_reporter(mut self, reporter: Option<ReportHandle>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Worker id, `None` in the main thread
    pub fn worker(&self) -> Option<usize> {
        self.worker
    }

    /// This worker's own store connection
    pub fn store(&self) -> &'a dyn HierarchyStore {
        self.store
    }

    pub fn reporter(&self) -> Option<&ReportHandle> {
        self.reporter.as_ref()
    }

    /// Append a record if reporting is enabled
    ///
    /// Returns `Ok(false)` when there is no report to write to.
    pub fn report(&self, record: Record) -> Result<bool, ReportError> {
        match &self.reporter {
            Some(handle) => handle.append(record).map(|()| true),
            None => Ok(false),
        }
    }

    /// Take the shared lock
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub fn shared_lock(&self) -> &SharedLock {
        &self.lock
    }

    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Mutable snapshot, available only while the root is being curated
    pub fn snapshot_mut(&mut self) -> Option<&mut S> {
        if self.root_phase {
            Some(&mut self.snapshot)
        } else {
            None
        }
    }

    pub fn into_snapshot(self) -> S {
        self.snapshot
    }
}

/// Validate and curate one node
///
/// A curation error is logged with the node's identity and returned as
/// [`NodeOutcome::Failed`]; the caller continues with the next node. Errors
/// for which [`CurationError::is_fatal`] holds are returned as `Err`.
pub fn process<C: Curator>(
    curator: &mut C,
    node: &Container,
    ctx: &mut Context<'_, C::Snapshot>,
) -> Result<NodeOutcome, CuratorError> {
    if !curator.validate(node, ctx) {
        debug!(level = %node.level(), id = %node.id(), "Validation declined, skipping curation");
        return Ok(NodeOutcome::Skipped);
    }

    ctx.root_phase = node.level() == Level::Root;
    let result = curator.curate(node, ctx);
    ctx.root_phase = false;

    match result {
        Ok(()) => Ok(NodeOutcome::Curated),
        Err(e) if e.is_fatal() => {
            error!(
                worker = ?ctx.worker,
                level = %node.level(),
                id = %node.id(),
                label = node.label(),
                error = %e,
                "Fatal curation error"
            );
            Err(e.into())
        }
        Err(e) => {
            warn!(
                worker = ?ctx.worker,
                level = %node.level(),
                id = %node.id(),
                label = node.label(),
                error = %e,
                "Curation failed"
            );
            Ok(NodeOutcome::Failed(e.to_string()))
        }
    }
}
