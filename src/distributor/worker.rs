//! Worker thread logic for distributed curation
//!
//! Each worker:
//! - Opens its own store connection (connections never cross threads)
//! - Resolves its assigned work references into fresh containers
//! - Walks the assigned subtrees and curates every node yielded
//! - Sends records to the shared report writer

use crate::config::{AdmissionFn, CurateConfig};
use crate::curator::{process, Context, Curator, NodeOutcome, SharedLock};
use crate::error::{CuratorError, StoreError, WorkerError};
use crate::hierarchy::{Connect, Container, HierarchyStore, WorkRef};
use crate::report::{OutcomeHandle, OutcomeStatus, ReportHandle};
use crate::walker::{TraversalOrder, Walker};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Nodes yielded by the worker's walkers
    pub visited: AtomicU64,

    /// Nodes curated successfully
    pub curated: AtomicU64,

    /// Nodes declined by `validate`
    pub skipped: AtomicU64,

    /// Nodes whose curation failed
    pub failed: AtomicU64,

    /// Work references or reloads that no longer resolved
    pub unresolved: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &NodeOutcome) {
        self.visited.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            NodeOutcome::Curated => &self.curated,
            NodeOutcome::Skipped => &self.skipped,
            NodeOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unresolved(&self) {
        self.unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            visited: self.visited.load(Ordering::Relaxed),
            curated: self.curated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`WorkerStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub visited: u64,
    pub curated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub unresolved: u64,
}

impl std::ops::AddAssign for StatsSnapshot {
    fn add_assign(&mut self, other: Self) {
        self.visited += other.visited;
        self.curated += other.curated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unresolved += other.unresolved;
    }
}

/// Handles every worker shares
#[derive(Clone)]
pub struct WorkerShared {
    pub config: Arc<CurateConfig>,
    pub lock: SharedLock,
    pub reporter: Option<ReportHandle>,
    pub outcomes: Option<OutcomeHandle>,
}

/// A worker thread curating a fixed set of subtrees
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<Result<(), WorkerError>>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    ///
    /// The curator and snapshot are moved into the thread; the caller keeps
    /// its own copies.
    pub fn spawn<K, C>(
        id: usize,
        connector: Arc<K>,
        assignment: Vec<WorkRef>,
        curator: C,
        snapshot: C::Snapshot,
        shared: WorkerShared,
    ) -> Result<Self, WorkerError>
    where
        K: Connect + 'static,
        C: Curator,
    {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("curator-{}", id))
            .spawn(move || {
                worker_loop(id, connector, assignment, curator, snapshot, shared, stats_clone)
            })
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: panic_message(payload.as_ref()),
                }),
            },
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Aggregate statistics from all workers
pub fn aggregate_stats<'a, I>(workers: I) -> StatsSnapshot
where
    I: IntoIterator<Item = &'a Worker>,
{
    let mut total = StatsSnapshot::default();
    for worker in workers {
        total += worker.stats().snapshot();
    }
    total
}

/// Main worker loop
fn worker_loop<K, C>(
    id: usize,
    connector: Arc<K>,
    assignment: Vec<WorkRef>,
    mut curator: C,
    snapshot: C::Snapshot,
    shared: WorkerShared,
    stats: Arc<WorkerStats>,
) -> Result<(), WorkerError>
where
    K: Connect,
    C: Curator,
{
    info!(worker = id, assigned = assignment.len(), "Worker starting");

    let store = connector.connect().map_err(|e| {
        error!(worker = id, error = %e, "Failed to connect to store");
        WorkerError::InitFailed {
            id,
            reason: e.to_string(),
        }
    })?;

    let config = &shared.config;
    let mut ctx = Context::new(&store, snapshot, Arc::clone(&shared.lock))
        .with_worker(id)
        .with_reporter(shared.reporter.clone());
    let sink = Sink {
        worker: Some(id),
        stats: &stats,
        outcomes: shared.outcomes.as_ref(),
    };

    let result = curate_assignment(&store, &assignment, &mut curator, &mut ctx, config, &sink);

    if let Err(e) = result {
        error!(
            worker = id,
            error = %e,
            "Worker aborted; remaining assignment left unprocessed"
        );
        return Err(WorkerError::Fatal {
            id,
            reason: e.to_string(),
        });
    }

    let totals = stats.snapshot();
    info!(
        worker = id,
        visited = totals.visited,
        curated = totals.curated,
        failed = totals.failed,
        "Worker finished"
    );
    Ok(())
}

/// Resolve and walk every assigned subtree
fn curate_assignment<C: Curator>(
    store: &dyn HierarchyStore,
    assignment: &[WorkRef],
    curator: &mut C,
    ctx: &mut Context<'_, C::Snapshot>,
    config: &CurateConfig,
    sink: &Sink<'_>,
) -> Result<(), CuratorError> {
    let mut roots = Vec::with_capacity(assignment.len());
    for work in assignment {
        match work.resolve(store) {
            Ok(container) => roots.push(container),
            Err(e) => sink.unresolved(&e)?,
        }
    }
    let admission = config.admission_override.as_ref();

    match config.traversal_order {
        // Each subtree runs to completion before the next
        TraversalOrder::DepthFirst => {
            for root in roots {
                let mut walker = Walker::seeded(
                    store,
                    config.traversal_order,
                    config.stop_level,
                    config.reload,
                    [root],
                );
                drive(&mut walker, curator, ctx, admission, sink)?;
            }
        }
        // One frontier so level order holds across this worker's subtrees
        TraversalOrder::BreadthFirst => {
            let mut walker = Walker::seeded(
                store,
                config.traversal_order,
                config.stop_level,
                config.reload,
                roots,
            );
            drive(&mut walker, curator, ctx, admission, sink)?;
        }
    }
    Ok(())
}

/// Where a walk's per-node results go
pub(crate) struct Sink<'a> {
    pub worker: Option<usize>,
    pub stats: &'a WorkerStats,
    pub outcomes: Option<&'a OutcomeHandle>,
}

impl Sink<'_> {
    pub fn node(&self, node: &Container, outcome: &NodeOutcome) -> Result<(), CuratorError> {
        self.stats.record(outcome);
        if let Some(log) = self.outcomes {
            let (status, detail) = match outcome {
                NodeOutcome::Curated => (OutcomeStatus::Curated, ""),
                NodeOutcome::Skipped => (OutcomeStatus::Skipped, ""),
                NodeOutcome::Failed(reason) => (OutcomeStatus::Failed, reason.as_str()),
            };
            log.record(self.worker, node, status, detail)?;
        }
        Ok(())
    }

    pub fn unresolved(&self, e: &StoreError) -> Result<(), CuratorError> {
        self.stats.record_unresolved();
        warn!(worker = ?self.worker, error = %e, "Skipping node that no longer resolves");
        if let (Some(log), StoreError::NotFound { level, id }) = (self.outcomes, e) {
            log.unresolved(self.worker, *level, id, &e.to_string())?;
        }
        Ok(())
    }
}

/// Curate every node a walker yields
///
/// Node-level failures are recorded and skipped. Only errors that must abort
/// the worker are returned.
pub(crate) fn drive<C: Curator>(
    walker: &mut Walker<'_>,
    curator: &mut C,
    ctx: &mut Context<'_, C::Snapshot>,
    admission: Option<&AdmissionFn>,
    sink: &Sink<'_>,
) -> Result<(), CuratorError> {
    loop {
        let next = walker.advance(|node| match admission {
            Some(admit) => admit(node),
            None => curator.validate(node, ctx),
        });
        match next {
            None => break,
            Some(Ok(node)) => {
                let outcome = process(curator, &node, ctx)?;
                trace!(worker = ?sink.worker, level = %node.level(), id = %node.id(), ?outcome, "Processed node");
                sink.node(&node, &outcome)?;
            }
            Some(Err(e)) => sink.unresolved(&e)?,
        }
    }

    let stats = walker.stats();
    debug!(
        worker = ?sink.worker,
        yielded = stats.yielded,
        expanded = stats.expanded,
        pruned = stats.pruned,
        expand_failures = stats.expand_failures,
        "Walker drained"
    );
    Ok(())
}
