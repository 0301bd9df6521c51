//! Run distributor - orchestrates a curation run
//!
//! ```text
//!   Init ──▶ RootCurated ──▶ Partitioned ──▶ WorkersRunning ──▶ Joined ──▶ Finalized
//!    │           │               │                 │               │           │
//!  fetch      curate root    round-robin       curator-0..W     join all    report
//!  root       in caller      root children     own connection   workers     shutdown
//! ```
//!
//! With one worker the middle phases collapse into a single walk in the
//! calling thread.
//!
//! Ordering holds within a worker only. Records from different workers reach
//! the report in any interleaving, and breadth-first order is per worker, not
//! global.

pub mod worker;

pub use worker::{StatsSnapshot, Worker, WorkerStats};

use crate::config::CurateConfig;
use crate::curator::{process, shared_lock, Context, Curator};
use crate::error::{Result, WorkerError};
use crate::hierarchy::{Connect, Container, WorkRef};
use crate::report::outcome::outcomes_path;
use crate::report::{OutcomeLog, Reporter};
use crate::walker::Walker;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use worker::{aggregate_stats, drive, Sink, WorkerShared};

/// Progress interval for the polling loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    RootCurated,
    Partitioned,
    WorkersRunning,
    Joined,
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::RootCurated => "root-curated",
            Phase::Partitioned => "partitioned",
            Phase::WorkersRunning => "workers-running",
            Phase::Joined => "joined",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Assign work references to `workers` slots round-robin
///
/// The reference at index `i` goes to slot `i % workers`. Always returns
/// `workers` slots (at least one), some possibly empty.
pub fn partition<I>(refs: I, workers: usize) -> Vec<Vec<WorkRef>>
where
    I: IntoIterator<Item = WorkRef>,
{
    let workers = workers.max(1);
    let mut slots = vec![Vec::new(); workers];
    for (i, work) in refs.into_iter().enumerate() {
        slots[i % workers].push(work);
    }
    slots
}

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed,
    Failed(String),
}

/// Exit record for one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub id: usize,
    pub assigned: usize,
    pub status: WorkerStatus,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Nodes yielded by walkers, root included
    pub visited: u64,

    /// Nodes curated successfully
    pub curated: u64,

    /// Nodes declined by validation
    pub skipped: u64,

    /// Nodes whose curation failed
    pub failed: u64,

    /// Nodes that no longer resolved
    pub unresolved: u64,

    /// Workers spawned (0 in single-thread mode)
    pub workers: usize,

    /// Workers that ended in a fatal error or panic
    pub failed_workers: usize,

    /// Per-worker exit records
    pub exits: Vec<WorkerExit>,

    /// Records written to the report
    pub records: u64,

    /// Time taken for the run
    pub duration: Duration,
}

impl RunResult {
    pub fn status(&self) -> RunStatus {
        if self.failed_workers == 0 {
            RunStatus::Clean
        } else {
            RunStatus::WorkersFailed(self.failed_workers)
        }
    }
}

/// Overall exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every worker finished its assignment (node failures may still exist)
    Clean,
    /// This many workers ended early
    WorkersFailed(usize),
}

impl RunStatus {
    pub fn is_clean(self) -> bool {
        self == RunStatus::Clean
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub phase: Phase,
    pub totals: StatsSnapshot,
    pub active_workers: usize,
    pub total_workers: usize,
    pub elapsed: Duration,
}

impl RunProgress {
    /// Nodes visited per second
    pub fn nodes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.totals.visited as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates a curation run over one hierarchy
pub struct Distributor<K> {
    connector: Arc<K>,
    config: Arc<CurateConfig>,
    phase: Phase,
}

impl<K: Connect + 'static> Distributor<K> {
    pub fn new(connector: K, config: CurateConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config: Arc::new(config),
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &CurateConfig {
        &self.config
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
    }

    /// Run the curation
    pub fn run<C: Curator>(&mut self, root: WorkRef, curator: C) -> Result<RunResult> {
        self.run_with_progress(root, curator, |_| {})
    }

    /// Run the curation, calling `progress` periodically from this thread
    pub fn run_with_progress<C, F>(
        &mut self,
        root: WorkRef,
        mut curator: C,
        mut progress: F,
    ) -> Result<RunResult>
    where
        C: Curator,
        F: FnMut(&RunProgress),
    {
        self.config.validate()?;
        let start = Instant::now();
        let config = Arc::clone(&self.config);
        let workers = config.worker_count;

        info!(
            root = %root,
            workers = workers,
            order = ?config.traversal_order,
            stop_level = ?config.stop_level,
            "Starting curation run"
        );

        let store = self.connector.connect()?;
        let root_node = root.resolve(&store)?;

        // Single producer writes in place; workers share one writer thread
        let (reporter, outcome_log) = match &config.report {
            Some(rc) => {
                let reporter = if workers == 1 {
                    Reporter::direct_at(&rc.path, None)?
                } else {
                    Reporter::spawn_at(&rc.path, None, rc.batch_size, rc.channel_size)?
                };
                let outcomes = if !rc.outcomes {
                    None
                } else if workers == 1 {
                    Some(OutcomeLog::direct_at(&outcomes_path(&rc.path))?)
                } else {
                    Some(OutcomeLog::spawn_at(&outcomes_path(&rc.path), rc.batch_size, rc.channel_size)?)
                };
                (Some(reporter), outcomes)
            }
            None => (None, None),
        };
        let report_handle = reporter.as_ref().map(Reporter::handle);
        let outcome_handle = outcome_log.as_ref().map(OutcomeLog::handle);
        let lock = shared_lock();
        let main_stats = WorkerStats::default();
        let sink = Sink {
            worker: None,
            stats: &main_stats,
            outcomes: outcome_handle.as_ref(),
        };

        // Root curation runs once, here, before anything is partitioned
        let mut ctx = Context::new(&store, C::Snapshot::default(), Arc::clone(&lock))
            .with_reporter(report_handle.clone());
        let outcome = process(&mut curator, &root_node, &mut ctx)?;
        sink.node(&root_node, &outcome)?;
        self.enter(Phase::RootCurated);

        let mut walker = Walker::seeded(
            &store,
            config.traversal_order,
            config.stop_level,
            config.reload,
            [root_node],
        );
        // Expands the root exactly as any later node would be expanded
        let admission = config.admission_override.as_ref();
        let expanded = walker.advance(|node| match admission {
            Some(admit) => admit(node),
            None => curator.validate(node, &ctx),
        });
        if let Some(Err(e)) = expanded {
            sink.unresolved(&e)?;
        }

        let mut exits = Vec::new();
        if workers == 1 {
            debug!("Single worker: walking in the calling thread");
            drive(&mut walker, &mut curator, &mut ctx, admission, &sink)?;
            drop(ctx);
            progress(&RunProgress {
                phase: self.phase,
                totals: main_stats.snapshot(),
                active_workers: 0,
                total_workers: 0,
                elapsed: start.elapsed(),
            });
        } else {
            let pending = walker.into_pending();
            let slots = partition(pending.iter().map(Container::work_ref), workers);
            self.enter(Phase::Partitioned);

            let snapshot = ctx.into_snapshot();
            let shared = WorkerShared {
                config: Arc::clone(&config),
                lock: Arc::clone(&lock),
                reporter: report_handle.clone(),
                outcomes: outcome_handle.clone(),
            };

            let mut running = Vec::with_capacity(workers);
            let mut spawn_failures = Vec::new();
            for (id, assignment) in slots.into_iter().enumerate() {
                let assigned = assignment.len();
                match Worker::spawn(
                    id,
                    Arc::clone(&self.connector),
                    assignment,
                    curator.clone(),
                    snapshot.clone(),
                    shared.clone(),
                ) {
                    Ok(worker) => running.push((worker, assigned)),
                    Err(e) => {
                        error!(worker = id, error = %e, "Failed to spawn worker");
                        spawn_failures.push(WorkerExit {
                            id,
                            assigned,
                            status: WorkerStatus::Failed(e.to_string()),
                        });
                    }
                }
            }
            drop(shared);
            self.enter(Phase::WorkersRunning);
            info!(count = running.len(), "Workers spawned");

            // Poll until every worker has exited
            loop {
                let active = running.iter().filter(|(w, _)| !w.is_finished()).count();
                let mut totals = main_stats.snapshot();
                totals += aggregate_stats(running.iter().map(|(w, _)| w));
                progress(&RunProgress {
                    phase: self.phase,
                    totals,
                    active_workers: active,
                    total_workers: running.len(),
                    elapsed: start.elapsed(),
                });
                if active == 0 {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }

            exits = join_workers(running, &main_stats);
            exits.extend(spawn_failures);
            exits.sort_by_key(|exit| exit.id);
            self.enter(Phase::Joined);
        }

        // Exactly one shutdown per report, after every producer is done
        drop(report_handle);
        drop(outcome_handle);
        let records = match reporter {
            Some(reporter) => reporter.finish()?,
            None => 0,
        };
        if let Some(log) = outcome_log {
            log.finish()?;
        }
        self.enter(Phase::Finalized);

        let totals = main_stats.snapshot();
        let failed_workers = exits
            .iter()
            .filter(|exit| exit.status != WorkerStatus::Completed)
            .count();
        let result = RunResult {
            visited: totals.visited,
            curated: totals.curated,
            skipped: totals.skipped,
            failed: totals.failed,
            unresolved: totals.unresolved,
            workers: exits.len(),
            failed_workers,
            exits,
            records,
            duration: start.elapsed(),
        };

        info!(
            visited = result.visited,
            curated = result.curated,
            failed = result.failed,
            unresolved = result.unresolved,
            failed_workers = result.failed_workers,
            duration_secs = result.duration.as_secs_f64(),
            "Curation run completed"
        );
        Ok(result)
    }
}

/// Join every worker, folding its statistics into `totals`
fn join_workers(running: Vec<(Worker, usize)>, totals: &WorkerStats) -> Vec<WorkerExit> {
    fold_into(totals, aggregate_stats(running.iter().map(|(w, _)| w)));

    running
        .into_iter()
        .map(|(worker, assigned)| {
            let id = worker.id();
            let status = match worker.join() {
                Ok(()) => WorkerStatus::Completed,
                Err(e) => {
                    log_worker_failure(&e);
                    WorkerStatus::Failed(e.to_string())
                }
            };
            WorkerExit {
                id,
                assigned,
                status,
            }
        })
        .collect()
}

fn log_worker_failure(e: &WorkerError) {
    error!(worker = e.worker_id(), error = %e, "Worker failed; its remaining assignment was not processed");
}

fn fold_into(totals: &WorkerStats, add: StatsSnapshot) {
    use std::sync::atomic::Ordering;
    totals.visited.fetch_add(add.visited, Ordering::Relaxed);
    totals.curated.fetch_add(add.curated, Ordering::Relaxed);
    totals.skipped.fetch_add(add.skipped, Ordering::Relaxed);
    totals.failed.fetch_add(add.failed, Ordering::Relaxed);
    totals.unresolved.fetch_add(add.unresolved, Ordering::Relaxed);
}

/// Curate the hierarchy under `root` and report how the workers ended
pub fn run<K, C>(connector: K, root: WorkRef, curator: C, config: CurateConfig) -> Result<RunStatus>
where
    K: Connect + 'static,
    C: Curator,
{
    let mut distributor = Distributor::new(connector, config);
    Ok(distributor.run(root, curator)?.status())
}
