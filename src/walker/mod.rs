//! Hierarchy walker
//!
//! A [`Walker`] owns a [`Frontier`] of pending containers and a borrowed store
//! connection. Each call to [`Walker::advance`] removes one container and,
//! when it is admitted and above the stop level, enumerates its children onto
//! the frontier before returning it.
//!
//! ```text
//!   frontier: [A, B]            depth-first          breadth-first
//!                               pop B, push Bc        pop A, push Ac
//!   R ── A ── Ac                visit order:          visit order:
//!    └── B ── Bc                R, B, Bc, A, Ac       R, A, B, Ac, Bc
//! ```
//!
//! Walkers are single-use. They hold no locks and never share their
//! connection with another thread.

pub mod frontier;

pub use frontier::{Frontier, FrontierStats, TraversalOrder};

use crate::error::StoreError;
use crate::hierarchy::{enumerate_children, Container, HierarchyStore, Level};
use tracing::{debug, warn};

/// Counters kept by a walker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkerStats {
    /// Containers returned by `advance`
    pub yielded: u64,

    /// Containers whose children were enumerated
    pub expanded: u64,

    /// Non-terminal containers returned without enumerating children
    pub pruned: u64,

    /// Containers appended to the frontier
    pub enqueued: u64,

    /// Child enumerations that failed against the store
    pub expand_failures: u64,

    /// Containers that no longer resolved on reload
    pub unresolved: u64,
}

/// Depth-first or breadth-first walker over one store connection
pub struct Walker<'s> {
    store: &'s dyn HierarchyStore,
    frontier: Frontier,
    stop_level: Option<Level>,
    reload: bool,
    stats: WalkerStats,
}

impl<'s> Walker<'s> {
    /// Create an empty walker
    pub fn new(
        store: &'s dyn HierarchyStore,
        order: TraversalOrder,
        stop_level: Option<Level>,
        reload: bool,
    ) -> Self {
        Self {
            store,
            frontier: Frontier::new(order),
            stop_level,
            reload,
            stats: WalkerStats::default(),
        }
    }

    /// Create a walker whose frontier starts with `roots`
    pub fn seeded<I>(
        store: &'s dyn HierarchyStore,
        order: TraversalOrder,
        stop_level: Option<Level>,
        reload: bool,
        roots: I,
    ) -> Self
    where
        I: IntoIterator<Item = Container>,
    {
        let mut walker = Self::new(store, order, stop_level, reload);
        walker.extend(roots);
        walker
    }

    /// Append containers to the frontier in the given order
    pub fn extend<I>(&mut self, containers: I)
    where
        I: IntoIterator<Item = Container>,
    {
        let before = self.frontier.stats().enqueued;
        self.frontier.extend(containers);
        self.stats.enqueued += self.frontier.stats().enqueued - before;
    }

    /// Remove and return the next container
    ///
    /// Returns `None` once the frontier is empty. A container that fails to
    /// re-fetch under `reload` is returned as `Some(Err(..))` and dropped;
    /// its children are never enumerated.
    pub fn advance<F>(&mut self, mut admit: F) -> Option<Result<Container, StoreError>>
    where
        F: FnMut(&Container) -> bool,
    {
        let popped = self.frontier.pop()?;

        let node = if self.reload {
            match self.store.fetch(popped.level(), popped.id()) {
                Ok(fresh) => fresh,
                Err(e) => {
                    self.stats.unresolved += 1;
                    debug!(level = %popped.level(), id = %popped.id(), error = %e, "Reload failed");
                    return Some(Err(e));
                }
            }
        } else {
            popped
        };

        if self.expandable(&node) && admit(&node) {
            match self.children_of(&node) {
                Ok(children) => {
                    self.stats.expanded += 1;
                    self.extend(children);
                }
                Err(e) => {
                    self.stats.expand_failures += 1;
                    warn!(
                        level = %node.level(),
                        id = %node.id(),
                        error = %e,
                        "Failed to enumerate children, returning node unexpanded"
                    );
                }
            }
        } else if !node.level().is_terminal() {
            self.stats.pruned += 1;
        }

        self.stats.yielded += 1;
        Some(Ok(node))
    }

    /// Lazily advance until the frontier is exhausted
    pub fn drain<F>(self, admit: F) -> Drain<'s, F>
    where
        F: FnMut(&Container) -> bool,
    {
        Drain {
            walker: self,
            admit,
        }
    }

    /// Consume the walker and return the pending frontier in append order
    pub fn into_pending(self) -> Vec<Container> {
        self.frontier.into_pending()
    }

    pub fn order(&self) -> TraversalOrder {
        self.frontier.order()
    }

    pub fn stop_level(&self) -> Option<Level> {
        self.stop_level
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn stats(&self) -> WalkerStats {
        self.stats
    }

    /// Whether this container may have its children enumerated
    fn expandable(&self, node: &Container) -> bool {
        let level = node.level();
        !level.is_terminal() && self.stop_level.map_or(true, |stop| level < stop)
    }

    /// Enumerate children, skipping levels past the stop level
    fn children_of(&self, node: &Container) -> Result<Vec<Container>, StoreError> {
        enumerate_children(self.store, node, self.stop_level)
    }
}

/// Iterator returned by [`Walker::drain`]
pub struct Drain<'s, F> {
    walker: Walker<'s>,
    admit: F,
}

impl<F> Drain<'_, F> {
    /// Statistics of the underlying walker so far
    pub fn stats(&self) -> WalkerStats {
        self.walker.stats()
    }
}

impl<F> Iterator for Drain<'_, F>
where
    F: FnMut(&Container) -> bool,
{
    type Item = Result<Container, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walker.advance(&mut self.admit)
    }
}

impl<F> std::iter::FusedIterator for Drain<'_, F> where F: FnMut(&Container) -> bool {}
