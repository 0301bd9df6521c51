//! Traversal frontier
//!
//! Pending containers owned by one walker. Appends always go to the back;
//! removal is from the back (stack, depth-first) or the front (queue,
//! breadth-first).

use crate::hierarchy::Container;
use std::collections::VecDeque;

/// Order in which the frontier releases containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Stack: the most recently appended container comes out first
    #[default]
    DepthFirst,
    /// Queue: the least recently appended container comes out first
    BreadthFirst,
}

impl TraversalOrder {
    pub fn is_depth_first(self) -> bool {
        self == TraversalOrder::DepthFirst
    }
}

/// Statistics for a frontier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrontierStats {
    /// Total containers appended
    pub enqueued: u64,

    /// Total containers removed
    pub dequeued: u64,

    /// Largest number of pending containers seen
    pub high_water: usize,
}

/// Ordered, mutable sequence of pending containers
#[derive(Debug)]
pub struct Frontier {
    pending: VecDeque<Container>,
    order: TraversalOrder,
    stats: FrontierStats,
}

impl Frontier {
    /// Create an empty frontier
    pub fn new(order: TraversalOrder) -> Self {
        Self {
            pending: VecDeque::new(),
            order,
            stats: FrontierStats::default(),
        }
    }

    /// Append one container
    pub fn push(&mut self, container: Container) {
        self.pending.push_back(container);
        self.stats.enqueued += 1;
        self.stats.high_water = self.stats.high_water.max(self.pending.len());
    }

    /// Append many containers, preserving their order
    pub fn extend<I>(&mut self, containers: I)
    where
        I: IntoIterator<Item = Container>,
    {
        for container in containers {
            self.push(container);
        }
    }

    /// Remove the next container according to the traversal order
    pub fn pop(&mut self) -> Option<Container> {
        let next = match self.order {
            TraversalOrder::DepthFirst => self.pending.pop_back(),
            TraversalOrder::BreadthFirst => self.pending.pop_front(),
        };
        if next.is_some() {
            self.stats.dequeued += 1;
        }
        next
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> FrontierStats {
        self.stats
    }

    /// Pending containers in append order
    pub fn into_pending(self) -> Vec<Container> {
        self.pending.into()
    }
}
