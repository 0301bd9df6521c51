//! Container types for the curated hierarchy
//!
//! These types represent nodes fetched from a hierarchy store and the
//! minimal references used to hand nodes across a worker boundary.

use crate::error::{ConfigError, StoreResult};
use crate::hierarchy::HierarchyStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rank of a container in the hierarchy
///
/// Declaration order is rank order: `Root < Group < ... < Output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Level {
    Root = 0,
    Group = 1,
    SubGroup = 2,
    LeafGroup = 3,
    Leaf = 4,
    Output = 5,
}

impl Level {
    /// All levels in rank order
    pub const ALL: [Level; 6] = [
        Level::Root,
        Level::Group,
        Level::SubGroup,
        Level::LeafGroup,
        Level::Leaf,
        Level::Output,
    ];

    /// Levels that may be enumerated below this one, in enumeration order
    ///
    /// Attached items come first, then the subordinate group level.
    pub fn child_levels(self) -> &'static [Level] {
        match self {
            Level::Root => &[Level::Leaf, Level::Output, Level::Group],
            Level::Group => &[Level::Leaf, Level::Output, Level::SubGroup],
            Level::SubGroup => &[Level::Leaf, Level::Output, Level::LeafGroup],
            Level::LeafGroup => &[Level::Leaf, Level::Output],
            Level::Leaf | Level::Output => &[],
        }
    }

    /// Check if `child` is a valid accessor for this level
    pub fn accepts_child(self, child: Level) -> bool {
        self.child_levels().contains(&child)
    }

    /// Terminal levels never have children
    pub fn is_terminal(self) -> bool {
        matches!(self, Level::Leaf | Level::Output)
    }

    /// Convert from database value
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Get database integer representation
    pub fn as_db_int(self) -> i64 {
        self as u8 as i64
    }

    /// Lowercase name used in logs, reports and the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Root => "root",
            Level::Group => "group",
            Level::SubGroup => "subgroup",
            Level::LeafGroup => "leafgroup",
            Level::Leaf => "leaf",
            Level::Output => "output",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownLevel(s.to_string()))
    }
}

/// Opaque container identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A container fetched from a hierarchy store
///
/// Containers are plain data. Children are never cached on the node; they are
/// enumerated on demand through the store that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    id: NodeId,
    level: Level,
    label: String,
    parent: Option<(Level, NodeId)>,
    #[serde(default)]
    info: serde_json::Map<String, serde_json::Value>,
}

impl Container {
    /// Create a container without a parent (a hierarchy root)
    pub fn root(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: Level::Root,
            label: label.into(),
            parent: None,
            info: serde_json::Map::new(),
        }
    }

    /// Create a container attached to a parent
    pub fn child(
        id: impl Into<NodeId>,
        level: Level,
        label: impl Into<String>,
        parent: &Container,
    ) -> Self {
        Self {
            id: id.into(),
            level,
            label: label.into(),
            parent: Some((parent.level, parent.id.clone())),
            info: serde_json::Map::new(),
        }
    }

    /// Assemble a container from stored parts
    pub fn from_parts(
        id: NodeId,
        level: Level,
        label: String,
        parent: Option<(Level, NodeId)>,
        info: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id,
            level,
            label,
            parent,
            info,
        }
    }

    /// Attach an info payload
    pub fn with_info(mut self, info: serde_json::Map<String, serde_json::Value>) -> Self {
        self.info = info;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&(Level, NodeId)> {
        self.parent.as_ref()
    }

    pub fn info(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.info
    }

    /// Build the transferable reference for this container
    pub fn work_ref(&self) -> WorkRef {
        WorkRef {
            level: self.level,
            id: self.id.clone(),
            parent: self.parent.clone(),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.level, self.label, self.id)
    }
}

/// Minimal stand-in for a container that can cross a worker boundary
///
/// Holds no connection state. Resolve it with a store owned by the worker
/// that will use the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkRef {
    pub level: Level,
    pub id: NodeId,
    pub parent: Option<(Level, NodeId)>,
}

impl WorkRef {
    /// Reference to a hierarchy root
    pub fn root(id: impl Into<NodeId>) -> Self {
        Self {
            level: Level::Root,
            id: id.into(),
            parent: None,
        }
    }

    /// Fetch a fresh container for this reference
    pub fn resolve(&self, store: &dyn HierarchyStore) -> StoreResult<Container> {
        store.fetch(self.level, &self.id)
    }
}

impl fmt::Display for WorkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level, self.id)
    }
}
