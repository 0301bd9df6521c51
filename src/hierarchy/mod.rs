//! Hierarchy store access
//!
//! A hierarchy is a fixed-depth tree of typed containers:
//!
//! ```text
//! Root
//! ├── Leaf / Output items
//! └── Group
//!     ├── Leaf / Output items
//!     └── SubGroup
//!         ├── Leaf / Output items
//!         └── LeafGroup
//!             └── Leaf / Output items
//! ```
//!
//! The walker and workers only see the store through [`HierarchyStore`].
//! Connections are never shared between workers: each worker asks the
//! [`Connect`] implementation for its own store and resolves [`WorkRef`]s
//! against it.
//!
//! # Example
//!
//! ```
//! use hierarchy_curator::hierarchy::{Connect, HierarchyStore, Level, MemoryTree};
//!
//! let mut tree = MemoryTree::new("p1", "Project");
//! let root = tree.root_id().clone();
//! let sub = tree.add(&root, "s1", Level::Group, "sub-01").unwrap();
//! tree.add(&sub, "f1", Level::Leaf, "notes.txt").unwrap();
//!
//! let store = tree.into_store().connect().unwrap();
//! let root = store.fetch(Level::Root, &"p1".into()).unwrap();
//! let groups = store.children(&root, Level::Group).unwrap();
//! assert_eq!(groups[0].label(), "sub-01");
//! ```

pub mod memory;
pub mod sqlite;
pub mod types;

use crate::error::StoreResult;

pub use memory::{MemoryStore, MemoryTree};
pub use sqlite::{SqliteConnector, SqliteStore};
pub use types::{Container, Level, NodeId, WorkRef};

/// Read/write access to a remote hierarchy
///
/// Implementations must be safe to use repeatedly and from independent
/// connections at the same time.
pub trait HierarchyStore {
    /// Fetch a container by level and id
    ///
    /// Fails with [`StoreError::NotFound`](crate::error::StoreError::NotFound)
    /// if the id no longer resolves.
    fn fetch(&self, level: Level, id: &NodeId) -> StoreResult<Container>;

    /// Enumerate the immediate children of `parent` at `level`
    ///
    /// `level` must be one of `parent.level().child_levels()`.
    fn children(&self, parent: &Container, level: Level) -> StoreResult<Vec<Container>>;

    /// Set a key in a container's info payload
    fn update_info(
        &self,
        level: Level,
        id: &NodeId,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()>;

    /// Short description for logs
    fn describe(&self) -> String {
        "hierarchy store".to_string()
    }
}

/// Opens private store connections for workers
pub trait Connect: Send + Sync {
    type Store: HierarchyStore;

    /// Open a new, independent connection
    fn connect(&self) -> StoreResult<Self::Store>;
}

/// Enumerate the children of `parent` in enumeration order
///
/// Attached Leaf items first, then Output items, then the subordinate groups.
/// Child levels deeper than `stop_level` are not queried.
pub fn enumerate_children(
    store: &dyn HierarchyStore,
    parent: &Container,
    stop_level: Option<Level>,
) -> StoreResult<Vec<Container>> {
    let mut children = Vec::new();
    for &level in parent.level().child_levels() {
        if stop_level.is_some_and(|stop| level > stop) {
            continue;
        }
        children.extend(store.children(parent, level)?);
    }
    Ok(children)
}
