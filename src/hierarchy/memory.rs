//! In-memory hierarchy store
//!
//! Every connection handed out by a [`MemoryStore`] shares the same tree, the
//! way independent connections to a remote service see the same data.
//! Used by tests, benchmarks and fixture validation.

use crate::error::{StoreError, StoreResult};
use crate::hierarchy::{Connect, Container, HierarchyStore, Level, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Slot {
    container: Container,
    children: Vec<NodeId>,
}

/// Builder for an in-memory hierarchy
#[derive(Debug, Clone)]
pub struct MemoryTree {
    root: NodeId,
    slots: HashMap<NodeId, Slot>,
}

impl MemoryTree {
    /// Start a tree with its root container
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        let root = Container::root(id, label);
        let root_id = root.id().clone();
        let mut slots = HashMap::new();
        slots.insert(
            root_id.clone(),
            Slot {
                container: root,
                children: Vec::new(),
            },
        );
        Self {
            root: root_id,
            slots,
        }
    }

    /// Id of the root container
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Attach a child container and return its id
    ///
    /// Children are enumerated in the order they were added.
    pub fn add(
        &mut self,
        parent: &NodeId,
        id: impl Into<NodeId>,
        level: Level,
        label: impl Into<String>,
    ) -> StoreResult<NodeId> {
        self.add_container(parent, id.into(), level, label.into(), serde_json::Map::new())
    }

    /// Attach a child container carrying an info payload
    pub fn add_container(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        level: Level,
        label: String,
        info: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<NodeId> {
        let parent_slot = self.slots.get(parent).ok_or_else(|| StoreError::NotFound {
            level: Level::Root,
            id: parent.clone(),
        })?;
        let parent_level = parent_slot.container.level();
        if !parent_level.accepts_child(level) {
            return Err(StoreError::InvalidAccessor {
                parent: parent_level,
                child: level,
            });
        }
        if self.slots.contains_key(&id) {
            return Err(StoreError::Corrupt {
                id: id.to_string(),
                reason: "duplicate id".into(),
            });
        }

        let container = Container::child(id.clone(), level, label, &parent_slot.container)
            .with_info(info);
        self.slots.insert(
            id.clone(),
            Slot {
                container,
                children: Vec::new(),
            },
        );
        if let Some(slot) = self.slots.get_mut(parent) {
            slot.children.push(id.clone());
        }
        Ok(id)
    }

    /// Number of containers in the tree, root included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Freeze the tree into a shareable store
    pub fn into_store(self) -> MemoryStore {
        MemoryStore {
            tree: Arc::new(RwLock::new(self)),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Shared in-memory store; clones are independent connections to one tree
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: Arc<RwLock<MemoryTree>>,
    fetches: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Delete a container and its subtree
    ///
    /// Simulates a deletion between enumeration and resolution.
    pub fn remove(&self, id: &NodeId) -> bool {
        let mut tree = self.tree.write();
        let Some(slot) = tree.slots.remove(id) else {
            return false;
        };

        if let Some((_, parent_id)) = slot.container.parent() {
            if let Some(parent) = tree.slots.get_mut(parent_id) {
                parent.children.retain(|child| child != id);
            }
        }

        let mut pending = slot.children;
        while let Some(child) = pending.pop() {
            if let Some(removed) = tree.slots.remove(&child) {
                pending.extend(removed.children);
            }
        }
        true
    }

    /// Change a container's label in place
    pub fn set_label(&self, id: &NodeId, label: &str) -> StoreResult<()> {
        let mut tree = self.tree.write();
        let slot = tree.slots.get_mut(id).ok_or_else(|| StoreError::NotFound {
            level: Level::Root,
            id: id.clone(),
        })?;
        let c = &slot.container;
        slot.container = Container::from_parts(
            c.id().clone(),
            c.level(),
            label.to_string(),
            c.parent().cloned(),
            c.info().clone(),
        );
        Ok(())
    }

    /// Number of `fetch` calls served across all connections
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of containers currently stored
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }
}

impl HierarchyStore for MemoryStore {
    fn fetch(&self, level: Level, id: &NodeId) -> StoreResult<Container> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let tree = self.tree.read();
        match tree.slots.get(id) {
            Some(slot) if slot.container.level() == level => Ok(slot.container.clone()),
            _ => Err(StoreError::NotFound {
                level,
                id: id.clone(),
            }),
        }
    }

    fn children(&self, parent: &Container, level: Level) -> StoreResult<Vec<Container>> {
        if !parent.level().accepts_child(level) {
            return Err(StoreError::InvalidAccessor {
                parent: parent.level(),
                child: level,
            });
        }

        let tree = self.tree.read();
        let slot = tree.slots.get(parent.id()).ok_or_else(|| StoreError::NotFound {
            level: parent.level(),
            id: parent.id().clone(),
        })?;

        Ok(slot
            .children
            .iter()
            .filter_map(|id| tree.slots.get(id))
            .map(|child| &child.container)
            .filter(|child| child.level() == level)
            .cloned()
            .collect())
    }

    fn update_info(
        &self,
        level: Level,
        id: &NodeId,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        let mut tree = self.tree.write();
        let slot = match tree.slots.get_mut(id) {
            Some(slot) if slot.container.level() == level => slot,
            _ => {
                return Err(StoreError::NotFound {
                    level,
                    id: id.clone(),
                })
            }
        };
        let c = &slot.container;
        let mut info = c.info().clone();
        info.insert(key.to_string(), value);
        slot.container = Container::from_parts(
            c.id().clone(),
            c.level(),
            c.label().to_string(),
            c.parent().cloned(),
            info,
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory store ({} containers)", self.len())
    }
}

impl Connect for MemoryStore {
    type Store = MemoryStore;

    fn connect(&self) -> StoreResult<MemoryStore> {
        Ok(self.clone())
    }
}
