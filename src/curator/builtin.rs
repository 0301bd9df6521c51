//! Curators shipped with the command-line tool

use crate::curator::{Context, Curator};
use crate::error::CurationError;
use crate::hierarchy::{Container, Level, NodeId};
use crate::report::Record;
use std::collections::HashMap;
use tracing::info;

/// Names accepted by `--curator`
pub const BUILTIN_NAMES: [&str; 2] = [PrintHierarchy::NAME, ContainerPath::NAME];

fn indent(level: Level) -> String {
    "  ".repeat(level as usize)
}

/// Logs every container as an indented tree line
///
/// When reporting is enabled, also writes one `{level, id, label, msg}` row
/// per container listing the leaf items attached to it.
#[derive(Debug, Clone, Default)]
pub struct PrintHierarchy;

impl PrintHierarchy {
    pub const NAME: &'static str = "print-hierarchy";
}

impl Curator for PrintHierarchy {
    type Snapshot = ();

    fn curate(&mut self, node: &Container, ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
        info!("{}{} {}", indent(node.level()), node.level(), node.label());
        if ctx.reporter().is_none() {
            return Ok(());
        }

        let msg = if node.level().accepts_child(Level::Leaf) {
            let leaves = ctx.store().children(node, Level::Leaf)?;
            let names: Vec<&str> = leaves.iter().map(|l| l.label()).collect();
            format!("{} {}: found items {}", node.level(), node.label(), names.join(" "))
        } else {
            format!("{} {}", node.level(), node.label())
        };

        ctx.report(
            Record::new()
                .field("level", node.level().as_str())
                .field("id", node.id().as_str())
                .field("label", node.label())
                .field("msg", msg),
        )?;
        Ok(())
    }
}

/// Root identity captured while curating the root
#[derive(Debug, Clone, Default)]
pub struct RootLabel {
    pub id: Option<NodeId>,
    pub label: String,
}

/// Reports the slash-separated label path of every container
///
/// Ancestor labels are fetched through the worker's own connection and
/// cached on the curator, so each worker keeps its own cache.
#[derive(Debug, Clone, Default)]
pub struct ContainerPath {
    cache: HashMap<NodeId, String>,
}

impl ContainerPath {
    pub const NAME: &'static str = "container-path";

    /// Resolve the label path of `node`
    fn path_of(&mut self, node: &Container, ctx: &Context<'_, RootLabel>) -> Result<String, CurationError> {
        if let Some(path) = self.cache.get(node.id()) {
            return Ok(path.clone());
        }

        let root = ctx.snapshot();
        let mut labels = vec![node.label().to_string()];
        let mut parent = node.parent().cloned();
        let prefix = loop {
            let Some((level, id)) = parent else {
                break None;
            };
            if let Some(path) = self.cache.get(&id) {
                break Some(path.clone());
            }
            if root.id.as_ref() == Some(&id) {
                break Some(root.label.clone());
            }
            let ancestor = ctx.store().fetch(level, &id)?;
            labels.push(ancestor.label().to_string());
            parent = ancestor.parent().cloned();
        };

        labels.reverse();
        let path = prefix.into_iter().chain(labels).collect::<Vec<_>>().join("/");
        if !node.level().is_terminal() {
            self.cache.insert(node.id().clone(), path.clone());
        }
        Ok(path)
    }
}

impl Curator for ContainerPath {
    type Snapshot = RootLabel;

    fn curate(&mut self, node: &Container, ctx: &mut Context<'_, RootLabel>) -> Result<(), CurationError> {
        if let Some(root) = ctx.snapshot_mut() {
            root.id = Some(node.id().clone());
            root.label = node.label().to_string();
        }

        let path = self.path_of(node, ctx)?;
        let reported = ctx.report(
            Record::new()
                .field("level", node.level().as_str())
                .field("id", node.id().as_str())
                .field("label", node.label())
                .field("path", path.as_str()),
        )?;
        if !reported {
            info!("{}", path);
        }
        Ok(())
    }
}
