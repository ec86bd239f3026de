//! Identity to node multiplexing.
//!
//! One item may be shown by any number of live nodes. [`NodeIdentityIndex`]
//! owns the nodes of a tree and keeps the one-to-many relation from item
//! identity to node, so an item notification can reach every node showing
//! that item.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::SlotMap;

use checktree_core::logging::targets;

use super::router::NodeProperty;
use super::tree_node::{NodeId, TreeNode};
use crate::model::ItemValue;

#[derive(Default)]
struct Registry {
    nodes: SlotMap<NodeId, Arc<TreeNode>>,
    by_identity: HashMap<String, Vec<NodeId>>,
}

/// Live nodes of one tree, keyed by id and by item identity.
///
/// The registry lock is never held while a node is updated, so a node's
/// listeners may create or destroy nodes.
#[derive(Default)]
pub struct NodeIdentityIndex {
    registry: RwLock<Registry>,
}

impl NodeIdentityIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the node built by `build`, which receives the node's id.
    pub fn insert(&self, build: impl FnOnce(NodeId) -> TreeNode) -> Arc<TreeNode> {
        let mut registry = self.registry.write();
        let id = registry.nodes.insert_with_key(|id| Arc::new(build(id)));
        let node = Arc::clone(&registry.nodes[id]);
        registry
            .by_identity
            .entry(node.identity().to_string())
            .or_default()
            .push(id);
        tracing::trace!(target: targets::TREE, identity = node.identity(), ?id, "node registered");
        node
    }

    /// Unregisters a node.
    pub fn remove(&self, id: NodeId) -> Option<Arc<TreeNode>> {
        let mut registry = self.registry.write();
        let node = registry.nodes.remove(id)?;
        if let Some(ids) = registry.by_identity.get_mut(node.identity()) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                registry.by_identity.remove(node.identity());
            }
        }
        tracing::trace!(target: targets::TREE, identity = node.identity(), ?id, "node unregistered");
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<TreeNode>> {
        self.registry.read().nodes.get(id).cloned()
    }

    /// Every node bound to `identity`. Empty if the item is not shown.
    pub fn nodes_for(&self, identity: &str) -> Vec<Arc<TreeNode>> {
        let registry = self.registry.read();
        registry
            .by_identity
            .get(identity)
            .into_iter()
            .flatten()
            .filter_map(|id| registry.nodes.get(*id).cloned())
            .collect()
    }

    /// Ids of the nodes bound to `identity`.
    pub fn ids_for(&self, identity: &str) -> Vec<NodeId> {
        self.registry
            .read()
            .by_identity
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// Applies `property = value` to every node bound to `identity` and
    /// returns how many nodes were updated.
    pub fn broadcast(&self, identity: &str, property: NodeProperty, value: &ItemValue) -> usize {
        let nodes = self.nodes_for(identity);
        for node in &nodes {
            node.apply(property, value);
        }
        tracing::trace!(target: targets::TREE, identity, ?property, nodes = nodes.len(), "broadcast");
        nodes.len()
    }

    /// Every live node.
    pub fn all(&self) -> Vec<Arc<TreeNode>> {
        self.registry.read().nodes.values().cloned().collect()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.registry.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().nodes.is_empty()
    }

    /// Removes every node.
    pub fn clear(&self) -> Vec<Arc<TreeNode>> {
        let mut registry = self.registry.write();
        registry.by_identity.clear();
        registry.nodes.drain().map(|(_, node)| node).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, ItemAttributes};
    use parking_lot::Mutex;

    fn add(index: &NodeIdentityIndex, item: &Item) -> Arc<TreeNode> {
        index.insert(|id| TreeNode::new(id, item.clone(), item.identity().to_string(), None))
    }

    #[test]
    fn test_broadcast_without_nodes_is_noop() {
        let index = NodeIdentityIndex::new();
        assert_eq!(index.broadcast("ghost", NodeProperty::Label, &"x".into()), 0);
        assert!(index.nodes_for("ghost").is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_node() {
        let index = NodeIdentityIndex::new();
        let item = Item::new("shared", ItemAttributes::new());
        let other = Item::new("other", ItemAttributes::new());

        let received = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let node = add(&index, &item);
            let sink = received.clone();
            node.property_changed.connect(move |(_, value)| sink.lock().push(value.clone()));
        }
        let bystander = add(&index, &other);

        let updated = index.broadcast("shared", NodeProperty::Label, &"Shared".into());
        assert_eq!(updated, 3);
        assert_eq!(*received.lock(), vec![ItemValue::from("Shared"); 3]);
        assert_eq!(bystander.label(), "");
    }

    #[test]
    fn test_listener_may_unregister_during_broadcast() {
        let index = Arc::new(NodeIdentityIndex::new());
        let item = Item::new("shared", ItemAttributes::new());
        let first = add(&index, &item);
        let second = add(&index, &item);

        let weak = Arc::downgrade(&index);
        let doomed = second.id();
        first.property_changed.connect(move |_| {
            if let Some(index) = weak.upgrade() {
                index.remove(doomed);
            }
        });

        assert_eq!(index.broadcast("shared", NodeProperty::Label, &"Shared".into()), 2);
        assert_eq!(index.ids_for("shared"), vec![first.id()]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_single_node() {
        let index = NodeIdentityIndex::new();
        let item = Item::new("shared", ItemAttributes::new());
        let first = add(&index, &item);
        let second = add(&index, &item);

        assert!(index.remove(first.id()).is_some());
        assert!(index.remove(first.id()).is_none());
        assert_eq!(index.ids_for("shared"), vec![second.id()]);

        index.remove(second.id());
        assert!(index.ids_for("shared").is_empty());
        assert!(index.is_empty());
    }
}
