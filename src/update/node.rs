//! Update-side scene graph: nodes stored in a memory pool, linked into a tree.

use std::collections::HashMap;

use crate::common::memory_pool::{FixedSizeMemoryPool, PoolCounters, PoolKey};
use crate::foundation::core::BufferIndex;
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::property::{PropertyIndex, PropertyValue};
use crate::update::property_owner::{
    AsPropertyOwner, ObserverKey, ObserverRegistry, ObserverSet, OwnerKey, PropertyOwner,
    PropertyOwnerStore, notify_connected, notify_destroyed, notify_disconnected,
};

/// Application-visible node identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Identifier of the scene root, created together with the scene graph.
    pub const ROOT: NodeId = NodeId(0);
}

/// Indices of the properties every node registers, in registration order.
pub mod node_property {
    use crate::update::property::PropertyIndex;

    /// Local position, `Vector3`.
    pub const POSITION: PropertyIndex = PropertyIndex(0);
    /// Local scale, `Vector3`.
    pub const SCALE: PropertyIndex = PropertyIndex(1);
    /// Size, `Vector3`.
    pub const SIZE: PropertyIndex = PropertyIndex(2);
    /// Colour including alpha, `Vector4`.
    pub const COLOR: PropertyIndex = PropertyIndex(3);
}

/// Scene-graph node.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    owner: PropertyOwner,
    parent: Option<OwnerKey>,
    children: Vec<OwnerKey>,
    connected: bool,
    texture: Option<PoolKey>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeId(u32::MAX))
    }
}

impl Node {
    /// Node with the standard property set at identity values.
    pub fn new(id: NodeId) -> Self {
        let mut owner = PropertyOwner::new();
        owner.register_property(PropertyValue::Vector3([0.0; 3]));
        owner.register_property(PropertyValue::Vector3([1.0; 3]));
        owner.register_property(PropertyValue::Vector3([0.0; 3]));
        owner.register_property(PropertyValue::Vector4([1.0; 4]));
        Self {
            id,
            owner,
            parent: None,
            children: Vec::new(),
            connected: false,
            texture: None,
        }
    }

    /// Application-visible id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<OwnerKey> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[OwnerKey] {
        &self.children
    }

    /// Whether the node is reachable from the scene root.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Texture drawn by this node.
    pub fn texture(&self) -> Option<PoolKey> {
        self.texture
    }

    /// Attach or detach the node's texture.
    pub fn set_texture(&mut self, texture: Option<PoolKey>) {
        self.texture = texture;
    }

    /// Read a vector property, padding missing components with zero.
    pub fn vector(&self, buffer: BufferIndex, index: PropertyIndex) -> [f32; 4] {
        match self.owner.get(buffer, index) {
            Ok(PropertyValue::Vector2([x, y])) => [x, y, 0.0, 0.0],
            Ok(PropertyValue::Vector3([x, y, z])) => [x, y, z, 0.0],
            Ok(PropertyValue::Vector4(v)) => v,
            Ok(other) => [other.as_scalar(), 0.0, 0.0, 0.0],
            Err(_) => [0.0; 4],
        }
    }
}

impl AsPropertyOwner for Node {
    fn property_owner(&self) -> &PropertyOwner {
        &self.owner
    }

    fn property_owner_mut(&mut self) -> &mut PropertyOwner {
        &mut self.owner
    }
}

/// Pool of nodes plus the id index and tree topology.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: FixedSizeMemoryPool<Node>,
    ids: HashMap<NodeId, OwnerKey>,
    root: OwnerKey,
    hierarchy_changed: bool,
}

impl SceneGraph {
    /// Scene graph holding only the connected root node.
    pub fn new(counters: PoolCounters) -> TableauResult<Self> {
        let mut nodes = FixedSizeMemoryPool::with_counters(counters);
        let mut root_node = Node::new(NodeId::ROOT);
        root_node.connected = true;
        let root = OwnerKey(nodes.allocate_with(root_node)?);
        let mut ids = HashMap::new();
        ids.insert(NodeId::ROOT, root);
        Ok(Self {
            nodes,
            ids,
            root,
            hierarchy_changed: false,
        })
    }

    /// Key of the root node.
    pub fn root(&self) -> OwnerKey {
        self.root
    }

    /// Create a detached node.
    pub fn add_node(&mut self, id: NodeId) -> TableauResult<OwnerKey> {
        if self.ids.contains_key(&id) {
            return Err(TableauError::validation(format!("{id:?} already exists")));
        }
        let key = OwnerKey(self.nodes.allocate_with(Node::new(id))?);
        self.ids.insert(id, key);
        Ok(key)
    }

    /// Resolve an application id.
    pub fn key_of(&self, id: NodeId) -> Option<OwnerKey> {
        self.ids.get(&id).copied()
    }

    /// Resolve an application id or fail.
    pub fn require(&self, id: NodeId) -> TableauResult<OwnerKey> {
        self.key_of(id)
            .ok_or_else(|| TableauError::invalid_handle(format!("{id:?} does not exist")))
    }

    /// Node behind `key`.
    pub fn node(&self, key: OwnerKey) -> Option<&Node> {
        self.nodes.get(key.0)
    }

    /// Mutable node behind `key`.
    pub fn node_mut(&mut self, key: OwnerKey) -> Option<&mut Node> {
        self.nodes.get_mut(key.0)
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root exists for the graph's whole lifetime.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach `child` under `parent`. A newly reachable subtree is reported as connected.
    pub fn connect_child(
        &mut self,
        parent: OwnerKey,
        child: OwnerKey,
        observers: &mut dyn ObserverSet,
    ) -> TableauResult<()> {
        if parent == child || self.is_ancestor(child, parent) {
            return Err(TableauError::validation("cannot parent a node under itself"));
        }
        let parent_connected = self
            .node(parent)
            .ok_or_else(|| TableauError::invalid_handle("parent node does not exist"))?
            .connected;
        let node = self
            .node_mut(child)
            .ok_or_else(|| TableauError::invalid_handle("child node does not exist"))?;
        if node.parent.is_some() {
            return Err(TableauError::validation("node already has a parent"));
        }
        node.parent = Some(parent);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        self.hierarchy_changed = true;

        if parent_connected {
            for key in self.subtree(child) {
                if let Some(n) = self.node_mut(key) {
                    n.connected = true;
                }
                notify_connected(self, key, observers);
            }
        }
        Ok(())
    }

    /// Detach `child` from its parent. A subtree leaving the scene is reported as disconnected.
    pub fn disconnect_child(
        &mut self,
        buffer: BufferIndex,
        child: OwnerKey,
        observers: &mut dyn ObserverSet,
    ) -> TableauResult<()> {
        let node = self
            .node_mut(child)
            .ok_or_else(|| TableauError::invalid_handle("node does not exist"))?;
        let Some(parent) = node.parent.take() else {
            return Ok(());
        };
        let was_connected = node.connected;
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        self.hierarchy_changed = true;

        if was_connected {
            for key in self.subtree(child) {
                if let Some(n) = self.node_mut(key) {
                    n.connected = false;
                }
                notify_disconnected(self, buffer, key, observers);
            }
        }
        Ok(())
    }

    /// Remove a node. Children are detached first; every observer of the node receives its
    /// destroyed notification before the pool slot is released.
    pub fn destroy_node(
        &mut self,
        buffer: BufferIndex,
        key: OwnerKey,
        observers: &mut dyn ObserverSet,
    ) -> TableauResult<()> {
        if key == self.root {
            return Err(TableauError::validation("the root node cannot be destroyed"));
        }
        let children = self
            .node(key)
            .ok_or_else(|| TableauError::invalid_handle("node does not exist"))?
            .children
            .clone();
        for child in children {
            self.disconnect_child(buffer, child, observers)?;
        }
        self.disconnect_child(buffer, key, observers)?;

        let delivered = notify_destroyed(self, key, observers);
        if let Some(node) = self.nodes.free(key.0) {
            self.ids.remove(&node.id);
            tracing::debug!(id = ?node.id, observers = delivered, "node destroyed");
        }
        self.hierarchy_changed = true;
        Ok(())
    }

    /// Depth-first keys of `start` and its descendants, parents before children.
    pub fn subtree(&self, start: OwnerKey) -> Vec<OwnerKey> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            let Some(node) = self.node(key) else {
                continue;
            };
            out.push(key);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is on the parent chain of `key`.
    pub fn is_ancestor(&self, ancestor: OwnerKey, key: OwnerKey) -> bool {
        let mut cursor = self.node(key).and_then(Node::parent);
        while let Some(k) = cursor {
            if k == ancestor {
                return true;
            }
            cursor = self.node(k).and_then(Node::parent);
        }
        false
    }

    /// World position: local positions accumulated along the parent chain, each scaled by the
    /// accumulated scale of its ancestors.
    pub fn world_position(&self, buffer: BufferIndex, key: OwnerKey) -> [f32; 3] {
        let mut chain = Vec::new();
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let Some(node) = self.node(k) else {
                break;
            };
            chain.push(k);
            cursor = node.parent;
        }

        let mut position = [0.0_f32; 3];
        let mut scale = [1.0_f32; 3];
        for k in chain.into_iter().rev() {
            let Some(node) = self.node(k) else {
                continue;
            };
            let local = node.vector(buffer, node_property::POSITION);
            let local_scale = node.vector(buffer, node_property::SCALE);
            for i in 0..3 {
                position[i] += local[i] * scale[i];
                scale[i] *= local_scale[i];
            }
        }
        position
    }

    /// Consume the hierarchy-changed flag.
    pub fn take_hierarchy_changed(&mut self) -> bool {
        std::mem::take(&mut self.hierarchy_changed)
    }

    /// Iterate over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = (OwnerKey, &Node)> + '_ {
        self.nodes.iter().map(|(k, n)| (OwnerKey(k), n))
    }

    /// Clear every node's updated flag.
    pub fn clear_updated_flags(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.owner.set_updated(false);
        }
    }
}

impl ObserverRegistry for SceneGraph {
    fn add_observer(&mut self, owner: OwnerKey, observer: ObserverKey) -> TableauResult<()> {
        self.nodes.add_observer(owner, observer)
    }

    fn remove_observer(&mut self, owner: OwnerKey, observer: ObserverKey) {
        self.nodes.remove_observer(owner, observer);
    }
}

impl PropertyOwnerStore for SceneGraph {
    fn owner(&self, key: OwnerKey) -> Option<&PropertyOwner> {
        self.nodes.owner(key)
    }

    fn owner_mut(&mut self, key: OwnerKey) -> Option<&mut PropertyOwner> {
        self.nodes.owner_mut(key)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/node.rs"]
mod tests;
