//! Scene access handed to frame callbacks.

use std::collections::{HashMap, VecDeque};

use crate::foundation::core::BufferIndex;
use crate::update::node::{NodeId, SceneGraph, node_property};
use crate::update::property::{PropertyIndex, PropertyValue};
use crate::update::property_owner::{OwnerKey, PropertyOwnerStore};
use crate::update::resetter::{ResetRequest, ResetterLifetime};

/// Resolves node ids within one subtree, caching hits until the hierarchy changes.
#[derive(Clone, Debug, Default)]
pub struct SceneGraphTraveler {
    root: Option<OwnerKey>,
    cache: HashMap<NodeId, OwnerKey>,
}

impl SceneGraphTraveler {
    /// Traveler restricted to `root` and its descendants; `None` covers the whole scene.
    pub fn new(root: Option<OwnerKey>) -> Self {
        Self {
            root,
            cache: HashMap::new(),
        }
    }

    /// Subtree root, `None` for the global traveler.
    pub fn root(&self) -> Option<OwnerKey> {
        self.root
    }

    /// Find `id` inside the subtree.
    pub fn find_node(&mut self, graph: &SceneGraph, id: NodeId) -> Option<OwnerKey> {
        if let Some(key) = self.cache.get(&id) {
            if graph.node(*key).is_some_and(|n| n.id() == id) {
                return Some(*key);
            }
            self.cache.remove(&id);
        }
        let key = graph.key_of(id)?;
        let inside = match self.root {
            Some(root) => key == root || graph.is_ancestor(root, key),
            None => true,
        };
        if !inside {
            return None;
        }
        self.cache.insert(id, key);
        Some(key)
    }

    /// Drop cached lookups.
    pub fn node_hierarchy_changed(&mut self) {
        self.cache.clear();
    }

    /// Number of cached lookups.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Per-callback proxy state that survives between frames.
#[derive(Clone, Debug, Default)]
pub struct UpdateProxyState {
    root: Option<NodeId>,
    sync_points: VecDeque<u32>,
}

impl UpdateProxyState {
    /// State for a callback rooted at `root`.
    pub fn new(root: Option<NodeId>) -> Self {
        Self {
            root,
            sync_points: VecDeque::new(),
        }
    }

    /// Queue a sync point sent by the application.
    pub fn push_sync_point(&mut self, sync_point: u32) {
        self.sync_points.push_back(sync_point);
    }

    /// Sync points not yet consumed.
    pub fn pending_sync_points(&self) -> usize {
        self.sync_points.len()
    }
}

/// Node access for one frame-callback invocation.
///
/// Writes go straight into the update buffer. `set_*` values last one frame and `bake_*` values
/// become the new base; both queue the resetter needed to restore the other buffer.
pub struct UpdateProxy<'a> {
    graph: &'a mut SceneGraph,
    traveler: &'a mut SceneGraphTraveler,
    state: &'a mut UpdateProxyState,
    resets: &'a mut Vec<ResetRequest>,
    buffer: BufferIndex,
}

impl<'a> UpdateProxy<'a> {
    pub(crate) fn new(
        graph: &'a mut SceneGraph,
        traveler: &'a mut SceneGraphTraveler,
        state: &'a mut UpdateProxyState,
        resets: &'a mut Vec<ResetRequest>,
        buffer: BufferIndex,
    ) -> Self {
        Self {
            graph,
            traveler,
            state,
            resets,
            buffer,
        }
    }

    /// Root of the callback's subtree, `None` for global callbacks.
    pub fn root(&self) -> Option<NodeId> {
        self.state.root
    }

    /// Oldest sync point sent to this callback that has not been read yet.
    pub fn pop_sync_point(&mut self) -> Option<u32> {
        self.state.sync_points.pop_front()
    }

    /// Local position.
    pub fn position(&mut self, id: NodeId) -> Option<[f32; 3]> {
        self.vector3(id, node_property::POSITION)
    }

    /// Set the local position for this frame.
    pub fn set_position(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::POSITION, PropertyValue::Vector3(value), false)
    }

    /// Bake the local position.
    pub fn bake_position(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::POSITION, PropertyValue::Vector3(value), true)
    }

    /// Local scale.
    pub fn scale(&mut self, id: NodeId) -> Option<[f32; 3]> {
        self.vector3(id, node_property::SCALE)
    }

    /// Set the local scale for this frame.
    pub fn set_scale(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::SCALE, PropertyValue::Vector3(value), false)
    }

    /// Bake the local scale.
    pub fn bake_scale(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::SCALE, PropertyValue::Vector3(value), true)
    }

    /// Size.
    pub fn size(&mut self, id: NodeId) -> Option<[f32; 3]> {
        self.vector3(id, node_property::SIZE)
    }

    /// Set the size for this frame.
    pub fn set_size(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::SIZE, PropertyValue::Vector3(value), false)
    }

    /// Bake the size.
    pub fn bake_size(&mut self, id: NodeId, value: [f32; 3]) -> bool {
        self.write(id, node_property::SIZE, PropertyValue::Vector3(value), true)
    }

    /// Colour.
    pub fn color(&mut self, id: NodeId) -> Option<[f32; 4]> {
        let key = self.traveler.find_node(self.graph, id)?;
        Some(self.graph.node(key)?.vector(self.buffer, node_property::COLOR))
    }

    /// Set the colour for this frame.
    pub fn set_color(&mut self, id: NodeId, value: [f32; 4]) -> bool {
        self.write(id, node_property::COLOR, PropertyValue::Vector4(value), false)
    }

    /// Bake the colour.
    pub fn bake_color(&mut self, id: NodeId, value: [f32; 4]) -> bool {
        self.write(id, node_property::COLOR, PropertyValue::Vector4(value), true)
    }

    /// World position of a node.
    pub fn world_position(&mut self, id: NodeId) -> Option<[f32; 3]> {
        let key = self.traveler.find_node(self.graph, id)?;
        Some(self.graph.world_position(self.buffer, key))
    }

    fn vector3(&mut self, id: NodeId, property: PropertyIndex) -> Option<[f32; 3]> {
        let key = self.traveler.find_node(self.graph, id)?;
        let [x, y, z, _] = self.graph.node(key)?.vector(self.buffer, property);
        Some([x, y, z])
    }

    fn write(&mut self, id: NodeId, property: PropertyIndex, value: PropertyValue, bake: bool) -> bool {
        let Some(key) = self.traveler.find_node(self.graph, id) else {
            return false;
        };
        let Some(owner) = self.graph.owner_mut(key) else {
            return false;
        };
        let written = if bake {
            owner.bake(self.buffer, property, value)
        } else {
            owner.set(self.buffer, property, value)
        };
        if written.is_err() {
            return false;
        }
        self.resets.push(ResetRequest {
            owner: key,
            property,
            lifetime: if bake {
                ResetterLifetime::Bake
            } else {
                ResetterLifetime::Set
            },
        });
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/update_proxy.rs"]
mod tests;
