//! Update-side list of frame callbacks and the travelers they resolve nodes with.

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::core::BufferIndex;
use crate::foundation::error::TableauResult;
use crate::update::frame_callback::{FrameCallback, FrameCallbackLink, InterfaceId, RequestFlags};
use crate::update::node::{NodeId, SceneGraph};
use crate::update::property_owner::{ObserverKey, ObserverRegistry, OwnerKey, PropertyOwnerObserver};
use crate::update::resetter::ResetRequest;
use crate::update::update_proxy::SceneGraphTraveler;

/// Runs registered frame callbacks in registration order.
#[derive(Debug, Default)]
pub struct FrameCallbackProcessor {
    callbacks: Vec<FrameCallback>,
    travelers: HashMap<OwnerKey, SceneGraphTraveler>,
    global_traveler: SceneGraphTraveler,
    next_slot: u32,
    hierarchy_changed: bool,
}

impl FrameCallbackProcessor {
    /// Empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `root` (`None` for the whole scene).
    pub fn add_frame_callback(
        &mut self,
        link: Arc<FrameCallbackLink>,
        root: Option<NodeId>,
        graph: &mut SceneGraph,
    ) -> TableauResult<()> {
        let root_key = root.map(|id| graph.require(id)).transpose()?;
        let key = ObserverKey::FrameCallback(self.next_slot);
        self.next_slot = self.next_slot.wrapping_add(1);

        let callback = FrameCallback::new(link, root_key, root, key);
        callback.connect(graph)?;
        if let Some(root_key) = root_key {
            self.travelers
                .entry(root_key)
                .or_insert_with(|| SceneGraphTraveler::new(Some(root_key)));
        }
        self.callbacks.push(callback);
        Ok(())
    }

    /// Unregister and invalidate the callback for `id`. Returns whether it was registered.
    pub fn remove_frame_callback(
        &mut self,
        id: InterfaceId,
        registry: &mut dyn ObserverRegistry,
    ) -> bool {
        let Some(pos) = self.callbacks.iter().position(|c| c.id() == id) else {
            return false;
        };
        let callback = self.callbacks.remove(pos);
        callback.invalidate();
        callback.release(registry);
        self.prune_travelers();
        true
    }

    /// Deliver a sync point to the callback for `id`.
    pub fn notify_frame_callback(&mut self, id: InterfaceId, sync_point: u32) -> bool {
        match self.callbacks.iter_mut().find(|c| c.id() == id) {
            Some(callback) => {
                callback.notify(sync_point);
                true
            }
            None => false,
        }
    }

    /// Flag the scene hierarchy as changed; consumed by the next [`Self::update`].
    pub fn node_hierarchy_changed(&mut self) {
        self.hierarchy_changed = true;
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback. Callbacks that stop asking to be called are removed. Returns whether
    /// any callback requested another frame.
    pub fn update(
        &mut self,
        buffer: BufferIndex,
        elapsed_seconds: f32,
        graph: &mut SceneGraph,
        resets: &mut Vec<ResetRequest>,
    ) -> bool {
        let hierarchy_changed = std::mem::take(&mut self.hierarchy_changed);
        if hierarchy_changed {
            self.global_traveler.node_hierarchy_changed();
        }

        let mut keep_rendering = false;
        let mut finished = Vec::new();
        for (index, callback) in self.callbacks.iter_mut().enumerate() {
            let traveler = match callback.root() {
                Some(root) => self
                    .travelers
                    .entry(root)
                    .or_insert_with(|| SceneGraphTraveler::new(Some(root))),
                None => &mut self.global_traveler,
            };
            let flags = callback.update(
                buffer,
                elapsed_seconds,
                hierarchy_changed,
                graph,
                traveler,
                resets,
            );
            keep_rendering |= flags.contains(RequestFlags::KEEP_RENDERING);
            if !flags.contains(RequestFlags::CONTINUE_CALLING) {
                finished.push(index);
            }
        }

        for index in finished.into_iter().rev() {
            let callback = self.callbacks.remove(index);
            callback.invalidate();
            callback.release(graph);
            tracing::debug!(id = ?callback.id(), "frame callback removed");
        }
        self.prune_travelers();
        keep_rendering
    }

    /// Callback registered under `key`, as an observer.
    pub fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        self.callbacks
            .iter_mut()
            .find(|c| c.observer_key() == key)
            .map(|c| c as &mut dyn PropertyOwnerObserver)
    }

    fn prune_travelers(&mut self) {
        let callbacks = &self.callbacks;
        self.travelers
            .retain(|root, _| callbacks.iter().any(|c| c.root() == Some(*root)));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/frame_callback_processor.rs"]
mod tests;
