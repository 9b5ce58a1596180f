//! Application-side registry of frame callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::error::{TableauError, TableauResult};
use crate::update::frame_callback::{FrameCallbackLink, InterfaceId, SharedFrameCallbackInterface};

/// Links handed to the update side, keyed by interface identity.
#[derive(Debug, Default)]
pub struct FrameCallbackRegistry {
    links: HashMap<InterfaceId, Arc<FrameCallbackLink>>,
}

impl FrameCallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `interface`. An interface can be registered once at a time.
    pub fn add(
        &mut self,
        interface: SharedFrameCallbackInterface,
    ) -> TableauResult<Arc<FrameCallbackLink>> {
        let id = InterfaceId::of(&interface);
        if self.contains(id) {
            return Err(TableauError::validation("frame callback is already registered"));
        }
        let link = FrameCallbackLink::new(interface);
        // Replaces a link the update side invalidated.
        self.links.insert(id, Arc::clone(&link));
        Ok(link)
    }

    /// Invalidate and forget the link for `id`. Once this returns the interface is not called
    /// again. A link the update side already invalidated (its root node was destroyed) is
    /// dropped and reported as absent.
    pub fn remove(&mut self, id: InterfaceId) -> Option<Arc<FrameCallbackLink>> {
        let link = self.links.remove(&id)?;
        let was_valid = link.is_valid();
        link.invalidate();
        was_valid.then_some(link)
    }

    /// Whether `id` is linked and still callable.
    pub fn contains(&self, id: InterfaceId) -> bool {
        self.links.get(&id).is_some_and(|link| link.is_valid())
    }

    /// Callable links.
    pub fn len(&self) -> usize {
        self.links.values().filter(|link| link.is_valid()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget links invalidated by the update side.
    pub fn prune(&mut self) {
        self.links.retain(|_, link| link.is_valid());
    }
}

impl Drop for FrameCallbackRegistry {
    fn drop(&mut self) {
        for link in self.links.values() {
            link.invalidate();
        }
    }
}
