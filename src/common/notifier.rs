//! Routing of update-side notifications back to application-side objects.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Token assigned to a trackable object at creation and carried by update-side messages.
///
/// Ids grow monotonically and are never reused by a given mapper.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NotifyId(pub u32);

/// Table from [`NotifyId`] to the application object that owns it.
///
/// Entries hold weak references, so the table never keeps an object alive. A lookup for an id
/// whose object has been unregistered or dropped returns `None`; callers treat that as an already
/// delivered notification.
#[derive(Debug)]
pub struct NotifierMapper<T: ?Sized> {
    next_id: u32,
    entries: BTreeMap<NotifyId, Weak<T>>,
}

impl<T: ?Sized> Default for NotifierMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> NotifierMapper<T> {
    /// Empty table; the first id handed out is `NotifyId(1)`.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Reserve a fresh id without registering a target yet.
    pub fn next_id(&mut self) -> NotifyId {
        let id = NotifyId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Register `target` under a fresh id.
    pub fn register(&mut self, target: &Arc<T>) -> NotifyId {
        let id = self.next_id();
        self.entries.insert(id, Arc::downgrade(target));
        id
    }

    /// Register `target` under an id obtained from [`NotifierMapper::next_id`].
    pub fn register_with_id(&mut self, id: NotifyId, target: &Arc<T>) {
        self.entries.insert(id, Arc::downgrade(target));
    }

    /// Remove `id`. Returns whether it was present.
    pub fn unregister(&mut self, id: NotifyId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Resolve `id`, pruning the entry when its target is gone.
    pub fn lookup(&mut self, id: NotifyId) -> Option<Arc<T>> {
        let target = self.entries.get(&id)?.upgrade();
        if target.is_none() {
            tracing::trace!(?id, "pruning notifier entry for dropped target");
            self.entries.remove(&id);
        }
        target
    }

    /// Whether `id` is registered (its target may still have been dropped).
    pub fn contains(&self, id: NotifyId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Drop every entry whose target no longer exists.
    pub fn prune(&mut self) {
        self.entries.retain(|_, w| w.strong_count() > 0);
    }

    /// Number of registered entries, including not yet pruned ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live targets in registration order.
    pub fn live_targets(&self) -> impl Iterator<Item = (NotifyId, Arc<T>)> + '_ {
        self.entries
            .iter()
            .filter_map(|(id, w)| w.upgrade().map(|t| (*id, t)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/common/notifier.rs"]
mod tests;
