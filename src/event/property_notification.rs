//! Application-side property notification handles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::common::notifier::{NotifierMapper, NotifyId};
use crate::event::core::{Core, EventShared};
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::messages::{NodeProperty, UpdateMessage};
use crate::update::property_notification::{NotifyCondition, NotifyMode};

type NotifyCallback = Box<dyn FnMut(bool) + Send>;

pub(crate) struct PropertyNotificationInner {
    id: NotifyId,
    target: NodeProperty,
    condition: NotifyCondition,
    mode: NotifyMode,
    shared: Weak<EventShared>,
    validity: AtomicBool,
    notified: AtomicUsize,
    callbacks: Mutex<Vec<NotifyCallback>>,
}

impl std::fmt::Debug for PropertyNotificationInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyNotificationInner")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("condition", &self.condition)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl PropertyNotificationInner {
    pub(crate) fn emit(&self, validity: bool) {
        self.validity.store(validity, Ordering::Relaxed);
        self.notified.fetch_add(1, Ordering::Relaxed);
        let mut callbacks =
            std::mem::take(&mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner));
        for callback in &mut callbacks {
            callback(validity);
        }
        let mut slot = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        callbacks.append(&mut slot);
        *slot = callbacks;
    }
}

impl Drop for PropertyNotificationInner {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if let Err(err) = shared.send(UpdateMessage::RemovePropertyNotification(self.id)) {
            tracing::trace!(id = ?self.id, %err, "property notification dropped after shutdown");
        }
        if let Some(mut manager) = shared.try_property_notifications() {
            manager.property_notification_destroyed(self.id);
        }
    }
}

/// Watches a node property on the update side and reports when its condition changes.
///
/// The notification is removed from the update side when the last clone is dropped.
#[derive(Clone, Debug, Default)]
pub struct PropertyNotification {
    inner: Option<Arc<PropertyNotificationInner>>,
}

impl PropertyNotification {
    pub fn new(
        core: &Core,
        target: NodeProperty,
        condition: NotifyCondition,
        mode: NotifyMode,
    ) -> TableauResult<Self> {
        let shared = core.shared();
        let inner = {
            let mut manager = shared.property_notifications();
            let id = manager.next_id();
            let inner = Arc::new(PropertyNotificationInner {
                id,
                target,
                condition,
                mode,
                shared: Arc::downgrade(shared),
                validity: AtomicBool::new(false),
                notified: AtomicUsize::new(0),
                callbacks: Mutex::new(Vec::new()),
            });
            manager.property_notification_created(&inner);
            inner
        };
        shared.send(UpdateMessage::AddPropertyNotification {
            id: inner.id,
            target,
            condition,
            mode,
        })?;
        Ok(Self { inner: Some(inner) })
    }

    fn inner(&self) -> TableauResult<&Arc<PropertyNotificationInner>> {
        self.inner
            .as_ref()
            .ok_or_else(|| TableauError::invalid_handle("property notification handle is empty"))
    }

    pub fn id(&self) -> Option<NotifyId> {
        self.inner.as_ref().map(|inner| inner.id)
    }

    pub fn target(&self) -> TableauResult<NodeProperty> {
        Ok(self.inner()?.target)
    }

    pub fn condition(&self) -> TableauResult<NotifyCondition> {
        Ok(self.inner()?.condition)
    }

    pub fn mode(&self) -> TableauResult<NotifyMode> {
        Ok(self.inner()?.mode)
    }

    /// Called with the new validity on every reported transition.
    pub fn on_notify<F>(&self, callback: F) -> TableauResult<()>
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.inner()?
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
        Ok(())
    }

    /// Validity carried by the last delivered notification.
    pub fn validity(&self) -> TableauResult<bool> {
        Ok(self.inner()?.validity.load(Ordering::Relaxed))
    }

    /// Notifications delivered so far; `0` for an empty handle.
    pub fn notify_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.notified.load(Ordering::Relaxed))
    }
}

/// Routes update-side validity reports to live handles.
#[derive(Debug, Default)]
pub struct PropertyNotificationManager {
    notifications: NotifierMapper<PropertyNotificationInner>,
}

impl PropertyNotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self) -> NotifyId {
        self.notifications.next_id()
    }

    pub(crate) fn property_notification_created(&mut self, inner: &Arc<PropertyNotificationInner>) {
        self.notifications.register_with_id(inner.id, inner);
    }

    pub fn property_notification_destroyed(&mut self, id: NotifyId) {
        self.notifications.unregister(id);
    }

    /// The handle to signal for `id`; unknown or dropped ids are ignored.
    pub(crate) fn notify_property(
        &mut self,
        id: NotifyId,
        validity: bool,
    ) -> Option<Arc<PropertyNotificationInner>> {
        let target = self.notifications.lookup(id);
        if target.is_none() {
            tracing::trace!(?id, validity, "notification for a dropped property notification");
        }
        target
    }

    pub fn prune(&mut self) {
        self.notifications.prune();
    }

    /// Registered entries, including not yet pruned ones.
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/event/property_notification.rs"]
mod tests;
