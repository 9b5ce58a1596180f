//! Update-side property notifications: conditions evaluated once per frame.

use crate::common::notifier::NotifyId;
use crate::foundation::core::BufferIndex;
use crate::foundation::error::TableauResult;
use crate::update::property::PropertyIndex;
use crate::update::property_owner::{
    NotifyReturn, ObserverKey, ObserverRegistry, OwnerKey, PropertyOwnerObserver,
    PropertyOwnerStore,
};

/// Condition on the scalar view of a property.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NotifyCondition {
    GreaterThan(f32),
    LessThan(f32),
    /// Strictly between the two bounds.
    Inside(f32, f32),
    /// Outside the closed range between the two bounds.
    Outside(f32, f32),
}

impl NotifyCondition {
    /// Evaluate against `value`.
    pub fn check(self, value: f32) -> bool {
        match self {
            Self::GreaterThan(arg) => value > arg,
            Self::LessThan(arg) => value < arg,
            Self::Inside(min, max) => value > min && value < max,
            Self::Outside(min, max) => value < min || value > max,
        }
    }
}

/// Which validity transitions are reported.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum NotifyMode {
    /// The condition became true.
    #[default]
    NotifyOnTrue,
    /// The condition became false.
    NotifyOnFalse,
    /// Either transition.
    NotifyOnChanged,
}

/// Watches one property and reports validity changes.
#[derive(Clone, Debug)]
pub struct ScenePropertyNotification {
    id: NotifyId,
    owner: Option<OwnerKey>,
    property: PropertyIndex,
    condition: NotifyCondition,
    mode: NotifyMode,
    valid: bool,
}

impl ScenePropertyNotification {
    /// Notification reporting under `id`. Starts with the condition considered false.
    pub fn new(
        id: NotifyId,
        owner: OwnerKey,
        property: PropertyIndex,
        condition: NotifyCondition,
        mode: NotifyMode,
    ) -> Self {
        Self {
            id,
            owner: Some(owner),
            property,
            condition,
            mode,
            valid: false,
        }
    }

    /// Id reported to the application.
    pub fn id(&self) -> NotifyId {
        self.id
    }

    /// Watched owner, `None` once destroyed.
    pub fn owner(&self) -> Option<OwnerKey> {
        self.owner
    }

    /// Last evaluated validity.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Evaluate the condition for `buffer`. Returns the new validity when a reportable change
    /// happened.
    pub fn check<S>(&mut self, buffer: BufferIndex, store: &S) -> TableauResult<Option<bool>>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let Some(owner) = self.owner.and_then(|key| store.owner(key)) else {
            return Ok(None);
        };
        let value = owner.get(buffer, self.property)?.as_scalar();
        let valid = self.condition.check(value);
        if valid == self.valid {
            return Ok(None);
        }
        self.valid = valid;
        let report = match self.mode {
            NotifyMode::NotifyOnTrue => valid,
            NotifyMode::NotifyOnFalse => !valid,
            NotifyMode::NotifyOnChanged => true,
        };
        Ok(report.then_some(valid))
    }
}

impl PropertyOwnerObserver for ScenePropertyNotification {
    fn property_owner_connected(&mut self, _owner: OwnerKey) {}

    fn property_owner_disconnected(
        &mut self,
        _buffer: BufferIndex,
        _owner: OwnerKey,
        _registry: &mut dyn ObserverRegistry,
    ) -> NotifyReturn {
        NotifyReturn::KeepObserving
    }

    fn property_owner_destroyed(&mut self, _owner: OwnerKey, _registry: &mut dyn ObserverRegistry) {
        self.owner = None;
    }
}

/// Registered property notifications, in registration order.
#[derive(Clone, Debug, Default)]
pub struct PropertyNotificationSet {
    entries: Vec<(u32, ScenePropertyNotification)>,
    next_slot: u32,
}

impl PropertyNotificationSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `notification` and start observing its owner.
    pub fn add(
        &mut self,
        notification: ScenePropertyNotification,
        registry: &mut dyn ObserverRegistry,
    ) -> TableauResult<()> {
        let slot = self.next_slot;
        if let Some(owner) = notification.owner {
            registry.add_observer(owner, ObserverKey::PropertyNotification(slot))?;
        }
        self.next_slot = self.next_slot.wrapping_add(1);
        self.entries.push((slot, notification));
        Ok(())
    }

    /// Unregister the notification reporting under `id`.
    pub fn remove(&mut self, id: NotifyId, registry: &mut dyn ObserverRegistry) -> bool {
        let Some(pos) = self.entries.iter().position(|(_, n)| n.id == id) else {
            return false;
        };
        let (slot, notification) = self.entries.remove(pos);
        if let Some(owner) = notification.owner {
            registry.remove_observer(owner, ObserverKey::PropertyNotification(slot));
        }
        true
    }

    /// Evaluate every notification; returns `(id, validity)` for each reportable change.
    pub fn check_all<S>(&mut self, buffer: BufferIndex, store: &S) -> Vec<(NotifyId, bool)>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let mut out = Vec::new();
        for (_, notification) in &mut self.entries {
            match notification.check(buffer, store) {
                Ok(Some(valid)) => out.push((notification.id, valid)),
                Ok(None) => {}
                Err(err) => tracing::warn!(id = ?notification.id, %err, "property check failed"),
            }
        }
        out
    }

    /// Number of registered notifications.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether none are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Notification registered under `key`, as an observer.
    pub fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        let ObserverKey::PropertyNotification(slot) = key else {
            return None;
        };
        self.entries
            .iter_mut()
            .find(|(s, _)| *s == slot)
            .map(|(_, n)| n as &mut dyn PropertyOwnerObserver)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/property_notification.rs"]
mod tests;
