//! Observable scene-graph entities and the observer protocol.
//!
//! Owners keep an ordered list of [`ObserverKey`]s. Observers live in their own arenas and are
//! reached through an [`ObserverSet`], so an owner never holds a reference into observer memory
//! and a stale key simply resolves to nothing.

use smallvec::SmallVec;

use crate::common::memory_pool::{FixedSizeMemoryPool, PoolKey};
use crate::foundation::core::BufferIndex;
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::property::{AnimatableProperty, PropertyIndex, PropertyValue};

/// Handle to an owner inside its pool.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct OwnerKey(pub PoolKey);

/// Handle to an observer inside the arena of its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObserverKey {
    Constraint(PoolKey),
    Resetter(PoolKey),
    FrameCallback(u32),
    PropertyNotification(u32),
    /// Observers managed outside the update manager (tests, embedders).
    External(u32),
}

/// Verdict returned by an observer when its owner is disconnected from the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyReturn {
    KeepObserving,
    StopObserving,
}

/// Edge bookkeeping available to observers while a notification is being delivered.
pub trait ObserverRegistry {
    /// Start observing `owner`. Registering the same observer twice is a logic error.
    fn add_observer(&mut self, owner: OwnerKey, observer: ObserverKey) -> TableauResult<()>;

    /// Stop observing `owner`. No-op when the edge is already gone.
    fn remove_observer(&mut self, owner: OwnerKey, observer: ObserverKey);
}

/// Reactions to owner lifecycle events.
pub trait PropertyOwnerObserver {
    /// `owner` was connected to the scene.
    fn property_owner_connected(&mut self, owner: OwnerKey);

    /// `owner` was removed from the scene but still exists.
    fn property_owner_disconnected(
        &mut self,
        buffer: BufferIndex,
        owner: OwnerKey,
        registry: &mut dyn ObserverRegistry,
    ) -> NotifyReturn;

    /// `owner` is being destroyed. Delivered exactly once per edge; `owner` must not be
    /// referenced afterwards.
    fn property_owner_destroyed(&mut self, owner: OwnerKey, registry: &mut dyn ObserverRegistry);
}

/// Resolves observer keys to live observers.
pub trait ObserverSet {
    /// Observer behind `key`, or `None` when it no longer exists.
    fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver>;
}

/// Properties plus observer edges of one observable entity.
#[derive(Clone, Debug, Default)]
pub struct PropertyOwner {
    properties: Vec<AnimatableProperty>,
    observers: SmallVec<[ObserverKey; 4]>,
    updated: bool,
}

impl PropertyOwner {
    /// Owner with no properties and no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property and return its index.
    pub fn register_property(&mut self, initial: PropertyValue) -> PropertyIndex {
        self.properties.push(AnimatableProperty::new(initial));
        PropertyIndex((self.properties.len() - 1) as u32)
    }

    /// Number of registered properties.
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Property at `index`.
    pub fn property(&self, index: PropertyIndex) -> TableauResult<&AnimatableProperty> {
        self.properties
            .get(index.0 as usize)
            .ok_or_else(|| TableauError::validation(format!("no property at {index:?}")))
    }

    /// Mutable property at `index`.
    pub fn property_mut(
        &mut self,
        index: PropertyIndex,
    ) -> TableauResult<&mut AnimatableProperty> {
        self.properties
            .get_mut(index.0 as usize)
            .ok_or_else(|| TableauError::validation(format!("no property at {index:?}")))
    }

    /// Value of property `index` for `buffer`.
    pub fn get(&self, buffer: BufferIndex, index: PropertyIndex) -> TableauResult<PropertyValue> {
        Ok(self.property(index)?.get(buffer))
    }

    /// Frame-local write.
    pub fn set(
        &mut self,
        buffer: BufferIndex,
        index: PropertyIndex,
        value: PropertyValue,
    ) -> TableauResult<()> {
        self.property_mut(index)?.set(buffer, value)?;
        self.updated = true;
        Ok(())
    }

    /// Persistent write.
    pub fn bake(
        &mut self,
        buffer: BufferIndex,
        index: PropertyIndex,
        value: PropertyValue,
    ) -> TableauResult<()> {
        self.property_mut(index)?.bake(buffer, value)?;
        self.updated = true;
        Ok(())
    }

    /// Restore every dirty property's base value into `buffer`.
    pub fn reset_to_base_values(&mut self, buffer: BufferIndex) {
        for p in &mut self.properties {
            p.reset_to_base(buffer);
        }
    }

    /// Whether a property changed since the flag was last cleared.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Set or clear the changed flag.
    pub fn set_updated(&mut self, updated: bool) {
        self.updated = updated;
    }

    /// Register `observer`. Duplicate registration is rejected.
    pub fn add_observer(&mut self, observer: ObserverKey) -> TableauResult<()> {
        if self.observers.contains(&observer) {
            return Err(TableauError::contract(format!(
                "observer {observer:?} is already registered"
            )));
        }
        self.observers.push(observer);
        Ok(())
    }

    /// Unregister `observer`. Returns whether it was registered.
    pub fn remove_observer(&mut self, observer: ObserverKey) -> bool {
        match self.observers.iter().position(|o| *o == observer) {
            Some(pos) => {
                self.observers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Registered observers in registration order.
    pub fn observers(&self) -> &[ObserverKey] {
        &self.observers
    }

    /// Detach the observer list, leaving the owner unobserved.
    pub fn take_observers(&mut self) -> SmallVec<[ObserverKey; 4]> {
        std::mem::take(&mut self.observers)
    }
}

/// Types stored in a pool that expose a [`PropertyOwner`].
pub trait AsPropertyOwner {
    /// Shared access.
    fn property_owner(&self) -> &PropertyOwner;
    /// Exclusive access.
    fn property_owner_mut(&mut self) -> &mut PropertyOwner;
}

impl AsPropertyOwner for PropertyOwner {
    fn property_owner(&self) -> &PropertyOwner {
        self
    }

    fn property_owner_mut(&mut self) -> &mut PropertyOwner {
        self
    }
}

/// Owner storage that can look owners up by key.
pub trait PropertyOwnerStore: ObserverRegistry {
    /// Owner behind `key`.
    fn owner(&self, key: OwnerKey) -> Option<&PropertyOwner>;
    /// Mutable owner behind `key`.
    fn owner_mut(&mut self, key: OwnerKey) -> Option<&mut PropertyOwner>;
}

impl<T: AsPropertyOwner> ObserverRegistry for FixedSizeMemoryPool<T> {
    fn add_observer(&mut self, owner: OwnerKey, observer: ObserverKey) -> TableauResult<()> {
        self.get_mut(owner.0)
            .ok_or_else(|| TableauError::invalid_handle(format!("{owner:?} does not exist")))?
            .property_owner_mut()
            .add_observer(observer)
    }

    fn remove_observer(&mut self, owner: OwnerKey, observer: ObserverKey) {
        if let Some(o) = self.get_mut(owner.0) {
            o.property_owner_mut().remove_observer(observer);
        }
    }
}

impl<T: AsPropertyOwner> PropertyOwnerStore for FixedSizeMemoryPool<T> {
    fn owner(&self, key: OwnerKey) -> Option<&PropertyOwner> {
        self.get(key.0).map(AsPropertyOwner::property_owner)
    }

    fn owner_mut(&mut self, key: OwnerKey) -> Option<&mut PropertyOwner> {
        self.get_mut(key.0).map(AsPropertyOwner::property_owner_mut)
    }
}

/// Tell every observer of `owner` that it was connected.
pub fn notify_connected<S, O>(store: &mut S, owner: OwnerKey, observers: &mut O)
where
    S: PropertyOwnerStore + ?Sized,
    O: ObserverSet + ?Sized,
{
    let Some(keys) = store.owner(owner).map(|o| o.observers().to_vec()) else {
        return;
    };
    for key in keys {
        if let Some(observer) = observers.observer_mut(key) {
            observer.property_owner_connected(owner);
        }
    }
}

/// Tell every observer of `owner` that it was disconnected; drop edges answered with
/// [`NotifyReturn::StopObserving`].
pub fn notify_disconnected<S, O>(
    store: &mut S,
    buffer: BufferIndex,
    owner: OwnerKey,
    observers: &mut O,
) where
    S: PropertyOwnerStore,
    O: ObserverSet + ?Sized,
{
    let Some(keys) = store.owner(owner).map(|o| o.observers().to_vec()) else {
        return;
    };
    for key in keys {
        let Some(observer) = observers.observer_mut(key) else {
            tracing::trace!(?key, "skipping stale observer on disconnect");
            continue;
        };
        if observer.property_owner_disconnected(buffer, owner, &mut *store)
            == NotifyReturn::StopObserving
        {
            store.remove_observer(owner, key);
        }
    }
}

/// Deliver the destroyed notification to every observer of `owner`.
///
/// The edge list is detached before dispatch, so observers that try to unregister from `owner`
/// hit a no-op. The caller reclaims the owner's slot only after this returns. Returns the number
/// of observers notified.
pub fn notify_destroyed<S, O>(store: &mut S, owner: OwnerKey, observers: &mut O) -> usize
where
    S: PropertyOwnerStore,
    O: ObserverSet + ?Sized,
{
    let Some(keys) = store.owner_mut(owner).map(PropertyOwner::take_observers) else {
        return 0;
    };
    let mut delivered = 0;
    for key in keys {
        match observers.observer_mut(key) {
            Some(observer) => {
                observer.property_owner_destroyed(owner, &mut *store);
                delivered += 1;
            }
            None => tracing::trace!(?key, "skipping stale observer on destroy"),
        }
    }
    delivered
}

#[cfg(test)]
#[path = "../../tests/unit/update/property_owner.rs"]
mod tests;
