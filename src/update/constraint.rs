//! Constraints: per-frame functions writing one property from a set of observed inputs.

use smallvec::SmallVec;

use crate::common::memory_pool::PoolKey;
use crate::foundation::core::BufferIndex;
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::property::{PropertyIndex, PropertyValue};
use crate::update::property_owner::{
    NotifyReturn, ObserverKey, ObserverRegistry, OwnerKey, PropertyOwnerObserver,
    PropertyOwnerStore,
};

/// Application-visible constraint identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ConstraintId(pub u32);

/// What happens to the constrained value when the constraint is removed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum RemoveAction {
    /// Keep the last constrained value as the property's base value.
    #[default]
    Bake,
    /// Let the property fall back to its base value.
    Discard,
}

/// Notified immediately before the observed modifier is destroyed.
pub trait LifecycleObserver {
    /// The modifier is going away; drop any reference to it.
    fn object_destroyed(&mut self);
}

/// Computation run by a constraint once per frame.
pub trait ConstraintFunction: Send {
    /// Produce the new target value from the current one and the inputs, in source order.
    fn apply(&mut self, current: &PropertyValue, inputs: &[PropertyValue])
    -> TableauResult<PropertyValue>;

    /// Called once when the constraint disconnects.
    fn on_disconnect(&mut self) {}
}

impl<F> ConstraintFunction for F
where
    F: FnMut(&PropertyValue, &[PropertyValue]) -> PropertyValue + Send,
{
    fn apply(
        &mut self,
        current: &PropertyValue,
        inputs: &[PropertyValue],
    ) -> TableauResult<PropertyValue> {
        Ok(self(current, inputs))
    }
}

/// Owner/property pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyTarget {
    pub owner: OwnerKey,
    pub property: PropertyIndex,
}

/// Update-side constraint.
///
/// Created disconnected. [`Constraint::on_connect`] registers it with every observed owner;
/// from then on [`Constraint::apply`] writes the target each frame. The first destroyed (or
/// disconnected) observed owner ends the constraint: it stops observing the remaining owners,
/// runs [`ConstraintFunction::on_disconnect`] and never applies again.
pub struct Constraint {
    target: PropertyTarget,
    sources: SmallVec<[PropertyTarget; 4]>,
    observed: SmallVec<[OwnerKey; 4]>,
    function: Box<dyn ConstraintFunction>,
    remove_action: RemoveAction,
    observer_key: Option<ObserverKey>,
    lifecycle_observer: Option<PoolKey>,
    first_apply: bool,
    disconnected: bool,
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("target", &self.target)
            .field("sources", &self.sources)
            .field("remove_action", &self.remove_action)
            .field("disconnected", &self.disconnected)
            .finish_non_exhaustive()
    }
}

impl Constraint {
    /// Constraint writing `target` from `sources`.
    pub fn new(
        target: PropertyTarget,
        sources: impl IntoIterator<Item = PropertyTarget>,
        function: Box<dyn ConstraintFunction>,
    ) -> Self {
        let sources: SmallVec<[PropertyTarget; 4]> = sources.into_iter().collect();
        let mut observed: SmallVec<[OwnerKey; 4]> = SmallVec::new();
        for owner in std::iter::once(target.owner).chain(sources.iter().map(|s| s.owner)) {
            if !observed.contains(&owner) {
                observed.push(owner);
            }
        }
        Self {
            target,
            sources,
            observed,
            function,
            remove_action: RemoveAction::default(),
            observer_key: None,
            lifecycle_observer: None,
            first_apply: true,
            disconnected: true,
        }
    }

    /// Start observing every owner in the set.
    pub fn on_connect(
        &mut self,
        me: ObserverKey,
        registry: &mut dyn ObserverRegistry,
    ) -> TableauResult<()> {
        if !self.disconnected {
            return Err(TableauError::contract("constraint is already connected"));
        }
        for (i, owner) in self.observed.iter().enumerate() {
            if let Err(err) = registry.add_observer(*owner, me) {
                for registered in &self.observed[..i] {
                    registry.remove_observer(*registered, me);
                }
                return Err(err);
            }
        }
        self.observer_key = Some(me);
        self.disconnected = false;
        Ok(())
    }

    /// Recompute and write the target for `buffer`. No-op once disconnected.
    pub fn apply<S>(&mut self, buffer: BufferIndex, store: &mut S) -> TableauResult<()>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        if self.disconnected {
            return Ok(());
        }
        let mut inputs: SmallVec<[PropertyValue; 4]> = SmallVec::new();
        for source in &self.sources {
            let owner = store.owner(source.owner).ok_or_else(|| {
                TableauError::invalid_handle(format!("{:?} is gone", source.owner))
            })?;
            inputs.push(owner.get(buffer, source.property)?);
        }
        let target = store
            .owner_mut(self.target.owner)
            .ok_or_else(|| TableauError::invalid_handle("constraint target is gone"))?;
        let current = target.get(buffer, self.target.property)?;
        let value = self.function.apply(&current, &inputs)?;
        target.set(buffer, self.target.property, value)?;
        self.first_apply = false;
        Ok(())
    }

    /// Detach on explicit removal. Applies the remove action, then disconnects.
    pub fn remove<S>(&mut self, buffer: BufferIndex, store: &mut S)
    where
        S: PropertyOwnerStore,
    {
        if self.disconnected {
            return;
        }
        if self.remove_action == RemoveAction::Bake && !self.first_apply {
            if let Some(owner) = store.owner_mut(self.target.owner) {
                if let Ok(value) = owner.get(buffer, self.target.property) {
                    if let Err(err) = owner.bake(buffer, self.target.property, value) {
                        tracing::debug!(property = ?self.target, %err, "bake on removal failed");
                    }
                }
            }
        }
        self.disconnect(store);
    }

    /// Stop observing every owner still in the set and run the disconnect hook. At most once.
    pub fn disconnect(&mut self, registry: &mut dyn ObserverRegistry) {
        if self.disconnected {
            return;
        }
        if let Some(me) = self.observer_key {
            for owner in self.observed.drain(..) {
                registry.remove_observer(owner, me);
            }
        }
        self.function.on_disconnect();
        self.disconnected = true;
        tracing::debug!(property = ?self.target, "constraint disconnected");
    }

    /// Whether the constraint has reached its terminal state.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Whether [`Constraint::apply`] has written the target at least once.
    pub fn has_applied(&self) -> bool {
        !self.first_apply
    }

    /// Constrained property.
    pub fn target(&self) -> PropertyTarget {
        self.target
    }

    /// Owners currently observed.
    pub fn observed_owners(&self) -> &[OwnerKey] {
        &self.observed
    }

    /// Set the removal policy.
    pub fn set_remove_action(&mut self, action: RemoveAction) {
        self.remove_action = action;
    }

    /// Current removal policy.
    pub fn remove_action(&self) -> RemoveAction {
        self.remove_action
    }

    /// Register the lifecycle observer; replaces any previous one.
    pub fn add_lifecycle_observer(&mut self, observer: PoolKey) {
        self.lifecycle_observer = Some(observer);
    }

    /// Unregister the lifecycle observer if it is `observer`.
    pub fn remove_lifecycle_observer(&mut self, observer: PoolKey) {
        if self.lifecycle_observer == Some(observer) {
            self.lifecycle_observer = None;
        }
    }

    /// Detach the lifecycle observer so it can be told about the destruction.
    pub fn take_lifecycle_observer(&mut self) -> Option<PoolKey> {
        self.lifecycle_observer.take()
    }
}

impl PropertyOwnerObserver for Constraint {
    fn property_owner_connected(&mut self, _owner: OwnerKey) {}

    fn property_owner_disconnected(
        &mut self,
        _buffer: BufferIndex,
        owner: OwnerKey,
        registry: &mut dyn ObserverRegistry,
    ) -> NotifyReturn {
        if self.disconnected {
            return NotifyReturn::KeepObserving;
        }
        self.property_owner_destroyed(owner, registry);
        NotifyReturn::StopObserving
    }

    fn property_owner_destroyed(&mut self, owner: OwnerKey, registry: &mut dyn ObserverRegistry) {
        if self.disconnected {
            return;
        }
        self.observed.retain(|o| *o != owner);
        self.disconnect(registry);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/constraint.rs"]
mod tests;
