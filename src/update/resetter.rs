//! Resetters restore animated or constrained properties to their base value each frame.
//!
//! A resetter stays alive while its modifier (constraint or animation) runs, then ages for one
//! more frame so that both buffers end up holding the base value.

use crate::common::memory_pool::PoolKey;
use crate::foundation::core::BufferIndex;
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::constraint::LifecycleObserver;
use crate::update::property::PropertyIndex;
use crate::update::property_owner::{
    NotifyReturn, ObserverKey, ObserverRegistry, OwnerKey, PropertyOwner, PropertyOwnerObserver,
    PropertyOwnerStore,
};

/// Resetter stopped; it will be discarded.
pub const STOPPED: i8 = 0;
/// Resetter in its final frame.
pub const AGING: i8 = 1;
/// Resetter running.
pub const ACTIVE: i8 = 2;

/// How long a baker resetter keeps resetting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResetterLifetime {
    /// The value was baked: one more reset copies it into the other buffer.
    Bake,
    /// The value was set for one frame: two more resets restore the base value in both buffers.
    Set,
}

/// Request for a baker resetter, produced by writes that bypass the message queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetRequest {
    pub owner: OwnerKey,
    pub property: PropertyIndex,
    pub lifetime: ResetterLifetime,
}

/// Modifier whose lifetime a resetter follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Constraint(PoolKey),
    Animation(PoolKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResetterKind {
    Baker,
    Modifier(Option<ModifierKey>),
}

/// Resets one property of one owner.
#[derive(Clone, Debug)]
pub struct PropertyResetter {
    owner: Option<OwnerKey>,
    property: PropertyIndex,
    running: i8,
    active: i8,
    initialized: bool,
    disconnected: bool,
    kind: ResetterKind,
}

impl PropertyResetter {
    fn with_kind(owner: OwnerKey, property: PropertyIndex, kind: ResetterKind) -> Self {
        Self {
            owner: Some(owner),
            property,
            running: ACTIVE,
            active: ACTIVE,
            initialized: false,
            disconnected: false,
            kind,
        }
    }

    /// Resetter for a value written directly by the application.
    pub fn baker(owner: OwnerKey, property: PropertyIndex, lifetime: ResetterLifetime) -> Self {
        let mut r = Self::with_kind(owner, property, ResetterKind::Baker);
        r.running = match lifetime {
            ResetterLifetime::Bake => AGING,
            ResetterLifetime::Set => ACTIVE,
        };
        r
    }

    /// Resetter following a modifier. The caller registers the resetter as the modifier's
    /// lifecycle observer.
    pub fn for_modifier(owner: OwnerKey, property: PropertyIndex, modifier: ModifierKey) -> Self {
        Self::with_kind(owner, property, ResetterKind::Modifier(Some(modifier)))
    }

    /// Start observing the owner and flag it as updated. Must be called exactly once.
    pub fn initialize<S>(&mut self, me: ObserverKey, store: &mut S) -> TableauResult<()>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        if self.initialized {
            return Err(TableauError::contract("resetter initialised twice"));
        }
        let owner = self
            .owner
            .ok_or_else(|| TableauError::invalid_handle("resetter owner is gone"))?;
        store.add_observer(owner, me)?;
        if let Some(o) = store.owner_mut(owner) {
            o.set_updated(true);
        }
        self.initialized = true;
        Ok(())
    }

    /// Restore the base value into `buffer` while running.
    pub fn request_reset_to_base_values<S>(&mut self, buffer: BufferIndex, store: &mut S)
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let Some(owner) = self.owner else {
            return;
        };
        match self.kind {
            ResetterKind::Baker => {
                if self.running <= STOPPED {
                    return;
                }
                self.running -= 1;
                if let Some(o) = store.owner_mut(owner) {
                    if self.running > STOPPED {
                        o.set_updated(true);
                    }
                    reset_property(o, self.property, buffer);
                }
            }
            ResetterKind::Modifier(_) => {
                if self.active <= STOPPED {
                    return;
                }
                if self.disconnected {
                    self.active -= 1;
                }
                if let Some(o) = store.owner_mut(owner) {
                    reset_property(o, self.property, buffer);
                }
            }
        }
    }

    /// Whether the resetter can be discarded. A modifier resetter that is ageing reports `false`
    /// once more and then stops; a baker counts down through its resets instead.
    pub fn is_finished(&mut self) -> bool {
        let finished = self.running <= STOPPED;
        if self.running == AGING && matches!(self.kind, ResetterKind::Modifier(_)) {
            self.running = STOPPED;
        }
        finished
    }

    /// Unregister from the owner before the resetter is discarded.
    pub fn release(&mut self, me: ObserverKey, registry: &mut dyn ObserverRegistry) {
        if self.initialized {
            if let Some(owner) = self.owner.take() {
                registry.remove_observer(owner, me);
            }
        }
    }

    /// Modifier still followed, if any.
    pub fn modifier(&self) -> Option<ModifierKey> {
        match self.kind {
            ResetterKind::Modifier(m) => m,
            ResetterKind::Baker => None,
        }
    }

    /// Owner being reset, `None` once it was destroyed.
    pub fn owner(&self) -> Option<OwnerKey> {
        self.owner
    }

    /// Property being reset.
    pub fn property(&self) -> PropertyIndex {
        self.property
    }

    /// Running state (`ACTIVE`, `AGING` or `STOPPED`).
    pub fn running(&self) -> i8 {
        self.running
    }
}

fn reset_property(owner: &mut PropertyOwner, property: PropertyIndex, buffer: BufferIndex) {
    if let Ok(p) = owner.property_mut(property) {
        p.reset_to_base(buffer);
    }
}

impl PropertyOwnerObserver for PropertyResetter {
    fn property_owner_connected(&mut self, _owner: OwnerKey) {
        self.disconnected = false;
        self.active = ACTIVE;
    }

    fn property_owner_disconnected(
        &mut self,
        _buffer: BufferIndex,
        _owner: OwnerKey,
        _registry: &mut dyn ObserverRegistry,
    ) -> NotifyReturn {
        self.disconnected = true;
        NotifyReturn::KeepObserving
    }

    fn property_owner_destroyed(&mut self, _owner: OwnerKey, _registry: &mut dyn ObserverRegistry) {
        self.disconnected = true;
        self.owner = None;
        self.active = STOPPED;
        self.running = STOPPED;
    }
}

impl LifecycleObserver for PropertyResetter {
    fn object_destroyed(&mut self) {
        self.running -= 1;
        if let ResetterKind::Modifier(m) = &mut self.kind {
            *m = None;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/resetter.rs"]
mod tests;
