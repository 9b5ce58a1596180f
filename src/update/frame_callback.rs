//! Per-frame application hooks run on the update side.
//!
//! The application shares a [`FrameCallbackLink`] with the update side. Invalidation and
//! invocation both happen under the link's mutex, so once [`FrameCallbackLink::invalidate`]
//! returns the interface is never called again, whichever thread is running the frame.

use std::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::core::BufferIndex;
use crate::foundation::error::TableauResult;
use crate::update::node::{NodeId, SceneGraph};
use crate::update::property_owner::{
    NotifyReturn, ObserverKey, ObserverRegistry, OwnerKey, PropertyOwnerObserver,
};
use crate::update::resetter::ResetRequest;
use crate::update::update_proxy::{SceneGraphTraveler, UpdateProxy, UpdateProxyState};

/// Application hook called once per frame while registered.
pub trait FrameCallbackInterface: Send {
    /// Inspect or modify the scene. Returns whether another frame should be rendered.
    fn update(&mut self, proxy: &mut UpdateProxy<'_>, elapsed_seconds: f32) -> bool;
}

/// Interface shared between the application and the update side.
pub type SharedFrameCallbackInterface = Arc<Mutex<dyn FrameCallbackInterface>>;

/// Identity of a callback interface, stable after invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceId(usize);

impl InterfaceId {
    /// Identity of `interface`.
    pub fn of(interface: &SharedFrameCallbackInterface) -> Self {
        Self(Arc::as_ptr(interface) as *const () as usize)
    }
}

/// Result of one callback invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RequestFlags(u8);

impl RequestFlags {
    /// Remove the callback.
    pub const NONE: Self = Self(0);
    /// Keep the callback registered.
    pub const CONTINUE_CALLING: Self = Self(1 << 0);
    /// Request another frame.
    pub const KEEP_RENDERING: Self = Self(1 << 1);

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for RequestFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Default)]
struct LinkState {
    valid: bool,
    interface: Option<SharedFrameCallbackInterface>,
}

/// Mutex-guarded connection between a registered callback and its interface.
pub struct FrameCallbackLink {
    id: InterfaceId,
    state: Mutex<LinkState>,
}

impl std::fmt::Debug for FrameCallbackLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCallbackLink")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl FrameCallbackLink {
    /// Valid link to `interface`.
    pub fn new(interface: SharedFrameCallbackInterface) -> Arc<Self> {
        Arc::new(Self {
            id: InterfaceId::of(&interface),
            state: Mutex::new(LinkState {
                valid: true,
                interface: Some(interface),
            }),
        })
    }

    /// Identity of the linked interface.
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disconnect from the interface. Idempotent; safe from any thread.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.valid = false;
        state.interface = None;
    }

    /// Whether the interface may still be called.
    pub fn is_valid(&self) -> bool {
        self.lock().valid
    }

    /// Call the interface if still valid.
    pub fn call(&self, proxy: &mut UpdateProxy<'_>, elapsed_seconds: f32) -> RequestFlags {
        let state = self.lock();
        let Some(interface) = state.interface.as_ref().filter(|_| state.valid) else {
            return RequestFlags::NONE;
        };
        let keep_rendering = interface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(proxy, elapsed_seconds);
        if keep_rendering {
            RequestFlags::CONTINUE_CALLING | RequestFlags::KEEP_RENDERING
        } else {
            RequestFlags::CONTINUE_CALLING
        }
    }
}

/// Update-side registration of one callback.
#[derive(Debug)]
pub struct FrameCallback {
    link: Arc<FrameCallbackLink>,
    root: Option<OwnerKey>,
    observer_key: ObserverKey,
    proxy: Option<UpdateProxyState>,
}

impl FrameCallback {
    /// Callback bound to `root` (or the whole scene). `root_id` is reported through the proxy.
    pub fn new(
        link: Arc<FrameCallbackLink>,
        root: Option<OwnerKey>,
        root_id: Option<NodeId>,
        observer_key: ObserverKey,
    ) -> Self {
        Self {
            link,
            root,
            observer_key,
            proxy: Some(UpdateProxyState::new(root_id)),
        }
    }

    /// Start observing the root so its destruction invalidates the callback.
    pub fn connect(&self, registry: &mut dyn ObserverRegistry) -> TableauResult<()> {
        match self.root {
            Some(root) => registry.add_observer(root, self.observer_key),
            None => Ok(()),
        }
    }

    /// Stop observing the root.
    pub fn release(&self, registry: &mut dyn ObserverRegistry) {
        if let Some(root) = self.root {
            registry.remove_observer(root, self.observer_key);
        }
    }

    /// Identity of the interface.
    pub fn id(&self) -> InterfaceId {
        self.link.id()
    }

    /// Subtree root.
    pub fn root(&self) -> Option<OwnerKey> {
        self.root
    }

    /// Key under which this callback observes its root.
    pub fn observer_key(&self) -> ObserverKey {
        self.observer_key
    }

    /// Disconnect from the interface.
    pub fn invalidate(&self) {
        self.link.invalidate();
    }

    /// Queue a sync point for the proxy.
    pub fn notify(&mut self, sync_point: u32) {
        if let Some(proxy) = &mut self.proxy {
            proxy.push_sync_point(sync_point);
        }
    }

    /// Run the interface for this frame.
    pub fn update(
        &mut self,
        buffer: BufferIndex,
        elapsed_seconds: f32,
        hierarchy_changed: bool,
        graph: &mut SceneGraph,
        traveler: &mut SceneGraphTraveler,
        resets: &mut Vec<ResetRequest>,
    ) -> RequestFlags {
        let Some(state) = &mut self.proxy else {
            return RequestFlags::NONE;
        };
        if hierarchy_changed {
            traveler.node_hierarchy_changed();
        }
        let mut proxy = UpdateProxy::new(graph, traveler, state, resets, buffer);
        self.link.call(&mut proxy, elapsed_seconds)
    }
}

impl PropertyOwnerObserver for FrameCallback {
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
        self.proxy = None;
        self.root = None;
        self.link.invalidate();
    }
}
