//! Application-side entry point: creates scene objects, queues their messages for the update side
//! and dispatches the notifications that come back.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::common::memory_pool::SharedMemoryPool;
use crate::foundation::core::FrameId;
use crate::foundation::error::{TableauError, TableauResult};
use crate::event::animation::Animation;
use crate::event::frame_callback::FrameCallbackRegistry;
use crate::event::playlist::AnimationPlaylist;
use crate::event::property_notification::PropertyNotificationManager;
use crate::event::texture::Texture;
use crate::render::manager::FrameBufferId;
use crate::render::texture::RenderTexture;
use crate::update::constraint::{ConstraintFunction, ConstraintId, RemoveAction};
use crate::update::frame_callback::{InterfaceId, SharedFrameCallbackInterface};
use crate::update::messages::{NodeProperty, Notification, UpdateMessage};
use crate::update::node::{NodeId, node_property};
use crate::update::property::PropertyValue;

/// Options for [`Core::new`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoreOptions {
    /// Root node width.
    pub surface_width: u32,
    /// Root node height.
    pub surface_height: u32,
    /// Record backend calls in the runtime harnesses.
    pub trace_calls: bool,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            surface_width: 480,
            surface_height: 800,
            trace_calls: true,
        }
    }
}

/// The update-side ends of the channels created by [`Core::new`].
#[derive(Debug)]
pub struct CoreChannels {
    /// Messages for [`crate::update::manager::UpdateManager`], in send order.
    pub messages: Receiver<UpdateMessage>,
    /// Where the update and render sides report back.
    pub notifications: Sender<Notification>,
    /// Texture slots reserved by the application and filled by the render side.
    pub textures: Arc<SharedMemoryPool<RenderTexture>>,
}

/// State shared between [`Core`] and the handles it creates.
///
/// Handles keep a [`Weak`] reference, so they never keep the core alive and fail with
/// [`TableauError::InvalidHandle`] once it is gone.
#[derive(Debug)]
pub(crate) struct EventShared {
    messages: Sender<UpdateMessage>,
    playlist: Mutex<AnimationPlaylist>,
    property_notifications: Mutex<PropertyNotificationManager>,
    frame_callbacks: Mutex<FrameCallbackRegistry>,
    textures: Arc<SharedMemoryPool<RenderTexture>>,
    next_node: AtomicU32,
    next_constraint: AtomicU32,
    next_frame_buffer: AtomicU32,
}

impl EventShared {
    pub(crate) fn send(&self, message: UpdateMessage) -> TableauResult<()> {
        self.messages.send(message).map_err(|err| {
            TableauError::backend(format!("update side is gone, dropped {}", err.0.kind()))
        })
    }

    pub(crate) fn playlist(&self) -> MutexGuard<'_, AnimationPlaylist> {
        self.playlist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Playlist access that never blocks; used from destructors.
    pub(crate) fn try_playlist(&self) -> Option<MutexGuard<'_, AnimationPlaylist>> {
        self.playlist.try_lock().ok()
    }

    pub(crate) fn property_notifications(&self) -> MutexGuard<'_, PropertyNotificationManager> {
        self.property_notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn try_property_notifications(
        &self,
    ) -> Option<MutexGuard<'_, PropertyNotificationManager>> {
        self.property_notifications.try_lock().ok()
    }

    pub(crate) fn frame_callbacks(&self) -> MutexGuard<'_, FrameCallbackRegistry> {
        self.frame_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn textures(&self) -> &Arc<SharedMemoryPool<RenderTexture>> {
        &self.textures
    }

    pub(crate) fn next_frame_buffer_id(&self) -> FrameBufferId {
        FrameBufferId(self.next_frame_buffer.fetch_add(1, Ordering::Relaxed))
    }
}

/// Resolve a handle's back-reference to the core.
pub(crate) fn upgrade(shared: &Weak<EventShared>) -> TableauResult<Arc<EventShared>> {
    shared
        .upgrade()
        .ok_or_else(|| TableauError::invalid_handle("the core has been dropped"))
}

type FrameIdCallback = Box<dyn FnOnce(FrameId) + Send>;

/// Application-thread core.
///
/// Every mutation is queued as an [`UpdateMessage`] and takes effect on the next update.
/// Notifications from the other sides are buffered until [`Core::process_events`].
pub struct Core {
    shared: Arc<EventShared>,
    notifications: Receiver<Notification>,
    options: CoreOptions,
    frame_rendered: Mutex<Vec<(FrameId, FrameIdCallback)>>,
    frame_presented: Mutex<Vec<(FrameId, FrameIdCallback)>>,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("shared", &self.shared)
            .field("options", &self.options)
            .field("frame_rendered", &lock(&self.frame_rendered).len())
            .field("frame_presented", &lock(&self.frame_presented).len())
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Core plus the channel ends the runtime hands to the update and render sides.
    pub fn new(options: CoreOptions) -> (Self, CoreChannels) {
        let (message_tx, message_rx) = mpsc::channel();
        let (notification_tx, notification_rx) = mpsc::channel();
        let textures = Arc::new(SharedMemoryPool::new());
        let shared = Arc::new(EventShared {
            messages: message_tx,
            playlist: Mutex::new(AnimationPlaylist::new()),
            property_notifications: Mutex::new(PropertyNotificationManager::new()),
            frame_callbacks: Mutex::new(FrameCallbackRegistry::new()),
            textures: Arc::clone(&textures),
            next_node: AtomicU32::new(1),
            next_constraint: AtomicU32::new(1),
            next_frame_buffer: AtomicU32::new(1),
        });
        let size = PropertyValue::Vector3([
            options.surface_width as f32,
            options.surface_height as f32,
            0.0,
        ]);
        // The receiver is alive, so this cannot fail.
        let _ = shared.send(UpdateMessage::BakeProperty {
            target: NodeProperty::new(NodeId::ROOT, node_property::SIZE),
            value: size,
        });
        let core = Self {
            shared,
            notifications: notification_rx,
            options,
            frame_rendered: Mutex::new(Vec::new()),
            frame_presented: Mutex::new(Vec::new()),
        };
        let channels = CoreChannels {
            messages: message_rx,
            notifications: notification_tx,
            textures,
        };
        (core, channels)
    }

    pub fn options(&self) -> &CoreOptions {
        &self.options
    }

    pub(crate) fn shared(&self) -> &Arc<EventShared> {
        &self.shared
    }

    /// The scene root, always present.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Create a detached node.
    pub fn create_node(&self) -> TableauResult<NodeId> {
        let id = NodeId(self.shared.next_node.fetch_add(1, Ordering::Relaxed));
        self.shared.send(UpdateMessage::AddNode(id))?;
        Ok(id)
    }

    pub fn add_child(&self, parent: NodeId, child: NodeId) -> TableauResult<()> {
        self.shared.send(UpdateMessage::ConnectNode { parent, child })
    }

    /// Detach `child` from its parent.
    pub fn unparent(&self, child: NodeId) -> TableauResult<()> {
        self.shared.send(UpdateMessage::DisconnectNode(child))
    }

    pub fn destroy_node(&self, node: NodeId) -> TableauResult<()> {
        if node == NodeId::ROOT {
            return Err(TableauError::validation("the root node cannot be destroyed"));
        }
        self.shared.send(UpdateMessage::DestroyNode(node))
    }

    /// Write a value for the next frame only.
    pub fn set_property(&self, target: NodeProperty, value: PropertyValue) -> TableauResult<()> {
        self.shared.send(UpdateMessage::SetProperty { target, value })
    }

    /// Write a value that persists.
    pub fn bake_property(&self, target: NodeProperty, value: PropertyValue) -> TableauResult<()> {
        self.shared.send(UpdateMessage::BakeProperty { target, value })
    }

    /// Draw `node` with `texture`, or without a texture.
    pub fn set_node_texture(&self, node: NodeId, texture: Option<&Texture>) -> TableauResult<()> {
        let texture = texture
            .map(|t| {
                t.key()
                    .ok_or_else(|| TableauError::invalid_handle("texture handle is empty"))
            })
            .transpose()?;
        self.shared
            .send(UpdateMessage::AttachTexture { node, texture })
    }

    /// Constrain `target` to the value computed from `sources` every frame.
    pub fn add_constraint<F>(
        &self,
        target: NodeProperty,
        sources: &[NodeProperty],
        function: F,
        remove_action: RemoveAction,
    ) -> TableauResult<ConstraintId>
    where
        F: ConstraintFunction + 'static,
    {
        let id = ConstraintId(self.shared.next_constraint.fetch_add(1, Ordering::Relaxed));
        self.shared.send(UpdateMessage::AddConstraint {
            id,
            target,
            sources: sources.to_vec(),
            function: Box::new(function),
            remove_action,
        })?;
        Ok(id)
    }

    pub fn remove_constraint(&self, id: ConstraintId) -> TableauResult<()> {
        self.shared.send(UpdateMessage::RemoveConstraint(id))
    }

    pub fn set_constraint_remove_action(
        &self,
        id: ConstraintId,
        action: RemoveAction,
    ) -> TableauResult<()> {
        self.shared
            .send(UpdateMessage::SetConstraintRemoveAction { id, action })
    }

    /// Call `interface` once per frame, scoped to `root` (or the whole scene).
    pub fn add_frame_callback(
        &self,
        interface: SharedFrameCallbackInterface,
        root: Option<NodeId>,
    ) -> TableauResult<()> {
        let link = self.shared.frame_callbacks().add(interface)?;
        self.shared
            .send(UpdateMessage::AddFrameCallback { link, root })
    }

    /// Stop calling `interface`. It is never called again once this returns. Returns whether it
    /// was registered.
    pub fn remove_frame_callback(
        &self,
        interface: &SharedFrameCallbackInterface,
    ) -> TableauResult<bool> {
        let id = InterfaceId::of(interface);
        if self.shared.frame_callbacks().remove(id).is_none() {
            return Ok(false);
        }
        self.shared.send(UpdateMessage::RemoveFrameCallback(id))?;
        Ok(true)
    }

    /// Hand `sync_point` to the callback's update proxy.
    pub fn notify_frame_callback(
        &self,
        interface: &SharedFrameCallbackInterface,
        sync_point: u32,
    ) -> TableauResult<()> {
        let id = InterfaceId::of(interface);
        if !self.shared.frame_callbacks().contains(id) {
            return Err(TableauError::invalid_handle("frame callback is not registered"));
        }
        self.shared
            .send(UpdateMessage::NotifyFrameCallback { id, sync_point })
    }

    /// Call `callback` once the next frame has been rendered.
    pub fn add_frame_rendered_callback<F>(&self, frame: FrameId, callback: F) -> TableauResult<()>
    where
        F: FnOnce(FrameId) + Send + 'static,
    {
        lock(&self.frame_rendered).push((frame, Box::new(callback)));
        self.shared.send(UpdateMessage::FrameRendered(frame))
    }

    /// Call `callback` once the next frame has been presented.
    pub fn add_frame_presented_callback<F>(&self, frame: FrameId, callback: F) -> TableauResult<()>
    where
        F: FnOnce(FrameId) + Send + 'static,
    {
        lock(&self.frame_presented).push((frame, Box::new(callback)));
        self.shared.send(UpdateMessage::FramePresented(frame))
    }

    /// Dispatch every buffered notification. Returns how many were handled.
    pub fn process_notifications(&self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            handled += 1;
            match notification {
                Notification::AnimationsCompleted(ids) => {
                    let finished = self.shared.playlist().notify_completed(&ids);
                    for animation in &finished {
                        animation.emit_finished();
                    }
                }
                Notification::AnimationProgressReached(id) => {
                    let animation = self.shared.playlist().notify_progress_reached(id);
                    if let Some(animation) = animation {
                        animation.emit_progress_reached();
                    }
                }
                Notification::PropertyNotified { id, validity } => {
                    let notification = self
                        .shared
                        .property_notifications()
                        .notify_property(id, validity);
                    if let Some(notification) = notification {
                        notification.emit(validity);
                    }
                }
                Notification::FrameRendered(frames) => {
                    dispatch_frame_callbacks(&self.frame_rendered, &frames);
                }
                Notification::FramePresented(frames) => {
                    dispatch_frame_callbacks(&self.frame_presented, &frames);
                }
            }
        }
        handled
    }

    /// End of one application event-loop iteration.
    pub fn event_loop_finished(&self) {
        self.shared.playlist().event_loop_finished();
        self.shared.property_notifications().prune();
        self.shared.frame_callbacks().prune();
    }

    /// [`Core::process_notifications`] followed by [`Core::event_loop_finished`].
    pub fn process_events(&self) -> usize {
        let handled = self.process_notifications();
        self.event_loop_finished();
        handled
    }

    /// Live animations.
    pub fn animation_count(&self) -> usize {
        self.shared.playlist().animation_count()
    }

    /// Live animation at `index` in creation order, or an empty handle.
    pub fn animation_at(&self, index: usize) -> Animation {
        self.shared.playlist().animation_at(index)
    }

    /// Animations kept alive by the playlist while they play.
    pub fn playing_animation_count(&self) -> usize {
        self.shared.playlist().playing_count()
    }

    /// Frame callbacks currently registered from this side.
    pub fn frame_callback_count(&self) -> usize {
        self.shared.frame_callbacks().len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch_frame_callbacks(callbacks: &Mutex<Vec<(FrameId, FrameIdCallback)>>, frames: &[FrameId]) {
    let ready: Vec<(FrameId, FrameIdCallback)> = {
        let mut pending = lock(callbacks);
        let (ready, waiting) = std::mem::take(&mut *pending)
            .into_iter()
            .partition(|(id, _)| frames.contains(id));
        *pending = waiting;
        ready
    };
    for (id, callback) in ready {
        callback(id);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/event/core.rs"]
mod tests;
