//! Application-side animation handles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::common::notifier::NotifyId;
use crate::event::core::{Core, EventShared, upgrade};
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::animation::AnimationConfig;
use crate::update::ease::Ease;
use crate::update::messages::{NodeProperty, UpdateMessage};
use crate::update::property::PropertyValue;

type AnimationCallback = Box<dyn FnMut(NotifyId) + Send>;

/// Shared state behind an [`Animation`] handle.
///
/// The playlist holds a strong reference while the animation plays, so a handle may be dropped
/// right after [`Animation::play`]. The update-side animation is destroyed with the last
/// reference.
pub(crate) struct AnimationInner {
    id: NotifyId,
    config: AnimationConfig,
    shared: Weak<EventShared>,
    finished: AtomicUsize,
    progress_reached: AtomicUsize,
    on_finished: Mutex<Vec<AnimationCallback>>,
    on_progress_reached: Mutex<Vec<AnimationCallback>>,
}

impl std::fmt::Debug for AnimationInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationInner")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AnimationInner {
    pub(crate) fn new(id: NotifyId, config: AnimationConfig, shared: Weak<EventShared>) -> Self {
        Self {
            id,
            config,
            shared,
            finished: AtomicUsize::new(0),
            progress_reached: AtomicUsize::new(0),
            on_finished: Mutex::new(Vec::new()),
            on_progress_reached: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> NotifyId {
        self.id
    }

    pub(crate) fn emit_finished(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
        run_callbacks(&self.on_finished, self.id);
    }

    pub(crate) fn emit_progress_reached(&self) {
        self.progress_reached.fetch_add(1, Ordering::Relaxed);
        run_callbacks(&self.on_progress_reached, self.id);
    }
}

/// Run the callbacks outside their lock so they may register more.
fn run_callbacks(slot: &Mutex<Vec<AnimationCallback>>, id: NotifyId) {
    let mut callbacks = std::mem::take(&mut *slot.lock().unwrap_or_else(PoisonError::into_inner));
    for callback in &mut callbacks {
        callback(id);
    }
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    callbacks.append(&mut slot);
    *slot = callbacks;
}

impl Drop for AnimationInner {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if let Err(err) = shared.send(UpdateMessage::DestroyAnimation(self.id)) {
            tracing::trace!(id = ?self.id, %err, "animation dropped after shutdown");
        }
        // Unregistering may race with a playlist lock held on this thread; the entry is pruned at
        // the end of the event loop otherwise.
        if let Some(mut playlist) = shared.try_playlist() {
            playlist.animation_destroyed(self.id);
        }
    }
}

/// Handle to an animation. Cheap to clone; the default value is an empty handle.
///
/// Every operation is queued for the update side and takes effect on the next frame.
#[derive(Clone, Debug, Default)]
pub struct Animation {
    inner: Option<Arc<AnimationInner>>,
}

impl Animation {
    /// Create an animation with `config`; it starts stopped and without animators.
    pub fn new(core: &Core, config: AnimationConfig) -> TableauResult<Self> {
        config.validate()?;
        let shared = core.shared();
        let inner = {
            let mut playlist = shared.playlist();
            let id = playlist.next_id();
            let inner = Arc::new(AnimationInner::new(id, config, Arc::downgrade(shared)));
            playlist.animation_created(&inner);
            inner
        };
        shared.send(UpdateMessage::AddAnimation {
            id: inner.id,
            config,
        })?;
        Ok(Self { inner: Some(inner) })
    }

    pub(crate) fn from_inner(inner: Arc<AnimationInner>) -> Self {
        Self { inner: Some(inner) }
    }

    fn inner(&self) -> TableauResult<&Arc<AnimationInner>> {
        self.inner
            .as_ref()
            .ok_or_else(|| TableauError::invalid_handle("animation handle is empty"))
    }

    fn send(&self, message: impl FnOnce(NotifyId) -> UpdateMessage) -> TableauResult<()> {
        let inner = self.inner()?;
        upgrade(&inner.shared)?.send(message(inner.id))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Release this handle. The animation lives on while other handles exist or it plays.
    pub fn reset(&mut self) {
        self.inner = None;
    }

    pub fn id(&self) -> Option<NotifyId> {
        self.inner.as_ref().map(|inner| inner.id)
    }

    pub fn config(&self) -> TableauResult<AnimationConfig> {
        Ok(self.inner()?.config)
    }

    /// Animate `target` from its value at the first played frame to `to`.
    pub fn animate_to(
        &self,
        target: NodeProperty,
        to: PropertyValue,
        ease: Ease,
    ) -> TableauResult<()> {
        self.send(|animation| UpdateMessage::AddAnimator {
            animation,
            target,
            to,
            ease,
        })
    }

    pub fn play(&self) -> TableauResult<()> {
        let inner = self.inner()?;
        let shared = upgrade(&inner.shared)?;
        shared.playlist().on_play(Arc::clone(inner));
        shared.send(UpdateMessage::PlayAnimation(inner.id))
    }

    pub fn pause(&self) -> TableauResult<()> {
        self.send(UpdateMessage::PauseAnimation)
    }

    /// Stop and apply the end action. A running animation reports finished.
    pub fn stop(&self) -> TableauResult<()> {
        self.send(UpdateMessage::StopAnimation)
    }

    /// Rewind, drop every animator and leave the playlist.
    ///
    /// A finished notification already on its way for a playing animation is ignored until the
    /// current event loop iteration ends.
    pub fn clear(&self) -> TableauResult<()> {
        let inner = self.inner()?;
        let shared = upgrade(&inner.shared)?;
        let removed = {
            let mut playlist = shared.playlist();
            let ignore_required = playlist.is_playing(inner.id);
            playlist.on_clear(inner.id, ignore_required)
        };
        drop(removed);
        shared.send(UpdateMessage::ClearAnimation(inner.id))
    }

    /// Register a callback run on the application thread when the animation finishes.
    pub fn on_finished<F>(&self, callback: F) -> TableauResult<()>
    where
        F: FnMut(NotifyId) + Send + 'static,
    {
        self.inner()?
            .on_finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
        Ok(())
    }

    /// Register a callback run when the progress marker is crossed.
    pub fn on_progress_reached<F>(&self, callback: F) -> TableauResult<()>
    where
        F: FnMut(NotifyId) + Send + 'static,
    {
        self.inner()?
            .on_progress_reached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
        Ok(())
    }

    /// Finished notifications delivered so far; `0` for an empty handle.
    pub fn finished_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.finished.load(Ordering::Relaxed))
    }

    pub fn progress_reached_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.progress_reached.load(Ordering::Relaxed))
    }
}

impl PartialEq for Animation {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/event/animation.rs"]
mod tests;
