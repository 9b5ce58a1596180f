//! Registry of live animations and owner of the ones currently playing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::common::notifier::{NotifierMapper, NotifyId};
use crate::event::animation::{Animation, AnimationInner};

/// Tracks every live animation and keeps playing ones alive.
///
/// Completion notifications resolve ids through the registry; ids of animations that have been
/// dropped since are skipped.
#[derive(Debug, Default)]
pub struct AnimationPlaylist {
    animations: NotifierMapper<AnimationInner>,
    playing: Vec<Arc<AnimationInner>>,
    ignored: HashSet<NotifyId>,
}

impl AnimationPlaylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self) -> NotifyId {
        self.animations.next_id()
    }

    pub(crate) fn animation_created(&mut self, animation: &Arc<AnimationInner>) {
        self.animations.register_with_id(animation.id(), animation);
    }

    pub fn animation_destroyed(&mut self, id: NotifyId) {
        self.animations.unregister(id);
    }

    /// Keep `animation` alive until it finishes or is cleared.
    pub(crate) fn on_play(&mut self, animation: Arc<AnimationInner>) {
        let id = animation.id();
        self.ignored.remove(&id);
        if !self.is_playing(id) {
            self.playing.push(animation);
        }
    }

    /// Drop `id` from the playing list. With `ignore_required`, a completion already queued for it
    /// is swallowed until [`AnimationPlaylist::event_loop_finished`].
    ///
    /// The released reference is returned so the caller can drop it outside the lock.
    pub(crate) fn on_clear(
        &mut self,
        id: NotifyId,
        ignore_required: bool,
    ) -> Option<Arc<AnimationInner>> {
        if ignore_required {
            self.ignored.insert(id);
        }
        let position = self.playing.iter().position(|a| a.id() == id)?;
        Some(self.playing.remove(position))
    }

    pub fn is_playing(&self, id: NotifyId) -> bool {
        self.playing.iter().any(|a| a.id() == id)
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    /// Forget ignored ids and prune entries of dropped animations.
    pub fn event_loop_finished(&mut self) {
        self.ignored.clear();
        self.animations.prune();
    }

    /// Resolve finished ids in order, releasing them from the playing list. Returns the
    /// animations to signal.
    pub(crate) fn notify_completed(&mut self, ids: &[NotifyId]) -> Vec<Arc<AnimationInner>> {
        let mut finished = Vec::with_capacity(ids.len());
        for &id in ids {
            let released = self
                .playing
                .iter()
                .position(|a| a.id() == id)
                .map(|position| self.playing.remove(position));
            if self.ignored.contains(&id) {
                tracing::trace!(?id, "ignoring completion of a cleared animation");
                continue;
            }
            match released.or_else(|| self.animations.lookup(id)) {
                Some(animation) => finished.push(animation),
                None => tracing::trace!(?id, "completion for a dropped animation"),
            }
        }
        finished
    }

    pub(crate) fn notify_progress_reached(&mut self, id: NotifyId) -> Option<Arc<AnimationInner>> {
        let animation = self.animations.lookup(id);
        if animation.is_none() {
            tracing::trace!(?id, "progress for a dropped animation");
        }
        animation
    }

    /// Live animations, including ones not yet pruned.
    pub fn animation_count(&self) -> usize {
        self.animations.live_targets().count()
    }

    /// Live animation at `index` in creation order, or an empty handle.
    pub fn animation_at(&self, index: usize) -> Animation {
        self.animations
            .live_targets()
            .nth(index)
            .map(|(_, inner)| Animation::from_inner(inner))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/event/playlist.rs"]
mod tests;
