//! Update-side animations: a clock plus animators interpolating node properties.

use crate::common::memory_pool::PoolKey;
use crate::common::notifier::NotifyId;
use crate::foundation::core::BufferIndex;
use crate::foundation::error::{TableauError, TableauResult};
use crate::update::constraint::PropertyTarget;
use crate::update::ease::Ease;
use crate::update::property::PropertyValue;
use crate::update::property_owner::{OwnerKey, PropertyOwnerStore};

/// What happens to animated values when the animation stops.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum EndAction {
    /// Keep the value reached at the time of stopping.
    #[default]
    Bake,
    /// Keep the target value, even when stopped early.
    BakeFinal,
    /// Return to the value held before the animation started.
    Discard,
}

/// Playback settings shared by the application handle and the update side.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Length of one loop in seconds.
    pub duration: f32,
    /// Number of loops to play; `0` loops forever.
    pub loop_count: u32,
    pub end_action: EndAction,
    /// Normalised progress at which a one-shot progress notification fires.
    pub progress_marker: Option<f32>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            loop_count: 1,
            end_action: EndAction::Bake,
            progress_marker: None,
        }
    }
}

impl AnimationConfig {
    /// Check duration and marker ranges.
    pub fn validate(&self) -> TableauResult<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(TableauError::validation(format!(
                "animation duration must be positive, got {}",
                self.duration
            )));
        }
        if let Some(marker) = self.progress_marker {
            if !(0.0..=1.0).contains(&marker) {
                return Err(TableauError::validation(format!(
                    "progress marker must be within [0, 1], got {marker}"
                )));
            }
        }
        Ok(())
    }
}

/// Playback state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnimationState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Animates one property towards a target value.
#[derive(Clone, Debug, PartialEq)]
pub struct Animator {
    target: PropertyTarget,
    from: Option<PropertyValue>,
    to: PropertyValue,
    ease: Ease,
}

impl Animator {
    /// Animator moving `target` from its value at play time to `to`.
    pub fn new(target: PropertyTarget, to: PropertyValue, ease: Ease) -> Self {
        Self {
            target,
            from: None,
            to,
            ease,
        }
    }

    /// Animated property.
    pub fn target(&self) -> PropertyTarget {
        self.target
    }

    fn value_at<S>(&mut self, progress: f32, store: &S) -> TableauResult<Option<PropertyValue>>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let Some(owner) = store.owner(self.target.owner) else {
            return Ok(None);
        };
        let from = match self.from {
            Some(from) => from,
            None => {
                let base = owner.property(self.target.property)?.base();
                self.from = Some(base);
                base
            }
        };
        from.lerp(&self.to, self.ease.apply(progress)).map(Some)
    }

    fn animate<S>(&mut self, buffer: BufferIndex, progress: f32, store: &mut S) -> TableauResult<()>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let Some(value) = self.value_at(progress, store)? else {
            tracing::trace!(target = ?self.target, "animated owner is gone");
            return Ok(());
        };
        if let Some(owner) = store.owner_mut(self.target.owner) {
            owner.set(buffer, self.target.property, value)?;
        }
        Ok(())
    }

    fn bake<S>(&mut self, buffer: BufferIndex, progress: f32, store: &mut S) -> TableauResult<()>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let Some(value) = self.value_at(progress, store)? else {
            return Ok(());
        };
        if let Some(owner) = store.owner_mut(self.target.owner) {
            owner.bake(buffer, self.target.property, value)?;
        }
        Ok(())
    }
}

/// Events produced by one animation step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationTick {
    /// The animation stopped during this step.
    pub finished: bool,
    /// The progress marker was crossed during this step.
    pub progress_reached: bool,
}

/// Update-side animation.
#[derive(Clone, Debug)]
pub struct SceneAnimation {
    notify_id: NotifyId,
    config: AnimationConfig,
    animators: Vec<Animator>,
    resetters: Vec<PoolKey>,
    state: AnimationState,
    elapsed: f32,
    completed_loops: u32,
    progress_reported: bool,
}

impl SceneAnimation {
    /// Stopped animation reporting under `notify_id`.
    pub fn new(notify_id: NotifyId, config: AnimationConfig) -> TableauResult<Self> {
        config.validate()?;
        Ok(Self {
            notify_id,
            config,
            animators: Vec::new(),
            resetters: Vec::new(),
            state: AnimationState::Stopped,
            elapsed: 0.0,
            completed_loops: 0,
            progress_reported: false,
        })
    }

    /// Id used for completion and progress notifications.
    pub fn notify_id(&self) -> NotifyId {
        self.notify_id
    }

    /// Playback settings.
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> AnimationState {
        self.state
    }

    /// Seconds into the current loop.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Normalised progress through the current loop.
    pub fn progress(&self) -> f32 {
        (self.elapsed / self.config.duration).clamp(0.0, 1.0)
    }

    /// Add an animator.
    pub fn add_animator(&mut self, animator: Animator) {
        self.animators.push(animator);
    }

    /// Animators in insertion order.
    pub fn animators(&self) -> &[Animator] {
        &self.animators
    }

    /// Record a resetter that must learn about this animation's destruction.
    pub fn add_resetter(&mut self, resetter: PoolKey) {
        self.resetters.push(resetter);
    }

    /// Detach the resetters so they can be told about the destruction.
    pub fn take_resetters(&mut self) -> Vec<PoolKey> {
        std::mem::take(&mut self.resetters)
    }

    /// Forget a resetter that finished on its own.
    pub fn remove_resetter(&mut self, resetter: PoolKey) {
        self.resetters.retain(|r| *r != resetter);
    }

    /// Drop every animator writing to `owner`.
    pub fn forget_owner(&mut self, owner: OwnerKey) {
        self.animators.retain(|a| a.target.owner != owner);
    }

    /// Start or resume playback.
    pub fn play(&mut self) {
        self.state = AnimationState::Playing;
    }

    /// Freeze at the current progress.
    pub fn pause(&mut self) {
        if self.state == AnimationState::Playing {
            self.state = AnimationState::Paused;
        }
    }

    /// Stop early, applying the end action. Returns whether the animation was running.
    pub fn stop<S>(&mut self, buffer: BufferIndex, store: &mut S) -> TableauResult<bool>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        if self.state == AnimationState::Stopped {
            return Ok(false);
        }
        let progress = match self.config.end_action {
            EndAction::BakeFinal => Some(1.0),
            EndAction::Bake => Some(self.progress()),
            EndAction::Discard => None,
        };
        if let Some(progress) = progress {
            for animator in &mut self.animators {
                animator.bake(buffer, progress, store)?;
            }
        }
        self.rewind();
        Ok(true)
    }

    /// Stop without applying the end action and drop every animator.
    pub fn clear(&mut self) {
        self.rewind();
        self.animators.clear();
    }

    /// Advance by `dt` seconds and write animated values into `buffer`.
    pub fn update<S>(
        &mut self,
        buffer: BufferIndex,
        dt: f32,
        store: &mut S,
    ) -> TableauResult<AnimationTick>
    where
        S: PropertyOwnerStore + ?Sized,
    {
        let mut tick = AnimationTick::default();
        match self.state {
            AnimationState::Stopped => return Ok(tick),
            AnimationState::Paused => {
                // Resetters restore the base value every frame, so hold the paused value.
                let progress = self.progress();
                for animator in &mut self.animators {
                    animator.animate(buffer, progress, store)?;
                }
                return Ok(tick);
            }
            AnimationState::Playing => {}
        }

        self.elapsed += dt.max(0.0);
        while self.elapsed >= self.config.duration {
            let last_loop =
                self.config.loop_count != 0 && self.completed_loops + 1 >= self.config.loop_count;
            if last_loop {
                self.elapsed = self.config.duration;
                tick.finished = true;
                break;
            }
            self.completed_loops += 1;
            self.elapsed -= self.config.duration;
        }

        let progress = self.progress();
        if let Some(marker) = self.config.progress_marker {
            if !self.progress_reported && progress >= marker {
                self.progress_reported = true;
                tick.progress_reached = true;
            }
        }

        for animator in &mut self.animators {
            animator.animate(buffer, progress, store)?;
        }

        if tick.finished {
            if self.config.end_action != EndAction::Discard {
                for animator in &mut self.animators {
                    animator.bake(buffer, 1.0, store)?;
                }
            }
            self.rewind();
        }
        Ok(tick)
    }

    fn rewind(&mut self) {
        self.state = AnimationState::Stopped;
        self.elapsed = 0.0;
        self.completed_loops = 0;
        self.progress_reported = false;
        for animator in &mut self.animators {
            animator.from = None;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/animation.rs"]
mod tests;
