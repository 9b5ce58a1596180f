//! Update side: drains application messages and advances the scene one frame at a time.
//!
//! Each [`UpdateManager::update`] call runs, in order: resetters, queued messages, animations,
//! constraints, frame callbacks, property notifications, resetter pruning, and finally builds
//! the [`RenderFrame`] for the render side before flipping the buffer index.

use crate::common::memory_pool::{FixedSizeMemoryPool, PoolCounters, PoolKey};
use crate::common::notifier::NotifyId;
use crate::foundation::core::{BufferIndex, FrameId};
use crate::foundation::error::{TableauError, TableauResult};
use crate::render::manager::{DrawItem, RenderCommand, RenderFrame};
use crate::update::animation::{AnimationState, Animator, SceneAnimation};
use crate::update::constraint::{
    Constraint, ConstraintId, LifecycleObserver, PropertyTarget, RemoveAction,
};
use crate::update::frame_callback_processor::FrameCallbackProcessor;
use crate::update::messages::{NodeProperty, Notification, UpdateMessage};
use crate::update::node::{SceneGraph, node_property};
use crate::update::property::PropertyValue;
use crate::update::property_notification::{PropertyNotificationSet, ScenePropertyNotification};
use crate::update::property_owner::{
    ObserverKey, ObserverSet, PropertyOwnerObserver, PropertyOwnerStore,
};
use crate::update::resetter::{ModifierKey, PropertyResetter, ResetRequest, ResetterLifetime};

/// Arenas holding every kind of observer the scene graph can notify.
#[derive(Debug, Default)]
pub struct ObserverArenas {
    pub constraints: FixedSizeMemoryPool<Constraint>,
    pub resetters: FixedSizeMemoryPool<PropertyResetter>,
    pub frame_callbacks: FrameCallbackProcessor,
    pub property_notifications: PropertyNotificationSet,
}

impl ObserverSet for ObserverArenas {
    fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        match key {
            ObserverKey::Constraint(k) => self
                .constraints
                .get_mut(k)
                .map(|c| c as &mut dyn PropertyOwnerObserver),
            ObserverKey::Resetter(k) => self
                .resetters
                .get_mut(k)
                .map(|r| r as &mut dyn PropertyOwnerObserver),
            ObserverKey::FrameCallback(_) => self.frame_callbacks.observer_mut(key),
            ObserverKey::PropertyNotification(_) => self.property_notifications.observer_mut(key),
            ObserverKey::External(_) => None,
        }
    }
}

/// Result of one update step.
#[derive(Debug, Default)]
pub struct UpdateOutput {
    /// Work for the render side.
    pub render: RenderFrame,
    /// Events for the application, in the order they happened.
    pub notifications: Vec<Notification>,
}

/// Owner of all update-side scene state.
#[derive(Debug)]
pub struct UpdateManager {
    graph: SceneGraph,
    observers: ObserverArenas,
    animations: FixedSizeMemoryPool<SceneAnimation>,
    animation_order: Vec<(NotifyId, PoolKey)>,
    constraint_order: Vec<(ConstraintId, PoolKey)>,
    queue: Vec<UpdateMessage>,
    pending_render: Vec<RenderCommand>,
    frame_rendered: Vec<FrameId>,
    frame_presented: Vec<FrameId>,
    completed: Vec<NotifyId>,
    buffer: BufferIndex,
    frame: u64,
}

impl UpdateManager {
    /// Empty scene holding only the root node. Node allocations are recorded in `counters`.
    pub fn new(counters: PoolCounters) -> TableauResult<Self> {
        Ok(Self {
            graph: SceneGraph::new(counters)?,
            observers: ObserverArenas::default(),
            animations: FixedSizeMemoryPool::new(),
            animation_order: Vec::new(),
            constraint_order: Vec::new(),
            queue: Vec::new(),
            pending_render: Vec::new(),
            frame_rendered: Vec::new(),
            frame_presented: Vec::new(),
            completed: Vec::new(),
            buffer: BufferIndex::ZERO,
            frame: 0,
        })
    }

    /// Queue a message for the next [`UpdateManager::update`].
    pub fn queue(&mut self, message: UpdateMessage) {
        self.queue.push(message);
    }

    /// Messages waiting for the next update.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Advance the scene by `elapsed_seconds` and produce the next render frame.
    ///
    /// A rejected message is logged and skipped; the frame still completes.
    #[tracing::instrument(skip(self), fields(frame = self.frame))]
    pub fn update(&mut self, elapsed_seconds: f32) -> TableauResult<UpdateOutput> {
        let buffer = self.buffer;

        for (_, resetter) in self.observers.resetters.iter_mut() {
            resetter.request_reset_to_base_values(buffer, &mut self.graph);
        }

        for message in std::mem::take(&mut self.queue) {
            let kind = message.kind();
            if let Err(err) = self.process_message(message) {
                tracing::warn!(message = kind, %err, "update message rejected");
            }
        }

        let mut completed = std::mem::take(&mut self.completed);
        let mut progress = Vec::new();
        for (id, key) in &self.animation_order {
            let Some(animation) = self.animations.get_mut(*key) else {
                continue;
            };
            match animation.update(buffer, elapsed_seconds, &mut self.graph) {
                Ok(tick) => {
                    if tick.progress_reached {
                        progress.push(*id);
                    }
                    if tick.finished {
                        completed.push(*id);
                    }
                }
                Err(err) => tracing::warn!(animation = ?id, %err, "animation step failed"),
            }
        }

        for (id, key) in &self.constraint_order {
            if let Some(constraint) = self.observers.constraints.get_mut(*key) {
                if let Err(err) = constraint.apply(buffer, &mut self.graph) {
                    tracing::warn!(constraint = ?id, %err, "constraint apply failed");
                }
            }
        }

        if self.graph.take_hierarchy_changed() {
            self.observers.frame_callbacks.node_hierarchy_changed();
        }
        let mut resets = Vec::new();
        let keep_rendering = self.observers.frame_callbacks.update(
            buffer,
            elapsed_seconds,
            &mut self.graph,
            &mut resets,
        );
        for request in resets {
            if let Err(err) = self.add_baker_resetter(request) {
                tracing::warn!(owner = ?request.owner, %err, "frame callback write not tracked");
            }
        }

        let property_changes = self
            .observers
            .property_notifications
            .check_all(buffer, &self.graph);

        self.prune_resetters();
        let draw_list = self.draw_list(buffer);

        let mut notifications = Vec::new();
        if !completed.is_empty() {
            notifications.push(Notification::AnimationsCompleted(completed));
        }
        notifications.extend(progress.into_iter().map(Notification::AnimationProgressReached));
        notifications.extend(
            property_changes
                .into_iter()
                .map(|(id, validity)| Notification::PropertyNotified { id, validity }),
        );

        let render = RenderFrame {
            frame: self.frame,
            buffer,
            commands: std::mem::take(&mut self.pending_render),
            draw_list,
            frame_rendered: std::mem::take(&mut self.frame_rendered),
            frame_presented: std::mem::take(&mut self.frame_presented),
            keep_rendering,
        };
        self.graph.clear_updated_flags();
        self.buffer = buffer.other();
        self.frame += 1;
        Ok(UpdateOutput {
            render,
            notifications,
        })
    }

    /// Apply one message to the scene immediately.
    pub fn process_message(&mut self, message: UpdateMessage) -> TableauResult<()> {
        let buffer = self.buffer;
        match message {
            UpdateMessage::AddNode(id) => self.graph.add_node(id).map(|_| ()),
            UpdateMessage::ConnectNode { parent, child } => {
                let parent = self.graph.require(parent)?;
                let child = self.graph.require(child)?;
                self.graph
                    .connect_child(parent, child, &mut self.observers)
            }
            UpdateMessage::DisconnectNode(id) => {
                let key = self.graph.require(id)?;
                self.graph
                    .disconnect_child(buffer, key, &mut self.observers)
            }
            UpdateMessage::DestroyNode(id) => {
                let key = self.graph.require(id)?;
                for (_, animation) in self.animations.iter_mut() {
                    animation.forget_owner(key);
                }
                self.graph.destroy_node(buffer, key, &mut self.observers)
            }
            UpdateMessage::SetProperty { target, value } => {
                self.write_property(target, value, ResetterLifetime::Set)
            }
            UpdateMessage::BakeProperty { target, value } => {
                self.write_property(target, value, ResetterLifetime::Bake)
            }
            UpdateMessage::AttachTexture { node, texture } => {
                let key = self.graph.require(node)?;
                if let Some(node) = self.graph.node_mut(key) {
                    node.set_texture(texture);
                }
                Ok(())
            }
            UpdateMessage::AddConstraint {
                id,
                target,
                sources,
                function,
                remove_action,
            } => {
                if self.constraint_order.iter().any(|(c, _)| *c == id) {
                    return Err(TableauError::validation(format!("{id:?} already exists")));
                }
                let target = self.resolve(target)?;
                let sources = sources
                    .into_iter()
                    .map(|s| self.resolve(s))
                    .collect::<TableauResult<Vec<_>>>()?;
                let mut constraint = Constraint::new(target, sources, function);
                constraint.set_remove_action(remove_action);

                let key = self.observers.constraints.allocate_with(constraint)?;
                let connected = match self.observers.constraints.get_mut(key) {
                    Some(c) => c.on_connect(ObserverKey::Constraint(key), &mut self.graph),
                    None => Err(TableauError::contract("constraint slot vanished")),
                };
                if let Err(err) = connected {
                    self.observers.constraints.free(key);
                    return Err(err);
                }
                let resetter = self.add_modifier_resetter(target, ModifierKey::Constraint(key))?;
                if let Some(c) = self.observers.constraints.get_mut(key) {
                    c.add_lifecycle_observer(resetter);
                }
                self.constraint_order.push((id, key));
                tracing::debug!(constraint = ?id, "constraint added");
                Ok(())
            }
            UpdateMessage::RemoveConstraint(id) => {
                let Some(pos) = self.constraint_order.iter().position(|(c, _)| *c == id) else {
                    tracing::trace!(constraint = ?id, "constraint already removed");
                    return Ok(());
                };
                let (_, key) = self.constraint_order.remove(pos);
                // The resetters already ran this frame, so the value to bake is recomputed.
                let observer = self.observers.constraints.get_mut(key).and_then(|c| {
                    if c.remove_action() == RemoveAction::Bake {
                        if let Err(err) = c.apply(buffer, &mut self.graph) {
                            tracing::debug!(constraint = ?id, %err, "final apply failed");
                        }
                    }
                    c.remove(buffer, &mut self.graph);
                    c.take_lifecycle_observer()
                });
                if let Some(resetter) = observer.and_then(|r| self.observers.resetters.get_mut(r)) {
                    resetter.object_destroyed();
                }
                self.observers.constraints.free(key);
                Ok(())
            }
            UpdateMessage::SetConstraintRemoveAction { id, action } => {
                let key = self.constraint_key(id)?;
                if let Some(c) = self.observers.constraints.get_mut(key) {
                    c.set_remove_action(action);
                }
                Ok(())
            }
            UpdateMessage::AddAnimation { id, config } => {
                if self.animation_order.iter().any(|(a, _)| *a == id) {
                    return Err(TableauError::validation(format!(
                        "animation {id:?} already exists"
                    )));
                }
                let key = self
                    .animations
                    .allocate_with(SceneAnimation::new(id, config)?)?;
                self.animation_order.push((id, key));
                Ok(())
            }
            UpdateMessage::AddAnimator {
                animation,
                target,
                to,
                ease,
            } => {
                let key = self.animation_key(animation)?;
                let target = self.resolve(target)?;
                let current = self
                    .graph
                    .owner(target.owner)
                    .ok_or_else(|| TableauError::invalid_handle("animated node is gone"))?
                    .get(buffer, target.property)?;
                if current.kind() != to.kind() {
                    return Err(TableauError::validation(format!(
                        "cannot animate a {:?} property towards a {:?}",
                        current.kind(),
                        to.kind()
                    )));
                }
                let resetter = self.add_modifier_resetter(target, ModifierKey::Animation(key))?;
                if let Some(a) = self.animations.get_mut(key) {
                    a.add_animator(Animator::new(target, to, ease));
                    a.add_resetter(resetter);
                }
                Ok(())
            }
            UpdateMessage::PlayAnimation(id) => {
                self.animation_mut(id)?.play();
                Ok(())
            }
            UpdateMessage::PauseAnimation(id) => {
                self.animation_mut(id)?.pause();
                Ok(())
            }
            UpdateMessage::StopAnimation(id) => {
                let key = self.animation_key(id)?;
                let stopped = match self.animations.get_mut(key) {
                    Some(a) => a.stop(buffer, &mut self.graph)?,
                    None => false,
                };
                if stopped {
                    self.completed.push(id);
                }
                Ok(())
            }
            UpdateMessage::ClearAnimation(id) => {
                let key = self.animation_key(id)?;
                let resetters = match self.animations.get_mut(key) {
                    Some(a) => {
                        a.clear();
                        a.take_resetters()
                    }
                    None => Vec::new(),
                };
                self.modifier_destroyed(&resetters);
                Ok(())
            }
            UpdateMessage::DestroyAnimation(id) => {
                let Some(pos) = self.animation_order.iter().position(|(a, _)| *a == id) else {
                    tracing::trace!(animation = ?id, "animation already destroyed");
                    return Ok(());
                };
                let (_, key) = self.animation_order.remove(pos);
                if let Some(mut animation) = self.animations.free(key) {
                    let resetters = animation.take_resetters();
                    self.modifier_destroyed(&resetters);
                }
                Ok(())
            }
            UpdateMessage::AddFrameCallback { link, root } => self
                .observers
                .frame_callbacks
                .add_frame_callback(link, root, &mut self.graph),
            UpdateMessage::RemoveFrameCallback(id) => {
                if !self
                    .observers
                    .frame_callbacks
                    .remove_frame_callback(id, &mut self.graph)
                {
                    tracing::trace!(?id, "frame callback already removed");
                }
                Ok(())
            }
            UpdateMessage::NotifyFrameCallback { id, sync_point } => {
                if !self
                    .observers
                    .frame_callbacks
                    .notify_frame_callback(id, sync_point)
                {
                    tracing::trace!(?id, sync_point, "sync point for unknown frame callback");
                }
                Ok(())
            }
            UpdateMessage::AddPropertyNotification {
                id,
                target,
                condition,
                mode,
            } => {
                let target = self.resolve(target)?;
                let notification = ScenePropertyNotification::new(
                    id,
                    target.owner,
                    target.property,
                    condition,
                    mode,
                );
                self.observers
                    .property_notifications
                    .add(notification, &mut self.graph)
            }
            UpdateMessage::RemovePropertyNotification(id) => {
                self.observers
                    .property_notifications
                    .remove(id, &mut self.graph);
                Ok(())
            }
            UpdateMessage::FrameRendered(id) => {
                self.frame_rendered.push(id);
                Ok(())
            }
            UpdateMessage::FramePresented(id) => {
                self.frame_presented.push(id);
                Ok(())
            }
            UpdateMessage::Render(command) => {
                self.pending_render.push(command);
                Ok(())
            }
        }
    }

    /// Value of a node property as of the last completed frame.
    pub fn current_value(&self, target: NodeProperty) -> TableauResult<PropertyValue> {
        let key = self.graph.require(target.node)?;
        self.graph
            .owner(key)
            .ok_or_else(|| TableauError::invalid_handle(format!("{:?} is gone", target.node)))?
            .get(self.buffer.other(), target.property)
    }

    /// Playback state of an update-side animation.
    pub fn animation_state(&self, id: NotifyId) -> Option<AnimationState> {
        let (_, key) = self.animation_order.iter().find(|(a, _)| *a == id)?;
        self.animations.get(*key).map(SceneAnimation::state)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Buffer the next update writes.
    pub fn buffer(&self) -> BufferIndex {
        self.buffer
    }

    /// Number of completed updates.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_order.len()
    }

    pub fn animation_count(&self) -> usize {
        self.animation_order.len()
    }

    /// Live resetters of every kind.
    pub fn resetter_count(&self) -> usize {
        self.observers.resetters.len()
    }

    pub fn frame_callback_count(&self) -> usize {
        self.observers.frame_callbacks.len()
    }

    pub fn property_notification_count(&self) -> usize {
        self.observers.property_notifications.len()
    }

    fn resolve(&self, target: NodeProperty) -> TableauResult<PropertyTarget> {
        let owner = self.graph.require(target.node)?;
        self.graph
            .owner(owner)
            .ok_or_else(|| TableauError::invalid_handle(format!("{:?} is gone", target.node)))?
            .property(target.property)?;
        Ok(PropertyTarget {
            owner,
            property: target.property,
        })
    }

    fn constraint_key(&self, id: ConstraintId) -> TableauResult<PoolKey> {
        self.constraint_order
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, k)| *k)
            .ok_or_else(|| TableauError::invalid_handle(format!("{id:?} does not exist")))
    }

    fn animation_key(&self, id: NotifyId) -> TableauResult<PoolKey> {
        self.animation_order
            .iter()
            .find(|(a, _)| *a == id)
            .map(|(_, k)| *k)
            .ok_or_else(|| TableauError::invalid_handle(format!("animation {id:?} does not exist")))
    }

    fn animation_mut(&mut self, id: NotifyId) -> TableauResult<&mut SceneAnimation> {
        let key = self.animation_key(id)?;
        self.animations
            .get_mut(key)
            .ok_or_else(|| TableauError::invalid_handle(format!("animation {id:?} is gone")))
    }

    fn write_property(
        &mut self,
        target: NodeProperty,
        value: PropertyValue,
        lifetime: ResetterLifetime,
    ) -> TableauResult<()> {
        let PropertyTarget { owner, property } = self.resolve(target)?;
        let buffer = self.buffer;
        let store = self
            .graph
            .owner_mut(owner)
            .ok_or_else(|| TableauError::invalid_handle(format!("{:?} is gone", target.node)))?;
        match lifetime {
            ResetterLifetime::Set => store.set(buffer, property, value)?,
            ResetterLifetime::Bake => store.bake(buffer, property, value)?,
        }
        self.add_baker_resetter(ResetRequest {
            owner,
            property,
            lifetime,
        })
    }

    fn add_baker_resetter(&mut self, request: ResetRequest) -> TableauResult<()> {
        let resetter = PropertyResetter::baker(request.owner, request.property, request.lifetime);
        self.install_resetter(resetter).map(|_| ())
    }

    fn add_modifier_resetter(
        &mut self,
        target: PropertyTarget,
        modifier: ModifierKey,
    ) -> TableauResult<PoolKey> {
        let resetter = PropertyResetter::for_modifier(target.owner, target.property, modifier);
        self.install_resetter(resetter)
    }

    fn install_resetter(&mut self, resetter: PropertyResetter) -> TableauResult<PoolKey> {
        let key = self.observers.resetters.allocate_with(resetter)?;
        let initialized = match self.observers.resetters.get_mut(key) {
            Some(r) => r.initialize(ObserverKey::Resetter(key), &mut self.graph),
            None => Err(TableauError::contract("resetter slot vanished")),
        };
        if let Err(err) = initialized {
            self.observers.resetters.free(key);
            return Err(err);
        }
        Ok(key)
    }

    fn modifier_destroyed(&mut self, resetters: &[PoolKey]) {
        for key in resetters {
            if let Some(resetter) = self.observers.resetters.get_mut(*key) {
                resetter.object_destroyed();
            }
        }
    }

    fn prune_resetters(&mut self) {
        let finished: Vec<PoolKey> = self
            .observers
            .resetters
            .iter_mut()
            .filter_map(|(key, r)| r.is_finished().then_some(key))
            .collect();
        for key in finished {
            let Some(resetter) = self.observers.resetters.get_mut(key) else {
                continue;
            };
            resetter.release(ObserverKey::Resetter(key), &mut self.graph);
            let modifier = resetter.modifier();
            self.observers.resetters.free(key);
            match modifier {
                Some(ModifierKey::Constraint(c)) => {
                    if let Some(c) = self.observers.constraints.get_mut(c) {
                        c.remove_lifecycle_observer(key);
                    }
                }
                Some(ModifierKey::Animation(a)) => {
                    if let Some(a) = self.animations.get_mut(a) {
                        a.remove_resetter(key);
                    }
                }
                None => {}
            }
        }
    }

    fn draw_list(&self, buffer: BufferIndex) -> Vec<DrawItem> {
        let root = self.graph.root();
        self.graph
            .subtree(root)
            .into_iter()
            .filter(|key| *key != root)
            .filter_map(|key| {
                let node = self.graph.node(key)?;
                let [w, h, d, _] = node.vector(buffer, node_property::SIZE);
                Some(DrawItem {
                    node: node.id(),
                    world_position: self.graph.world_position(buffer, key),
                    size: [w, h, d],
                    color: node.vector(buffer, node_property::COLOR),
                    texture: node.texture(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/manager.rs"]
mod tests;
