//! Messages between the application and the update side.

use std::sync::Arc;

use crate::common::memory_pool::PoolKey;
use crate::common::notifier::NotifyId;
use crate::foundation::core::FrameId;
use crate::render::manager::RenderCommand;
use crate::update::animation::AnimationConfig;
use crate::update::constraint::{ConstraintFunction, ConstraintId, RemoveAction};
use crate::update::ease::Ease;
use crate::update::frame_callback::{FrameCallbackLink, InterfaceId};
use crate::update::node::NodeId;
use crate::update::property::{PropertyIndex, PropertyValue};
use crate::update::property_notification::{NotifyCondition, NotifyMode};

/// A property of a node, addressed by application ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeProperty {
    pub node: NodeId,
    pub property: PropertyIndex,
}

impl NodeProperty {
    pub fn new(node: NodeId, property: PropertyIndex) -> Self {
        Self { node, property }
    }
}

/// Application to update-side request, drained once per frame in send order.
pub enum UpdateMessage {
    AddNode(NodeId),
    ConnectNode {
        parent: NodeId,
        child: NodeId,
    },
    DisconnectNode(NodeId),
    DestroyNode(NodeId),
    /// Write the current frame's value; the base value returns after two frames.
    SetProperty {
        target: NodeProperty,
        value: PropertyValue,
    },
    /// Write the base value.
    BakeProperty {
        target: NodeProperty,
        value: PropertyValue,
    },
    AttachTexture {
        node: NodeId,
        texture: Option<PoolKey>,
    },
    AddConstraint {
        id: ConstraintId,
        target: NodeProperty,
        sources: Vec<NodeProperty>,
        function: Box<dyn ConstraintFunction>,
        remove_action: RemoveAction,
    },
    RemoveConstraint(ConstraintId),
    SetConstraintRemoveAction {
        id: ConstraintId,
        action: RemoveAction,
    },
    AddAnimation {
        id: NotifyId,
        config: AnimationConfig,
    },
    AddAnimator {
        animation: NotifyId,
        target: NodeProperty,
        to: PropertyValue,
        ease: Ease,
    },
    PlayAnimation(NotifyId),
    PauseAnimation(NotifyId),
    StopAnimation(NotifyId),
    ClearAnimation(NotifyId),
    DestroyAnimation(NotifyId),
    AddFrameCallback {
        link: Arc<FrameCallbackLink>,
        root: Option<NodeId>,
    },
    RemoveFrameCallback(InterfaceId),
    NotifyFrameCallback {
        id: InterfaceId,
        sync_point: u32,
    },
    AddPropertyNotification {
        id: NotifyId,
        target: NodeProperty,
        condition: NotifyCondition,
        mode: NotifyMode,
    },
    RemovePropertyNotification(NotifyId),
    /// Report `FrameId` once the next frame has been rendered.
    FrameRendered(FrameId),
    /// Report `FrameId` once the next frame has been presented.
    FramePresented(FrameId),
    /// Forwarded untouched to the render side with the next frame.
    Render(RenderCommand),
}

impl UpdateMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddNode(_) => "add_node",
            Self::ConnectNode { .. } => "connect_node",
            Self::DisconnectNode(_) => "disconnect_node",
            Self::DestroyNode(_) => "destroy_node",
            Self::SetProperty { .. } => "set_property",
            Self::BakeProperty { .. } => "bake_property",
            Self::AttachTexture { .. } => "attach_texture",
            Self::AddConstraint { .. } => "add_constraint",
            Self::RemoveConstraint(_) => "remove_constraint",
            Self::SetConstraintRemoveAction { .. } => "set_constraint_remove_action",
            Self::AddAnimation { .. } => "add_animation",
            Self::AddAnimator { .. } => "add_animator",
            Self::PlayAnimation(_) => "play_animation",
            Self::PauseAnimation(_) => "pause_animation",
            Self::StopAnimation(_) => "stop_animation",
            Self::ClearAnimation(_) => "clear_animation",
            Self::DestroyAnimation(_) => "destroy_animation",
            Self::AddFrameCallback { .. } => "add_frame_callback",
            Self::RemoveFrameCallback(_) => "remove_frame_callback",
            Self::NotifyFrameCallback { .. } => "notify_frame_callback",
            Self::AddPropertyNotification { .. } => "add_property_notification",
            Self::RemovePropertyNotification(_) => "remove_property_notification",
            Self::FrameRendered(_) => "frame_rendered",
            Self::FramePresented(_) => "frame_presented",
            Self::Render(command) => command.kind(),
        }
    }
}

impl std::fmt::Debug for UpdateMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(command) => f.debug_tuple("Render").field(command).finish(),
            other => f.debug_tuple("UpdateMessage").field(&other.kind()).finish(),
        }
    }
}

/// Update-side event reported back to the application.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Notification {
    /// Animations that finished this frame, in the order they finished.
    AnimationsCompleted(Vec<NotifyId>),
    AnimationProgressReached(NotifyId),
    PropertyNotified {
        id: NotifyId,
        validity: bool,
    },
    FrameRendered(Vec<FrameId>),
    FramePresented(Vec<FrameId>),
}
