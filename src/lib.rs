//! Tableau is the update/render core of a retained-mode scene graph.
//!
//! Three sides cooperate:
//!
//! - The application side ([`Core`] and its handles) creates objects and queues messages.
//! - The update side ([`update::manager::UpdateManager`]) owns the double-buffered scene: it
//!   runs animations, constraints and frame callbacks once per frame.
//! - The render side ([`render::manager::RenderManager`]) turns each frame into calls on a
//!   [`graphics::controller::GraphicsController`].
//!
//! [`Application`] drives all three in lock step on one thread; [`FrameLoop`] runs the render
//! side on its own thread.
#![forbid(unsafe_code)]

pub mod foundation {
    pub mod core;
    pub mod error;
    pub mod hash;
}

pub mod common {
    pub mod memory_pool;
    pub mod notifier;
}

pub mod graphics {
    pub mod controller;
    pub mod format;
    pub mod pixel_data;
    pub mod recording;
    pub mod shader;
}

pub mod update {
    pub mod animation;
    pub mod constraint;
    pub mod ease;
    pub mod frame_callback;
    pub mod frame_callback_processor;
    pub mod manager;
    pub mod messages;
    pub mod node;
    pub mod property;
    pub mod property_notification;
    pub mod property_owner;
    pub mod resetter;
    pub mod update_proxy;
}

pub mod render {
    pub mod manager;
    pub mod native;
    pub mod texture;
}

pub mod event {
    pub mod animation;
    pub mod core;
    pub mod frame_buffer;
    pub mod frame_callback;
    pub mod playlist;
    pub mod property_notification;
    pub mod texture;
}

pub mod runtime {
    pub mod application;
    pub mod frame_loop;
}

pub use crate::foundation::core::{BufferIndex, FrameId, Rect};
pub use crate::foundation::error::{TableauError, TableauResult};

pub use crate::common::memory_pool::{FixedSizeMemoryPool, PoolKey, SharedMemoryPool};
pub use crate::common::notifier::NotifyId;
pub use crate::event::animation::Animation;
pub use crate::event::core::{Core, CoreChannels, CoreOptions};
pub use crate::event::frame_buffer::FrameBuffer;
pub use crate::event::property_notification::PropertyNotification;
pub use crate::event::texture::Texture;
pub use crate::graphics::format::{PixelFormat, TextureType};
pub use crate::graphics::pixel_data::PixelData;
pub use crate::graphics::recording::{ControllerOptions, RecordingController};
pub use crate::render::native::NativeImageSource;
pub use crate::render::texture::UploadParams;
pub use crate::runtime::application::Application;
pub use crate::runtime::frame_loop::{FrameLoop, FrameLoopOptions, FrameLoopStats};
pub use crate::update::animation::{AnimationConfig, EndAction};
pub use crate::update::constraint::{ConstraintId, RemoveAction};
pub use crate::update::ease::Ease;
pub use crate::update::frame_callback::{FrameCallbackInterface, SharedFrameCallbackInterface};
pub use crate::update::messages::NodeProperty;
pub use crate::update::node::{NodeId, node_property};
pub use crate::update::property::PropertyValue;
pub use crate::update::property_notification::{NotifyCondition, NotifyMode};
pub use crate::update::update_proxy::UpdateProxy;
