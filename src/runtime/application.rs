//! Single-threaded harness driving the event, update and render sides in lock step.
//!
//! Each [`Application::render`] call runs one full frame: queued application messages are handed
//! to the update side, the scene is updated, and the resulting frame is rendered on a
//! [`RecordingController`]. Notifications are buffered until [`Application::send_notification`].

use std::sync::mpsc::{Receiver, Sender};

use crate::common::memory_pool::PoolCounters;
use crate::event::core::{Core, CoreOptions};
use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::recording::{ControllerOptions, RecordingController};
use crate::render::manager::{RenderManager, RenderReport};
use crate::update::manager::{UpdateManager, UpdateOutput};
use crate::update::messages::{NodeProperty, Notification, UpdateMessage};
use crate::update::property::PropertyValue;

/// Frame interval used by [`Application::render_default`].
pub const DEFAULT_RENDER_INTERVAL_MS: u32 = 16;

#[derive(Debug)]
pub struct Application {
    core: Core,
    update: UpdateManager,
    render: RenderManager<RecordingController>,
    messages: Receiver<UpdateMessage>,
    notifications: Sender<Notification>,
}

impl Application {
    pub fn new(options: CoreOptions) -> TableauResult<Self> {
        let controller = RecordingController::new(ControllerOptions {
            trace: options.trace_calls,
            ..ControllerOptions::default()
        });
        let (core, channels) = Core::new(options);
        Ok(Self {
            core,
            update: UpdateManager::new(PoolCounters::new())?,
            render: RenderManager::new(controller, channels.textures),
            messages: channels.messages,
            notifications: channels.notifications,
        })
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn update_manager(&self) -> &UpdateManager {
        &self.update
    }

    pub fn render_manager(&self) -> &RenderManager<RecordingController> {
        &self.render
    }

    pub fn controller(&self) -> &RecordingController {
        self.render.controller()
    }

    pub fn controller_mut(&mut self) -> &mut RecordingController {
        self.render.controller_mut()
    }

    /// Run one frame that advances time by `interval_ms`.
    pub fn render(&mut self, interval_ms: u32) -> TableauResult<RenderReport> {
        for message in self.messages.try_iter() {
            self.update.queue(message);
        }
        let UpdateOutput {
            render,
            notifications,
        } = self.update.update(interval_ms as f32 / 1000.0)?;
        for notification in notifications {
            self.notify(notification)?;
        }
        let report = self.render.render(render)?;
        if !report.frame_rendered.is_empty() {
            self.notify(Notification::FrameRendered(report.frame_rendered.clone()))?;
        }
        if !report.frame_presented.is_empty() {
            self.notify(Notification::FramePresented(report.frame_presented.clone()))?;
        }
        tracing::trace!(frame = report.frame, draw_calls = report.draw_calls, "frame rendered");
        Ok(report)
    }

    pub fn render_default(&mut self) -> TableauResult<RenderReport> {
        self.render(DEFAULT_RENDER_INTERVAL_MS)
    }

    /// Dispatch buffered notifications on the application side and end the event loop iteration.
    /// Returns how many were dispatched.
    pub fn send_notification(&self) -> usize {
        self.core.process_events()
    }

    /// Value of `target` in the last rendered frame.
    pub fn current_value(&self, target: NodeProperty) -> TableauResult<PropertyValue> {
        self.update.current_value(target)
    }

    /// Release every backend object.
    pub fn shutdown(&mut self) {
        self.render.shutdown();
    }

    fn notify(&self, notification: Notification) -> TableauResult<()> {
        self.notifications
            .send(notification)
            .map_err(|_| TableauError::backend("application side stopped receiving notifications"))
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}
