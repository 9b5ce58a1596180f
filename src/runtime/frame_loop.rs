//! Threaded frame loop: the update side runs on the calling thread and feeds a render thread
//! through a bounded channel, so at most `channel_capacity` frames are in flight.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::common::memory_pool::PoolCounters;
use crate::event::core::CoreChannels;
use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::controller::GraphicsController;
use crate::render::manager::{RenderFrame, RenderManager};
use crate::update::manager::UpdateManager;
use crate::update::messages::{Notification, UpdateMessage};

/// Options for [`FrameLoop::run`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FrameLoopOptions {
    /// Frames to update and render.
    pub frames: u64,
    /// Time each frame advances the scene by.
    pub frame_interval_ms: u32,
    /// Frames the update side may run ahead of the render side.
    pub channel_capacity: usize,
}

impl Default for FrameLoopOptions {
    fn default() -> Self {
        Self {
            frames: 60,
            frame_interval_ms: 16,
            channel_capacity: 2,
        }
    }
}

/// Totals collected by [`FrameLoop::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameLoopStats {
    pub frames_updated: u64,
    pub frames_rendered: u64,
    pub messages: usize,
    pub notifications: usize,
    pub commands: usize,
    pub failed_commands: usize,
    pub draw_calls: usize,
}

#[derive(Debug)]
pub struct FrameLoop<C: GraphicsController + Send> {
    update: UpdateManager,
    render: RenderManager<C>,
    messages: Receiver<UpdateMessage>,
    notifications: Sender<Notification>,
    options: FrameLoopOptions,
}

impl<C: GraphicsController + Send> FrameLoop<C> {
    /// Loop consuming the update-side ends of a [`crate::event::core::Core`]'s channels.
    pub fn new(
        channels: CoreChannels,
        controller: C,
        options: FrameLoopOptions,
    ) -> TableauResult<Self> {
        if options.frame_interval_ms == 0 {
            return Err(TableauError::validation("frame interval must be positive"));
        }
        Ok(Self {
            update: UpdateManager::new(PoolCounters::new())?,
            render: RenderManager::new(controller, channels.textures),
            messages: channels.messages,
            notifications: channels.notifications,
            options,
        })
    }

    pub fn options(&self) -> &FrameLoopOptions {
        &self.options
    }

    pub fn update_manager(&self) -> &UpdateManager {
        &self.update
    }

    pub fn render_manager(&self) -> &RenderManager<C> {
        &self.render
    }

    pub fn render_manager_mut(&mut self) -> &mut RenderManager<C> {
        &mut self.render
    }

    /// Update and render [`FrameLoopOptions::frames`] frames. Messages sent before or during the
    /// run are picked up at the start of each update.
    pub fn run(&mut self) -> TableauResult<FrameLoopStats> {
        let cap = self.options.channel_capacity.max(1);
        let frames = self.options.frames;
        let elapsed_seconds = self.options.frame_interval_ms as f32 / 1000.0;
        let Self {
            update,
            render,
            messages,
            notifications,
            ..
        } = self;

        std::thread::scope(|scope| -> TableauResult<FrameLoopStats> {
            let (tx, rx) = mpsc::sync_channel::<RenderFrame>(cap);
            let render_notifications = notifications.clone();

            let renderer = scope.spawn(move || -> TableauResult<FrameLoopStats> {
                let mut stats = FrameLoopStats::default();
                while let Ok(frame) = rx.recv() {
                    let report = render.render(frame)?;
                    stats.frames_rendered += 1;
                    stats.commands += report.commands;
                    stats.failed_commands += report.failed_commands;
                    stats.draw_calls += report.draw_calls;
                    if !report.frame_rendered.is_empty() {
                        send(
                            &render_notifications,
                            Notification::FrameRendered(report.frame_rendered),
                        );
                    }
                    if !report.frame_presented.is_empty() {
                        send(
                            &render_notifications,
                            Notification::FramePresented(report.frame_presented),
                        );
                    }
                }
                Ok(stats)
            });

            let mut produced = FrameLoopStats::default();
            let produce_res = (|| -> TableauResult<()> {
                for _ in 0..frames {
                    for message in messages.try_iter() {
                        produced.messages += 1;
                        update.queue(message);
                    }
                    let output = update.update(elapsed_seconds)?;
                    produced.frames_updated += 1;
                    produced.notifications += output.notifications.len();
                    for notification in output.notifications {
                        send(notifications, notification);
                    }
                    tx.send(output.render).map_err(|_| {
                        TableauError::backend("render thread is not accepting frames")
                    })?;
                }
                Ok(())
            })();

            drop(tx);
            let render_res = renderer
                .join()
                .map_err(|_| TableauError::backend("render thread panicked"))?;

            produce_res?;
            let rendered = render_res?;
            Ok(FrameLoopStats {
                frames_updated: produced.frames_updated,
                messages: produced.messages,
                notifications: produced.notifications,
                ..rendered
            })
        })
    }

    /// Release every backend object.
    pub fn shutdown(&mut self) {
        self.render.shutdown();
    }
}

fn send(notifications: &Sender<Notification>, notification: Notification) {
    if notifications.send(notification).is_err() {
        tracing::trace!("application side is gone, dropping notification");
    }
}
