use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use scheduler::{FrameClock, FramePacer, FrameScheduler, SystemClock};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowBuilder};

use tracing::{error, info};

use crate::gpu::WgpuHost;
use crate::plugins::PluginSet;
use crate::render_loop::RenderLoop;
use crate::types::RendererConfig;

/// Application hooks driven by the window loop.
pub trait SceneController {
    /// Runs before every tick; may restructure the plugin set.
    fn before_frame(&mut self, _plugins: &mut PluginSet) {}

    /// Key presses the driver does not handle itself.
    fn key_pressed(&mut self, _key: &Key, _plugins: &mut PluginSet) {}
}

/// Controller that leaves the plugin set alone.
#[derive(Debug, Default)]
pub struct StaticScene;

impl SceneController for StaticScene {}

/// Maps "one more frame" onto `request_redraw`, subject to the fps pacer.
struct WindowScheduler {
    window: Arc<Window>,
    pacer: FramePacer,
    pending: bool,
    cancelled: bool,
}

impl WindowScheduler {
    fn new(window: Arc<Window>, pacer: FramePacer) -> Self {
        Self {
            window,
            pacer,
            pending: true,
            cancelled: false,
        }
    }

    /// Decides what the event loop does while idle.
    fn control_flow(&mut self, now: Instant) -> ControlFlow {
        if !self.pending || self.cancelled {
            return ControlFlow::Wait;
        }
        if self.pacer.ready_for_frame(now) {
            tracing::trace!("scheduler: issuing redraw now");
            self.pending = false;
            self.window.request_redraw();
            ControlFlow::Wait
        } else if let Some(deadline) = self.pacer.next_deadline() {
            tracing::trace!(
                deadline_ms = deadline.saturating_duration_since(now).as_millis(),
                "scheduler: waiting until next frame"
            );
            ControlFlow::WaitUntil(deadline)
        } else {
            ControlFlow::Wait
        }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        if !self.cancelled {
            self.pending = true;
        }
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.pending = false;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

fn toggle_fullscreen(window: &Window) {
    if window.fullscreen().is_some() {
        window.set_fullscreen(None);
    } else {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    info!(fullscreen = window.fullscreen().is_some(), "toggled fullscreen");
}

/// Opens a window and drives a [`RenderLoop`] over `plugins` until closed.
///
/// `Escape` quits, `F`/`F11` toggle fullscreen, other keys go to `controller`.
pub fn run_window<C>(config: RendererConfig, plugins: PluginSet, mut controller: C) -> Result<()>
where
    C: SceneController + 'static,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);
    if config.fullscreen {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    }

    let host = WgpuHost::new(window.as_ref(), window.inner_size(), config.dump_shader.clone())?;
    let mut render_loop = RenderLoop::new(host, plugins);
    render_loop.start();

    let mut scheduler = WindowScheduler::new(window.clone(), FramePacer::new(config.target_fps)?);
    let mut clock = SystemClock::new();
    info!(
        width = window_size.width,
        height = window_size.height,
        fps = ?config.target_fps,
        "window renderer ready"
    );

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                scheduler.cancel();
                elwt.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match &logical_key {
                Key::Named(NamedKey::Escape) => {
                    scheduler.cancel();
                    elwt.exit();
                }
                Key::Named(NamedKey::F11) => toggle_fullscreen(&window),
                Key::Character(value) if value.eq_ignore_ascii_case("f") => toggle_fullscreen(&window),
                other => controller.key_pressed(other, render_loop.plugins_mut()),
            },
            WindowEvent::Resized(new_size) => {
                render_loop.host_mut().resize(new_size);
            }
            WindowEvent::RedrawRequested => {
                controller.before_frame(render_loop.plugins_mut());
                let now = Instant::now();
                let frame = clock.sample();
                let report = render_loop.run_frame(&mut scheduler, &frame);
                scheduler.pacer.mark_rendered(now);
                if report.draw_error.as_ref().is_some_and(|err| err.is_fatal()) {
                    error!("rendering cannot continue; exiting");
                    scheduler.cancel();
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if scheduler.is_cancelled() {
                elwt.exit();
                return;
            }
            elwt.set_control_flow(scheduler.control_flow(Instant::now()));
        }
        Event::LoopExiting => {
            let stats = render_loop.stats();
            info!(
                ticks = stats.ticks,
                recompositions = stats.recompositions,
                compile_failures = stats.compile_failures,
                "render loop stopped"
            );
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
