//! Render loop and wgpu host for composed chunk programs.
//!
//! ```text
//!   PluginSet (dirty?) ──▶ ShaderComposer ──▶ RenderHost::compile ──▶ bound program
//!          ▲                                                            │
//!   SceneController                          frame hooks ─▶ UniformTable ─▶ upload ─▶ draw
//! ```
//!
//! [`RenderLoop`] is toolkit-agnostic: it ticks whenever a
//! [`scheduler::FrameScheduler`] runs a frame and talks to the GPU only
//! through [`RenderHost`]. [`WgpuHost`] is the real host; [`run_window`] wires
//! both to a winit window.
//!
//! The composed program is GLSL ES flavoured (`varying vUv`, `gl_FragColor`,
//! loose `uniform`s). [`WgpuHost`] rewrites it for the GLSL 450 frontend,
//! validates it with naga, and packs the uniform table into a std140 block.
//! Compile failures never stop rendering: the last good program stays bound.

mod compile;
mod error;
mod gpu;
mod host;
mod plugins;
mod render_loop;
mod types;
mod window;

pub use error::{CompileLinkError, CompileStage, DrawError, RenderError};
pub use gpu::{GpuProgram, WgpuHost};
pub use host::RenderHost;
pub use plugins::{PluginId, PluginSet};
pub use render_loop::{LoopState, LoopStats, RenderLoop, TickReport};
pub use types::RendererConfig;
pub use window::{run_window, SceneController, StaticScene};
pub use winit::keyboard::{Key, NamedKey};
