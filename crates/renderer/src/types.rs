use std::path::PathBuf;

/// Window and pacing options for [`crate::run_window`].
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub title: String,
    /// Initial inner size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional FPS cap; `None` follows the display refresh.
    pub target_fps: Option<f32>,
    pub fullscreen: bool,
    /// Where to write each wrapped fragment program, for debugging.
    pub dump_shader: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "vjshade".to_string(),
            surface_size: (480, 320),
            target_fps: None,
            fullscreen: false,
            dump_shader: None,
        }
    }
}
