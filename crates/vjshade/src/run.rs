use anyhow::{Context, Result};
use renderer::RendererConfig;
use sceneconfig::SceneConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::controller::SceneWatcher;
use crate::paths::AppPaths;
use crate::plugins::plugin_set_from_scene;
use crate::scene::SceneSource;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let source = SceneSource::resolve(args.config.as_deref(), &paths);
    let scene = source.load()?;
    tracing::info!(
        scene = %source.path().map(|p| p.display().to_string()).unwrap_or_else(|| "built-in demo".into()),
        chunks = scene.chunks.len(),
        "loaded scene"
    );

    let config = renderer_config(&scene, &args)?;
    let plugins = plugin_set_from_scene(&scene);
    let watch_path = if args.no_watch {
        None
    } else {
        source.path().map(|path| path.to_path_buf())
    };
    if let Some(path) = watch_path.as_ref() {
        tracing::debug!(path = %path.display(), "watching scene file for changes");
    }

    renderer::run_window(config, plugins, SceneWatcher::new(watch_path))
}

/// Window settings from the scene, with command-line overrides applied.
pub fn renderer_config(scene: &SceneConfig, args: &RunArgs) -> Result<RendererConfig> {
    let window = &scene.window;
    let surface_size = match args.size {
        Some(size) => size,
        None => window.surface_size().context("invalid window size in scene")?,
    };
    let target_fps = match args.fps {
        Some(fps) if fps > 0.0 => Some(fps),
        Some(_) => None,
        None => window.target_fps(),
    };

    Ok(RendererConfig {
        title: window.title.clone(),
        surface_size,
        target_fps,
        fullscreen: args.fullscreen || window.fullscreen,
        dump_shader: args.dump_shader.clone().or_else(|| window.dump_shader.clone()),
    })
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    const SCENE: &str = r#"
version = 1
[window]
title = "club"
size = "640x480"
fps = 24
dump_shader = "/tmp/scene.frag"
"#;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["vjshade"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn scene_settings_apply_without_overrides() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        let config = renderer_config(&scene, &args(&[])).unwrap();
        assert_eq!(config.title, "club");
        assert_eq!(config.surface_size, (640, 480));
        assert_eq!(config.target_fps, Some(24.0));
        assert!(!config.fullscreen);
        assert_eq!(
            config.dump_shader.as_deref(),
            Some(std::path::Path::new("/tmp/scene.frag"))
        );
    }

    #[test]
    fn command_line_overrides_scene() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        let config = renderer_config(
            &scene,
            &args(&["--size", "320x200", "--fps", "0", "--fullscreen"]),
        )
        .unwrap();
        assert_eq!(config.surface_size, (320, 200));
        assert_eq!(config.target_fps, None);
        assert!(config.fullscreen);
    }
}
