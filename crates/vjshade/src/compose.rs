use anyhow::{Context, Result};
use chunks::{ComposedProgram, ShaderComposer};
use sceneconfig::SceneConfig;
use serde::Serialize;

use crate::cli::{ComposeArgs, ComposeFormat};
use crate::paths::AppPaths;
use crate::plugins::plugin_set_from_scene;
use crate::scene::SceneSource;

#[derive(Debug, Serialize)]
struct ComposeReport<'a> {
    chunks: Vec<&'a str>,
    functions: Vec<&'a str>,
    #[serde(flatten)]
    program: &'a ComposedProgram,
}

pub fn run_compose(args: ComposeArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let scene = SceneSource::resolve(args.config.as_deref(), &paths).load()?;
    let output = render(&scene, args.format, args.numbered)?;
    print!("{output}");
    Ok(())
}

/// Composes the enabled chunks of `scene` the way the renderer's first frame does.
pub fn render(scene: &SceneConfig, format: ComposeFormat, numbered: bool) -> Result<String> {
    let plugins = plugin_set_from_scene(scene);
    let mut composer = ShaderComposer::new();
    let program = composer.compose_plugins(plugins.active());

    match format {
        ComposeFormat::Glsl if numbered => Ok(program.numbered().to_string()),
        ComposeFormat::Glsl => Ok(program.source.clone()),
        ComposeFormat::Json => {
            let report = ComposeReport {
                chunks: plugins.active().map(|plugin| plugin.kind()).collect(),
                functions: composer.functions().iter().collect(),
                program: &program,
            };
            let mut json = serde_json::to_string_pretty(&report)
                .context("failed to serialise composed program")?;
            json.push('\n');
            Ok(json)
        }
    }
}
