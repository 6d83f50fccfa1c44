use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sceneconfig::SceneConfig;

use crate::paths::AppPaths;

/// Scene shown when no scene file is configured.
pub const DEMO_SCENE: &str = r#"
version = 1

[window]
title = "vjshade demo"
size = "480x320"

[[chunks]]
kind = "gradient"
uniforms = '''
uniform vec3 u_top;
uniform vec3 u_bottom;
'''
main = "gl_FragColor.rgb = mix(u_bottom, u_top, newUV.y);"

[chunks.values]
u_top = [0.08, 0.12, 0.28]
u_bottom = [0.55, 0.22, 0.35]

[[chunks]]
kind = "stripes"
source = "if (i == 0) { return vec4(vec3(step(0.5, fract(uv.x * 12.0))), 1.0); }"
uniforms = "uniform float u_stripes;"
main = "gl_FragColor.rgb = mix(gl_FragColor.rgb, sampleLayer(0, newUV).rgb, u_stripes);"

[chunks.animate]
u_stripes = { oscillate = "6s", min = 0.0, max = 0.2 }

[[chunks]]
kind = "grain"
uniforms = '''
uniform float u_time;
uniform float u_grain;
'''
main = "gl_FragColor.rgb += u_grain * snoise(vec3(newUV * 48.0, u_time * 0.5));"

[chunks.values]
u_grain = 0.06

[chunks.animate]
u_time = "time"

[[chunks]]
kind = "vignette"
function = '''
float vignette(vec2 uv, float strength) {
	vec2 d = uv - centerCoord;
	return clamp(1.0 - strength * dot(d, d) * 2.0, 0.0, 1.0);
}
'''
uniforms = "uniform float u_vignette;"
main = "gl_FragColor.rgb *= vignette(newUV, u_vignette);"

[chunks.values]
u_vignette = 0.9

[[chunks]]
kind = "vignette"
enabled = false
function = '''
float vignette(vec2 uv, float strength) {
	vec2 d = uv - centerCoord;
	return clamp(1.0 - strength * dot(d, d) * 2.0, 0.0, 1.0);
}
'''
uniforms = "uniform float u_vignette_hard;"
main = "gl_FragColor.rgb *= vignette(newUV, u_vignette_hard);"

[chunks.values]
u_vignette_hard = 1.8
"#;

/// Where a scene came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneSource {
    File(PathBuf),
    BuiltIn,
}

impl SceneSource {
    /// An explicit path wins; otherwise `scene.toml` in the config dir if it exists.
    pub fn resolve(explicit: Option<&Path>, paths: &AppPaths) -> Self {
        if let Some(path) = explicit {
            return Self::File(path.to_path_buf());
        }
        let user_scene = paths.scene_file();
        if user_scene.is_file() {
            Self::File(user_scene)
        } else {
            Self::BuiltIn
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::BuiltIn => None,
        }
    }

    pub fn load(&self) -> Result<SceneConfig> {
        match self {
            Self::File(path) => load_scene_file(path),
            Self::BuiltIn => SceneConfig::from_toml_str(DEMO_SCENE)
                .context("built-in demo scene is invalid"),
        }
    }
}

pub fn load_scene_file(path: &Path) -> Result<SceneConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene file at {}", path.display()))?;
    SceneConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load scene file at {}", path.display()))
}
