use std::borrow::Cow;

use chunks::{ChunkPlugin, FrameHook, FrameTime, ShaderChunks, UniformTable, UniformValue};
use renderer::PluginSet;
use sceneconfig::{AnimationBinding, ChunkSpec, SceneConfig};

/// Chunk plugin described by a scene file entry.
#[derive(Debug, Clone)]
pub struct DeclaredChunk {
    kind: String,
    chunks: ShaderChunks,
    function: Option<String>,
    values: Vec<(String, UniformValue)>,
    animations: Vec<(String, AnimationBinding)>,
    seeded: bool,
}

impl DeclaredChunk {
    pub fn from_spec(spec: &ChunkSpec) -> Self {
        Self {
            kind: spec.kind.clone(),
            chunks: spec.shader_chunks(),
            function: spec.helper_function().map(str::to_string),
            values: spec
                .values
                .iter()
                .map(|(name, literal)| (name.clone(), literal.to_uniform_value()))
                .collect(),
            animations: spec
                .animate
                .iter()
                .map(|(name, binding)| (name.clone(), binding.clone()))
                .collect(),
            seeded: false,
        }
    }
}

impl ChunkPlugin for DeclaredChunk {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn shader_chunks(&self) -> Option<ShaderChunks> {
        Some(self.chunks.clone())
    }

    fn glsl_function(&self) -> Option<Cow<'_, str>> {
        self.function.as_deref().map(Cow::Borrowed)
    }

    fn frame_hook(&mut self) -> Option<&mut dyn FrameHook> {
        if self.values.is_empty() && self.animations.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl FrameHook for DeclaredChunk {
    fn on_frame(&mut self, frame: &FrameTime, uniforms: &mut UniformTable) {
        if !self.seeded {
            for (name, value) in &self.values {
                uniforms.set(name.clone(), value.clone());
            }
            self.seeded = true;
        }
        for (name, binding) in &self.animations {
            uniforms.set(name.clone(), binding.sample(frame));
        }
    }
}

pub fn scene_plugins(scene: &SceneConfig) -> Vec<(Box<dyn ChunkPlugin>, bool)> {
    scene
        .chunks
        .iter()
        .map(|spec| {
            let plugin: Box<dyn ChunkPlugin> = Box::new(DeclaredChunk::from_spec(spec));
            (plugin, spec.enabled)
        })
        .collect()
}

/// Builds a plugin set holding every chunk of `scene`, disabled ones included.
pub fn plugin_set_from_scene(scene: &SceneConfig) -> PluginSet {
    let mut plugins = PluginSet::new();
    load_into(&mut plugins, scene);
    plugins
}

/// Replaces the contents of `plugins` with the chunks of `scene`.
pub fn load_into(plugins: &mut PluginSet, scene: &SceneConfig) {
    plugins.clear();
    for (plugin, enabled) in scene_plugins(scene) {
        let id = plugins.push(plugin);
        if !enabled {
            plugins.set_enabled(id, false);
        }
    }
    plugins.mark_changed();
}
