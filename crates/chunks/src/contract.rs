use std::borrow::Cow;

use scheduler::FrameTime;

use crate::uniforms::UniformTable;

/// Shader fragments exposed by a plugin instance.
///
/// Every field is optional; `None` and `Some("")` are treated the same by the
/// composer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderChunks {
    /// Statements placed inside `sampleLayer(int i, vec2 uv)`.
    pub source: Option<String>,
    /// `uniform` declarations for values this plugin owns.
    pub uniforms: Option<String>,
    /// Statements placed inside `main`, after `gl_FragColor` is initialised.
    pub main: Option<String>,
}

impl ShaderChunks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_uniforms(mut self, uniforms: impl Into<String>) -> Self {
        self.uniforms = Some(uniforms.into());
        self
    }

    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }
}

/// One plugin's contribution to a single composition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkContribution {
    pub source: String,
    pub uniforms: String,
    pub main: String,
}

impl ChunkContribution {
    pub fn new(
        source: impl Into<String>,
        uniforms: impl Into<String>,
        main: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            uniforms: uniforms.into(),
            main: main.into(),
        }
    }

    /// True when the contribution carries nothing and must be skipped.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.uniforms.is_empty() && self.main.is_empty()
    }
}

impl From<ShaderChunks> for ChunkContribution {
    fn from(chunks: ShaderChunks) -> Self {
        Self {
            source: chunks.source.unwrap_or_default(),
            uniforms: chunks.uniforms.unwrap_or_default(),
            main: chunks.main.unwrap_or_default(),
        }
    }
}

/// Per-frame update capability.
///
/// Hooks write the uniform keys their plugin declared. Nothing stops a hook
/// from touching another plugin's keys; the table is shared.
pub trait FrameHook {
    fn on_frame(&mut self, frame: &FrameTime, uniforms: &mut UniformTable);
}

/// Capability interface every visual-effect plugin implements.
///
/// All three capabilities are optional and queried independently: a plugin
/// without `shader_chunks` is as valid as one returning empty chunks.
pub trait ChunkPlugin {
    /// Identity of the plugin type. Instances of the same type share a kind,
    /// which is what [`ChunkPlugin::glsl_function`] registration is keyed on.
    fn kind(&self) -> &str;

    fn shader_chunks(&self) -> Option<ShaderChunks> {
        None
    }

    /// Reusable helper function source shared by every instance of this kind.
    fn glsl_function(&self) -> Option<Cow<'_, str>> {
        None
    }

    fn frame_hook(&mut self) -> Option<&mut dyn FrameHook> {
        None
    }
}
