//! Shader chunk composition.
//!
//! Visual effects are written as independent chunks: a few GLSL statements for
//! the shared `sampleLayer` function, some `uniform` declarations, and a few
//! statements for `main`. [`ShaderComposer`] stitches the chunks of every active
//! [`ChunkPlugin`] into one fragment program together with a fixed preamble,
//! the helper functions plugins registered, and the simplex [`NOISE_LIBRARY`].
//!
//! Nothing in this crate touches the GPU. The renderer compiles the composed
//! source and reads the [`UniformTable`] that plugin frame hooks update.

mod compose;
mod contract;
mod functions;
mod noise;
mod uniforms;

pub use compose::{compose, ComposedProgram, NumberedSource, ShaderComposer, MAIN_PRELUDE, PREAMBLE};
pub use contract::{ChunkContribution, ChunkPlugin, FrameHook, ShaderChunks};
pub use functions::SharedFunctionSet;
pub use noise::NOISE_LIBRARY;
pub use uniforms::{
    is_identifier, parse_declarations, GlslType, TextureData, TextureDataError, UniformDeclaration,
    UniformTable, UniformValue,
};

pub use scheduler::FrameTime;
