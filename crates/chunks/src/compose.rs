use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::contract::{ChunkContribution, ChunkPlugin};
use crate::functions::SharedFunctionSet;
use crate::noise::NOISE_LIBRARY;
use crate::uniforms::{parse_declarations, UniformDeclaration, UniformTable};

/// Fixed text opening every composed program.
pub const PREAMBLE: &str = "#define USE_MAP true
precision highp float;
varying vec2 vUv;

// Constants for Maths
const float PI = 3.1415926535897932384626433832795;
const float deg2rad = PI/180.0;
const vec2 centerCoord = vec2(0.5, 0.5);
const vec3 normaliseHSL = vec3(1.0/360.0, 1.0, 1.0);
const vec3 noopVec3 = vec3(1.0, 1.0, 1.0);
const vec4 noopVec4 = vec4(1.0, 1.0, 1.0, 1.0);
";

/// Default output initialisation at the top of `main`.
pub const MAIN_PRELUDE: &str = "\t// Change this to skew or warp the texture
\tvec2 newUV = vUv + vec2(0.0, 0.0);

\tgl_FragColor = vec4(1.0, 1.0, 1.0, 1.0);
";

const SAMPLE_LAYER_OPEN: &str = "vec4 sampleLayer(int i, vec2 uv) {\n";
const SAMPLE_LAYER_CLOSE: &str = "\treturn noopVec4;\n}\n";

/// Assembles one fragment program from ordered contributions.
///
/// Contributions with no content are dropped. The remaining `source` fields
/// form the body of `sampleLayer`, `uniforms` fields form the uniform block and
/// `main` fields are appended to `main` separated by a blank line. Shared
/// functions are emitted in registration order, followed by `noise`.
///
/// No GLSL validation happens here; malformed input fails when compiled.
pub fn compose(
    contributions: &[ChunkContribution],
    functions: &SharedFunctionSet,
    noise: &str,
) -> String {
    let active: Vec<&ChunkContribution> = contributions
        .iter()
        .filter(|contribution| !contribution.is_empty())
        .collect();

    let mut out = String::with_capacity(PREAMBLE.len() + noise.len() + 1024);
    out.push_str(PREAMBLE);

    out.push_str("\n// Uniforms\n");
    for uniforms in active.iter().map(|c| c.uniforms.as_str()).filter(|u| !u.is_empty()) {
        out.push_str(uniforms);
        out.push('\n');
    }

    out.push('\n');
    out.push_str(SAMPLE_LAYER_OPEN);
    for source in active.iter().map(|c| c.source.as_str()).filter(|s| !s.is_empty()) {
        out.push('\t');
        out.push_str(source);
        out.push('\n');
    }
    out.push_str(SAMPLE_LAYER_CLOSE);

    for function in functions.iter() {
        out.push('\n');
        out.push_str(function);
        out.push('\n');
    }

    out.push_str(noise);

    out.push_str("\nvoid main() {\n");
    out.push_str(MAIN_PRELUDE);
    let mains: Vec<&str> = active
        .iter()
        .map(|c| c.main.as_str())
        .filter(|m| !m.is_empty())
        .collect();
    if !mains.is_empty() {
        out.push_str("\n\t");
        out.push_str(&mains.join("\n\n\t"));
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

/// Output of one composition pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedProgram {
    pub source: String,
    /// Every uniform declared by the contributions, in emission order.
    pub uniforms: Vec<UniformDeclaration>,
    /// Uniform names declared by more than one contribution.
    pub collisions: Vec<String>,
    /// Contributions that survived empty filtering.
    pub contributions: usize,
}

impl ComposedProgram {
    pub fn declares(&self, name: &str) -> bool {
        self.uniforms.iter().any(|decl| decl.name == name)
    }

    /// Source with one-based line numbers, for logs.
    pub fn numbered(&self) -> NumberedSource<'_> {
        NumberedSource(&self.source)
    }
}

pub struct NumberedSource<'a>(&'a str);

impl fmt::Display for NumberedSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, line) in self.0.lines().enumerate() {
            writeln!(f, "{:>4}: {}", index + 1, line)?;
        }
        Ok(())
    }
}

/// Composition engine owned by one render loop.
///
/// Holds the cumulative [`SharedFunctionSet`] and the single
/// [`UniformTable`] hooks write into. Neither is ever replaced; separate
/// composers never share state.
#[derive(Debug)]
pub struct ShaderComposer {
    functions: SharedFunctionSet,
    uniforms: UniformTable,
    noise_library: Cow<'static, str>,
    compositions: u64,
}

impl Default for ShaderComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderComposer {
    pub fn new() -> Self {
        Self::with_noise_library(NOISE_LIBRARY)
    }

    pub fn with_noise_library(noise: impl Into<Cow<'static, str>>) -> Self {
        Self {
            functions: SharedFunctionSet::new(),
            uniforms: UniformTable::new(),
            noise_library: noise.into(),
            compositions: 0,
        }
    }

    pub fn functions(&self) -> &SharedFunctionSet {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut SharedFunctionSet {
        &mut self.functions
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformTable {
        &mut self.uniforms
    }

    pub fn compositions(&self) -> u64 {
        self.compositions
    }

    /// Composes already-gathered contributions against the current function set.
    pub fn compose_contributions(&mut self, contributions: &[ChunkContribution]) -> ComposedProgram {
        let source = compose(contributions, &self.functions, &self.noise_library);
        let mut uniforms = Vec::new();
        let mut owners: BTreeMap<String, usize> = BTreeMap::new();
        let mut surviving = 0;
        for contribution in contributions.iter().filter(|c| !c.is_empty()) {
            surviving += 1;
            let mut seen_here = HashSet::new();
            for decl in parse_declarations(&contribution.uniforms) {
                if seen_here.insert(decl.name.clone()) {
                    *owners.entry(decl.name.clone()).or_default() += 1;
                }
                uniforms.push(decl);
            }
        }
        let collisions: Vec<String> = owners
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect();
        for name in &collisions {
            tracing::warn!(uniform = %name, "uniform declared by more than one chunk");
        }
        self.compositions += 1;
        ComposedProgram {
            source,
            uniforms,
            collisions,
            contributions: surviving,
        }
    }

    /// Gathers contributions and helper functions from `plugins`, in order.
    ///
    /// `glsl_function` is queried once per distinct kind in this pass.
    pub fn compose_plugins<'a, I, P>(&mut self, plugins: I) -> ComposedProgram
    where
        I: IntoIterator<Item = &'a P>,
        P: ChunkPlugin + ?Sized + 'a,
    {
        let mut kinds_seen: HashSet<String> = HashSet::new();
        let mut contributions = Vec::new();
        for plugin in plugins {
            if kinds_seen.insert(plugin.kind().to_string()) {
                if let Some(function) = plugin.glsl_function() {
                    if self.functions.register_if_absent(&function) {
                        tracing::debug!(kind = plugin.kind(), "registered shared glsl function");
                    }
                }
            }
            if let Some(chunks) = plugin.shader_chunks() {
                contributions.push(ChunkContribution::from(chunks));
            }
        }
        let program = self.compose_contributions(&contributions);
        tracing::debug!(
            contributions = program.contributions,
            functions = self.functions.len(),
            bytes = program.source.len(),
            "composed fragment program"
        );
        tracing::trace!("composed program:\n{}", program.numbered());
        program
    }
}
