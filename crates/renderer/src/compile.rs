use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Write as _;

use chunks::{parse_declarations, UniformDeclaration};
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::error::CompileLinkError;
use crate::gpu::uniforms::UniformLayout;

const FRAG_OUTPUT: &str = "vjshade_FragColor";
const LOAD_FLAGS: &str = "vjshade_load_flags";

/// Fragment source ready for the GLSL 450 frontend, plus its bindings.
#[derive(Debug, Clone)]
pub(crate) struct WrappedFragment {
    pub source: String,
    pub layout: UniformLayout,
    /// `sampler2D` uniforms in binding order (set 1, two bindings each).
    pub textures: Vec<String>,
}

/// Rewrites a composed GLSL ES fragment program into Vulkan-style GLSL 450.
///
/// Steps performed:
///
/// 1. Blank out `precision` statements, the `varying vec2 vUv;` line and every
///    `uniform` line, keeping line numbers stable.
/// 2. Prepend a header declaring `vUv` as an input, the colour output, an
///    instance-less std140 block holding every non-sampler uniform under its
///    own name, and a texture/sampler pair per `sampler2D`.
/// 3. Bools travel as `int` members; each gets a private `bool` global that
///    `main` loads before its first statement.
/// 4. `#define` only `gl_FragColor`, `texture2D` and the sampler names, so
///    locals and parameters may shadow any other uniform.
pub(crate) fn wrap_fragment(source: &str) -> Result<WrappedFragment, CompileLinkError> {
    let mut body = String::with_capacity(source.len());
    let mut declarations: Vec<UniformDeclaration> = Vec::new();
    let mut main_open: Option<usize> = None;

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if main_open.is_none() && trimmed.starts_with("void main()") {
            if let Some(brace) = line.find('{') {
                main_open = Some(body.len() + brace + 1);
            }
        }
        if trimmed.starts_with("precision ") {
            body.push('\n');
            continue;
        }
        if trimmed.starts_with("varying ") {
            if trimmed != "varying vec2 vUv;" {
                return Err(CompileLinkError::unsupported(format!(
                    "line {}: only `varying vec2 vUv;` is available",
                    index + 1
                )));
            }
            body.push('\n');
            continue;
        }
        if trimmed.starts_with("uniform ") || trimmed.starts_with("uniform\t") {
            let parsed = parse_declarations(trimmed);
            if parsed.is_empty() || !trimmed.contains(';') {
                return Err(CompileLinkError::unsupported(format!(
                    "line {}: cannot bind uniform statement `{trimmed}`",
                    index + 1
                )));
            }
            declarations.extend(parsed);
            body.push('\n');
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let mut seen = HashSet::new();
    for decl in &declarations {
        if !seen.insert(decl.name.as_str()) {
            return Err(CompileLinkError::unsupported(format!(
                "uniform `{}` is declared more than once",
                decl.name
            )));
        }
        if decl.ty.is_sampler() && decl.array_len.is_some() {
            return Err(CompileLinkError::unsupported(format!(
                "sampler array `{}` is not supported",
                decl.name
            )));
        }
    }

    let layout = UniformLayout::from_declarations(&declarations)?;
    let textures: Vec<String> = declarations
        .iter()
        .filter(|decl| decl.ty.is_sampler())
        .map(|decl| decl.name.clone())
        .collect();

    if layout.slots().iter().any(|slot| slot.is_flag()) {
        let Some(at) = main_open else {
            return Err(CompileLinkError::unsupported(
                "bool uniforms need `void main() {` on one line",
            ));
        };
        body.insert_str(at, &format!(" {LOAD_FLAGS}();"));
    }

    let header = build_header(&layout, &textures);
    Ok(WrappedFragment {
        source: format!("{header}\n#line 1\n{body}"),
        layout,
        textures,
    })
}

fn build_header(layout: &UniformLayout, textures: &[String]) -> String {
    let mut header = String::new();
    header.push_str("#version 450\n");
    header.push_str("layout(location = 0) in vec2 vUv;\n");
    let _ = writeln!(header, "layout(location = 0) out vec4 {FRAG_OUTPUT};");

    header.push_str("\nlayout(std140, set = 0, binding = 0) uniform VjshadeUniforms {\n");
    for slot in layout.slots() {
        let _ = writeln!(header, "    {}", slot.member_declaration());
    }
    if layout.is_empty() {
        header.push_str("    vec4 vjshade_reserved;\n");
    }
    header.push_str("};\n");

    let flags: Vec<_> = layout.slots().iter().filter(|slot| slot.is_flag()).collect();
    if !flags.is_empty() {
        header.push('\n');
        for slot in &flags {
            let _ = writeln!(header, "bool {};", slot.name);
        }
        let _ = writeln!(header, "void {LOAD_FLAGS}() {{");
        for slot in &flags {
            let _ = writeln!(header, "    {} = {} != 0;", slot.name, slot.member_name());
        }
        header.push_str("}\n");
    }

    if !textures.is_empty() {
        header.push('\n');
    }
    for (index, name) in textures.iter().enumerate() {
        let binding = index * 2;
        let _ = writeln!(
            header,
            "layout(set = 1, binding = {binding}) uniform texture2D vjshade_{name}_texture;"
        );
        let _ = writeln!(
            header,
            "layout(set = 1, binding = {}) uniform sampler vjshade_{name}_sampler;",
            binding + 1
        );
    }

    header.push('\n');
    let _ = writeln!(header, "#define gl_FragColor {FRAG_OUTPUT}");
    header.push_str("#define texture2D texture\n");
    for name in textures {
        let _ = writeln!(
            header,
            "#define {name} sampler2D(vjshade_{name}_texture, vjshade_{name}_sampler)"
        );
    }
    header
}

/// Parses and validates GLSL with naga before anything reaches the device.
pub(crate) fn validate_glsl(source: &str, stage: ShaderStage) -> Result<wgpu::naga::Module, CompileLinkError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| CompileLinkError::parse(errors.emit_to_string(source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| CompileLinkError::validate(error.emit_to_string(source)))?;
    Ok(module)
}

pub(crate) fn vertex_shader_source() -> wgpu::ShaderSource<'static> {
    wgpu::ShaderSource::Glsl {
        shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
        stage: ShaderStage::Vertex,
        defines: &[],
    }
}

/// Full-screen quad as a four-vertex triangle strip; `vUv` spans [0, 1].
pub(crate) const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 vUv;

const vec2 positions[4] = vec2[4](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    vUv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
