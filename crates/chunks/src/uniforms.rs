use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// GLSL types a plugin may declare as a uniform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlslType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    /// Any type keyword we do not know how to bind.
    Unsupported(String),
}

impl GlslType {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::Unsupported(keyword) => keyword,
        }
    }

    /// Number of scalar components in one element (0 for opaque types).
    pub fn components(&self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::Float => 1,
            Self::Vec2 | Self::IVec2 => 2,
            Self::Vec3 | Self::IVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Sampler2D | Self::Unsupported(_) => 0,
        }
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, Self::Sampler2D)
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A single name introduced by a `uniform` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: GlslType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_len: Option<u32>,
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Extracts uniform declarations from GLSL text.
///
/// Only `uniform [precision] type name[, name[N]];` statements are
/// recognised; everything else (including `//` comments) is ignored. Names
/// that are not valid identifiers are skipped.
pub fn parse_declarations(text: &str) -> Vec<UniformDeclaration> {
    let stripped: String = text
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let mut declarations = Vec::new();
    for statement in stripped.split(';') {
        let mut tokens = statement.split_whitespace().peekable();
        if tokens.next() != Some("uniform") {
            continue;
        }
        while tokens
            .peek()
            .is_some_and(|token| PRECISION_QUALIFIERS.contains(token))
        {
            tokens.next();
        }
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let ty = GlslType::from_keyword(keyword);
        let rest = tokens.collect::<Vec<_>>().join(" ");
        for declarator in rest.split(',') {
            if let Some((name, array_len)) = parse_declarator(declarator) {
                declarations.push(UniformDeclaration {
                    name,
                    ty: ty.clone(),
                    array_len,
                });
            }
        }
    }
    declarations
}

fn parse_declarator(raw: &str) -> Option<(String, Option<u32>)> {
    let raw = raw.split('=').next().unwrap_or("").trim();
    let (name, array_len) = match raw.split_once('[') {
        Some((name, rest)) => {
            let len = rest.trim_end().strip_suffix(']')?.trim().parse::<u32>().ok()?;
            (name.trim(), Some(len))
        }
        None => (raw, None),
    };
    if is_identifier(name) {
        Some((name.to_string(), array_len))
    } else {
        None
    }
}

/// Whether `name` is a valid GLSL identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[derive(Debug, thiserror::Error)]
pub enum TextureDataError {
    #[error("texture dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("texture {width}x{height} needs {expected} RGBA8 bytes, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// RGBA8 pixels bound to a `sampler2D` uniform.
///
/// Pixels live behind an `Arc`; the GPU host re-uploads only when a hook
/// stores a different allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Result<Self, TextureDataError> {
        if width == 0 || height == 0 {
            return Err(TextureDataError::EmptyDimensions { width, height });
        }
        let pixels = pixels.into();
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(TextureDataError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A single opaque pixel.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: Arc::from(rgba.to_vec()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True when both values share the same pixel allocation.
    pub fn same_allocation(&self, other: &TextureData) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Value stored under a uniform name.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat3([f32; 9]),
    /// Column-major.
    Mat4([f32; 16]),
    /// Flattened array or vector data of any length.
    Floats(Vec<f32>),
    Texture(TextureData),
}

impl UniformValue {
    /// Scalar components as `f32`; empty for textures.
    pub fn components(&self) -> Vec<f32> {
        match self {
            Self::Bool(value) => vec![if *value { 1.0 } else { 0.0 }],
            Self::Int(value) => vec![*value as f32],
            Self::Float(value) => vec![*value],
            Self::Vec2(value) => value.to_vec(),
            Self::Vec3(value) => value.to_vec(),
            Self::Vec4(value) => value.to_vec(),
            Self::Mat3(value) => value.to_vec(),
            Self::Mat4(value) => value.to_vec(),
            Self::Floats(values) => values.clone(),
            Self::Texture(_) => Vec::new(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        Self::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

impl From<TextureData> for UniformValue {
    fn from(value: TextureData) -> Self {
        Self::Texture(value)
    }
}

/// Uniform values shared between the render loop and every frame hook.
///
/// One table lives for the whole engine lifetime. Hooks mutate it in place;
/// the GPU host reads it when packing uniforms for the bound program.
#[derive(Debug, Clone, Default)]
pub struct UniformTable {
    values: BTreeMap<String, UniformValue>,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Option<UniformValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
