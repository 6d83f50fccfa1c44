//! TOML scene descriptions.
//!
//! A scene lists window settings and an ordered set of declarative chunk
//! instances. Each chunk carries its GLSL fragments, optional helper function,
//! static uniform values and per-frame animation bindings.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chunks::{is_identifier, FrameTime, ShaderChunks, UniformValue};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub chunks: Vec<ChunkSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_title")]
    pub title: String,
    /// `WIDTHxHEIGHT` in physical pixels.
    #[serde(default = "default_size")]
    pub size: String,
    /// Frame cap; `0` or absent follows the display refresh.
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_shader: Option<PathBuf>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            size: default_size(),
            fps: None,
            fullscreen: false,
            dump_shader: None,
        }
    }
}

/// One chunk instance in scene order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkSpec {
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniforms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Helper shared by every instance of `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, UniformLiteral>,
    #[serde(default)]
    pub animate: BTreeMap<String, AnimationBinding>,
}

/// A uniform value as written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum UniformLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<f64>),
}

/// Per-frame uniform driver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RawAnimation", into = "RawAnimation")]
pub enum AnimationBinding {
    /// Seconds since the loop started.
    Time,
    /// Seconds since the previous frame.
    Delta,
    /// Frame counter.
    Frame,
    /// Cosine sweep from `min` to `max` and back once per `period`.
    Oscillate { period: Duration, min: f32, max: f32 },
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum RawAnimation {
    Source(String),
    Oscillate {
        #[serde(
            deserialize_with = "deserialize_duration",
            serialize_with = "serialize_duration"
        )]
        oscillate: Duration,
        #[serde(default)]
        min: f32,
        #[serde(default = "default_max")]
        max: f32,
    },
}

impl TryFrom<RawAnimation> for AnimationBinding {
    type Error = String;

    fn try_from(raw: RawAnimation) -> Result<Self, Self::Error> {
        match raw {
            RawAnimation::Source(source) => match source.trim().to_ascii_lowercase().as_str() {
                "time" => Ok(Self::Time),
                "delta" => Ok(Self::Delta),
                "frame" => Ok(Self::Frame),
                other => Err(format!(
                    "unknown animation source '{other}'; expected time, delta, frame or an oscillate table"
                )),
            },
            RawAnimation::Oscillate { oscillate, min, max } => Ok(Self::Oscillate {
                period: oscillate,
                min,
                max,
            }),
        }
    }
}

impl From<AnimationBinding> for RawAnimation {
    fn from(binding: AnimationBinding) -> Self {
        match binding {
            AnimationBinding::Time => RawAnimation::Source("time".into()),
            AnimationBinding::Delta => RawAnimation::Source("delta".into()),
            AnimationBinding::Frame => RawAnimation::Source("frame".into()),
            AnimationBinding::Oscillate { period, min, max } => RawAnimation::Oscillate {
                oscillate: period,
                min,
                max,
            },
        }
    }
}

fn default_title() -> String {
    "vjshade".to_string()
}

fn default_size() -> String {
    "480x320".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_max() -> f32 {
    1.0
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || !v.is_finite() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("duration out of range: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width in size '{value}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height in size '{value}'"))?;
    if width == 0 || height == 0 {
        return Err("size dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn enabled_chunks(&self) -> impl Iterator<Item = &ChunkSpec> {
        self.chunks.iter().filter(|chunk| chunk.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        self.window.surface_size()?;
        if let Some(fps) = self.window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }

        for (index, chunk) in self.chunks.iter().enumerate() {
            chunk.validate(index)?;
        }

        // Only the first chunk of a kind supplies its helper, so all must agree.
        let mut helpers: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for chunk in &self.chunks {
            let helper = chunk.helper_function();
            match helpers.get(chunk.kind.as_str()) {
                Some(first) if *first != helper => {
                    return Err(ConfigError::Invalid(format!(
                        "chunks of kind '{}' declare different helper functions",
                        chunk.kind
                    )));
                }
                Some(_) => {}
                None => {
                    helpers.insert(chunk.kind.as_str(), helper);
                }
            }
        }

        Ok(())
    }
}

impl WindowSettings {
    pub fn surface_size(&self) -> Result<(u32, u32), ConfigError> {
        parse_size(&self.size).map_err(|err| ConfigError::Invalid(format!("window.size: {err}")))
    }

    /// `None` when uncapped.
    pub fn target_fps(&self) -> Option<f32> {
        self.fps.filter(|fps| *fps > 0.0)
    }
}

impl ChunkSpec {
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.kind.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "chunk #{} must have a non-empty kind",
                index + 1
            )));
        }

        for (name, literal) in &self.values {
            if !is_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "chunk '{}' sets value for invalid uniform name '{name}'",
                    self.kind
                )));
            }
            match literal {
                UniformLiteral::Int(value) if i32::try_from(*value).is_err() => {
                    return Err(ConfigError::Invalid(format!(
                        "chunk '{}' value '{name}' does not fit a 32-bit int",
                        self.kind
                    )));
                }
                UniformLiteral::List(items) if items.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "chunk '{}' value '{name}' must not be an empty list",
                        self.kind
                    )));
                }
                _ => {}
            }
        }

        for (name, binding) in &self.animate {
            if !is_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "chunk '{}' animates invalid uniform name '{name}'",
                    self.kind
                )));
            }
            if let AnimationBinding::Oscillate { period, .. } = binding {
                if period.is_zero() {
                    return Err(ConfigError::Invalid(format!(
                        "chunk '{}' oscillation period for '{name}' must be > 0",
                        self.kind
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn shader_chunks(&self) -> ShaderChunks {
        ShaderChunks {
            source: self.source.clone(),
            uniforms: self.uniforms.clone(),
            main: self.main.clone(),
        }
    }

    pub fn helper_function(&self) -> Option<&str> {
        self.function.as_deref().filter(|text| !text.trim().is_empty())
    }
}

impl UniformLiteral {
    /// Lists of 2, 3, 4, 9 and 16 numbers become vectors and matrices.
    pub fn to_uniform_value(&self) -> UniformValue {
        match self {
            Self::Bool(value) => UniformValue::Bool(*value),
            Self::Int(value) => {
                UniformValue::Int((*value).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            }
            Self::Float(value) => UniformValue::Float(*value as f32),
            Self::List(items) => {
                let floats: Vec<f32> = items.iter().map(|value| *value as f32).collect();
                match floats.len() {
                    2 => UniformValue::Vec2([floats[0], floats[1]]),
                    3 => UniformValue::Vec3([floats[0], floats[1], floats[2]]),
                    4 => UniformValue::Vec4([floats[0], floats[1], floats[2], floats[3]]),
                    9 => {
                        let mut matrix = [0.0; 9];
                        matrix.copy_from_slice(&floats);
                        UniformValue::Mat3(matrix)
                    }
                    16 => {
                        let mut matrix = [0.0; 16];
                        matrix.copy_from_slice(&floats);
                        UniformValue::Mat4(matrix)
                    }
                    _ => UniformValue::Floats(floats),
                }
            }
        }
    }
}

impl AnimationBinding {
    pub fn sample(&self, frame: &FrameTime) -> UniformValue {
        match self {
            Self::Time => UniformValue::Float(frame.seconds()),
            Self::Delta => UniformValue::Float(frame.delta_seconds()),
            Self::Frame => UniformValue::Int(i32::try_from(frame.index).unwrap_or(i32::MAX)),
            Self::Oscillate { period, min, max } => {
                let period = period.as_secs_f64();
                let phase = if period > 0.0 {
                    (frame.elapsed.as_secs_f64() % period) / period
                } else {
                    0.0
                };
                let blend = 0.5 - 0.5 * (TAU * phase).cos();
                UniformValue::Float(min + (max - min) * blend as f32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
title = "demo"
size = "640x360"
fps = 30
dump_shader = "/tmp/vjshade.frag"

[[chunks]]
kind = "tint"
uniforms = "uniform vec3 u_tint;"
main = "gl_FragColor.rgb *= u_tint;"
function = "float tintGain() { return 1.0; }"

[chunks.values]
u_tint = [1.0, 0.5, 0.2]

[chunks.animate]
u_time = "time"
u_pulse = { oscillate = "2s", min = 0.25, max = 0.75 }

[[chunks]]
kind = "grain"
enabled = false
source = "if (i == 1) { return vec4(0.0); }"
"#;

    #[test]
    fn parses_sample_config() {
        let config = SceneConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.window.title, "demo");
        assert_eq!(config.window.surface_size().unwrap(), (640, 360));
        assert_eq!(config.window.target_fps(), Some(30.0));
        assert_eq!(
            config.window.dump_shader.as_deref(),
            Some(std::path::Path::new("/tmp/vjshade.frag"))
        );
        assert_eq!(config.chunks.len(), 2);

        let tint = &config.chunks[0];
        assert!(tint.enabled);
        assert_eq!(tint.helper_function(), Some("float tintGain() { return 1.0; }"));
        assert_eq!(
            tint.values["u_tint"].to_uniform_value(),
            UniformValue::Vec3([1.0, 0.5, 0.2])
        );
        assert_eq!(tint.animate["u_time"], AnimationBinding::Time);
        assert_eq!(
            tint.animate["u_pulse"],
            AnimationBinding::Oscillate {
                period: Duration::from_secs(2),
                min: 0.25,
                max: 0.75,
            }
        );

        let kinds: Vec<_> = config.enabled_chunks().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["tint"]);
    }

    #[test]
    fn defaults_apply_without_window_table() {
        let config = SceneConfig::from_toml_str("version = 1\n").unwrap();
        assert_eq!(config.window.title, "vjshade");
        assert_eq!(config.window.surface_size().unwrap(), (480, 320));
        assert_eq!(config.window.target_fps(), None);
        assert!(config.chunks.is_empty());
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let config = SceneConfig::from_toml_str("version = 1\n[window]\nfps = 0\n").unwrap();
        assert_eq!(config.window.target_fps(), None);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SceneConfig::from_toml_str("version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_size_and_negative_fps() {
        let err = SceneConfig::from_toml_str("version = 1\n[window]\nsize = \"wide\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SceneConfig::from_toml_str("version = 1\n[window]\nfps = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_empty_kind_and_invalid_names() {
        let empty_kind = r#"
version = 1
[[chunks]]
kind = "  "
"#;
        let err = SceneConfig::from_toml_str(empty_kind).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let bad_name = r#"
version = 1
[[chunks]]
kind = "tint"
[chunks.values]
"2fast" = 1.0
"#;
        let err = SceneConfig::from_toml_str(bad_name).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_oscillation_period() {
        let config = r#"
version = 1
[[chunks]]
kind = "pulse"
[chunks.animate]
u_pulse = { oscillate = 0 }
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_oscillation_period() {
        let config = r#"
version = 1
[[chunks]]
kind = "pulse"
[chunks.animate]
u_pulse = { oscillate = 1e30 }
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_kind_with_conflicting_helpers() {
        let config = r#"
version = 1
[[chunks]]
kind = "fx"
main = "gl_FragColor.rgb *= 0.5;"

[[chunks]]
kind = "fx"
function = "float fx(float v) { return v; }"
main = "gl_FragColor.rgb *= fx(0.5);"
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref message) if message.contains("'fx'")));

        let agreeing = config.replace(
            "main = \"gl_FragColor.rgb *= 0.5;\"",
            "function = \"float fx(float v) { return v; }\"",
        );
        assert!(SceneConfig::from_toml_str(&agreeing).is_ok());
    }

    #[test]
    fn rejects_unknown_animation_source() {
        let config = r#"
version = 1
[[chunks]]
kind = "pulse"
[chunks.animate]
u_pulse = "sometimes"
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn literals_map_to_uniform_values() {
        assert_eq!(UniformLiteral::Bool(true).to_uniform_value(), UniformValue::Bool(true));
        assert_eq!(UniformLiteral::Int(7).to_uniform_value(), UniformValue::Int(7));
        assert_eq!(UniformLiteral::Float(0.5).to_uniform_value(), UniformValue::Float(0.5));
        assert_eq!(
            UniformLiteral::List(vec![1.0, 2.0]).to_uniform_value(),
            UniformValue::Vec2([1.0, 2.0])
        );
        assert_eq!(
            UniformLiteral::List(vec![1.0, 2.0, 3.0, 4.0, 5.0]).to_uniform_value(),
            UniformValue::Floats(vec![1.0, 2.0, 3.0, 4.0, 5.0])
        );
        assert!(matches!(
            UniformLiteral::List(vec![0.0; 16]).to_uniform_value(),
            UniformValue::Mat4(_)
        ));
    }

    #[test]
    fn oscillation_sweeps_between_bounds() {
        let binding = AnimationBinding::Oscillate {
            period: Duration::from_secs(2),
            min: 0.0,
            max: 1.0,
        };
        let at = |secs: f32| {
            let frame = FrameTime::new(Duration::from_secs_f32(secs), Duration::ZERO, 0);
            match binding.sample(&frame) {
                UniformValue::Float(value) => value,
                other => panic!("unexpected value {other:?}"),
            }
        };
        assert!(at(0.0).abs() < 1e-5);
        assert!((at(1.0) - 1.0).abs() < 1e-5);
        assert!((at(0.5) - 0.5).abs() < 1e-5);
        assert!(at(2.0).abs() < 1e-5);
    }

    #[test]
    fn time_and_frame_bindings_read_the_frame() {
        let frame = FrameTime::new(Duration::from_millis(1500), Duration::from_millis(16), 90);
        assert_eq!(AnimationBinding::Time.sample(&frame), UniformValue::Float(1.5));
        assert_eq!(AnimationBinding::Frame.sample(&frame), UniformValue::Int(90));
        match AnimationBinding::Delta.sample(&frame) {
            UniformValue::Float(delta) => assert!((delta - 0.016).abs() < 1e-6),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn parses_size_variants() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 64X32 ").unwrap(), (64, 32));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("1280").is_err());
    }
}
