use std::fmt;

/// Where in the compile pipeline a program was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    /// The GLSL frontend could not parse the wrapped source.
    Parse,
    /// The module parsed but failed IR validation.
    Validate,
    /// Pipeline creation failed on the device.
    Link,
    /// The composed source uses a construct the host cannot bind.
    Unsupported,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Parse => "parse",
            Self::Validate => "validate",
            Self::Link => "link",
            Self::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// A composed program could not be turned into a GPU pipeline.
///
/// Malformed chunk text has no earlier failure point; it surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shader {stage} error: {message}")]
pub struct CompileLinkError {
    pub stage: CompileStage,
    pub message: String,
}

impl CompileLinkError {
    pub fn new(stage: CompileStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CompileStage::Parse, message)
    }

    pub fn validate(message: impl Into<String>) -> Self {
        Self::new(CompileStage::Validate, message)
    }

    pub fn link(message: impl Into<String>) -> Self {
        Self::new(CompileStage::Link, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(CompileStage::Unsupported, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    /// Surface was lost or outdated and has been reconfigured.
    #[error("surface lost; reconfigured")]
    SurfaceLost,
    #[error("timed out acquiring the next frame")]
    Timeout,
    #[error("out of memory")]
    OutOfMemory,
    #[error("{0}")]
    Other(String),
}

impl DrawError {
    /// Whether rendering cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

/// Everything the render loop surfaces through [`crate::RenderHost::report`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("composition {composition} failed to compile; keeping last good program: {source}")]
    Compile {
        composition: u64,
        #[source]
        source: CompileLinkError,
    },
    #[error("uniforms not declared by the bound program: {}", names.join(", "))]
    UniformMismatch { names: Vec<String> },
    #[error("draw failed: {0}")]
    Draw(#[from] DrawError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_stage() {
        let err = CompileLinkError::parse("unexpected token");
        assert_eq!(err.to_string(), "shader parse error: unexpected token");
    }

    #[test]
    fn mismatch_lists_every_name() {
        let err = RenderError::UniformMismatch {
            names: vec!["u_a".into(), "u_b".into()],
        };
        assert_eq!(
            err.to_string(),
            "uniforms not declared by the bound program: u_a, u_b"
        );
    }

    #[test]
    fn only_out_of_memory_is_fatal() {
        assert!(DrawError::OutOfMemory.is_fatal());
        assert!(!DrawError::SurfaceLost.is_fatal());
    }
}
