use chunks::{ComposedProgram, UniformTable};

use crate::error::{CompileLinkError, DrawError, RenderError};

/// GPU-side collaborator of the render loop.
///
/// The loop never touches a device directly: it hands composed source to
/// [`RenderHost::compile`], pushes the uniform table through
/// [`RenderHost::upload_uniforms`] and asks for one full-screen draw per tick.
pub trait RenderHost {
    /// A compiled, bindable program.
    type Program;

    fn compile(&mut self, program: &ComposedProgram) -> Result<Self::Program, CompileLinkError>;

    /// Marks the program's uniforms for re-upload from `uniforms`.
    fn upload_uniforms(&mut self, program: &mut Self::Program, uniforms: &UniformTable);

    fn draw(&mut self, program: &Self::Program) -> Result<(), DrawError>;

    /// Operator-visible error channel.
    fn report(&mut self, error: &RenderError) {
        match error {
            RenderError::Compile { .. } => tracing::error!(error = %error, "shader compilation failed"),
            RenderError::UniformMismatch { names } => {
                tracing::warn!(uniforms = ?names, "uniform values have no declaration in the bound program")
            }
            RenderError::Draw(draw) if draw.is_fatal() => tracing::error!(error = %draw, "draw failed"),
            RenderError::Draw(draw) => tracing::warn!(error = %draw, "draw failed"),
        }
    }
}
