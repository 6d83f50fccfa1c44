mod context;
mod pipeline;
mod textures;
pub(crate) mod uniforms;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use chunks::{ComposedProgram, UniformTable, UniformValue};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::compile::{validate_glsl, wrap_fragment, VERTEX_SHADER_GLSL};
use crate::error::{CompileLinkError, DrawError};
use crate::host::RenderHost;

use self::context::GpuContext;
use self::pipeline::{ProgramPipeline, SharedLayouts};
use self::uniforms::UniformLayout;

/// `#bbbbbb`, the canvas colour behind the quad.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 187.0 / 255.0,
    g: 187.0 / 255.0,
    b: 187.0 / 255.0,
    a: 1.0,
};

/// A composed program compiled for the wgpu host.
pub struct GpuProgram {
    pipeline: ProgramPipeline,
    layout: UniformLayout,
    staging: Vec<u8>,
    warned: BTreeSet<String>,
}

/// [`RenderHost`] drawing into a window surface with wgpu.
pub struct WgpuHost {
    context: GpuContext,
    shared: SharedLayouts,
    dump_path: Option<PathBuf>,
    compiled: u64,
}

impl WgpuHost {
    pub fn new<T>(target: &T, size: PhysicalSize<u32>, dump_path: Option<PathBuf>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        validate_glsl(VERTEX_SHADER_GLSL, wgpu::naga::ShaderStage::Vertex)?;
        let context = GpuContext::new(target, size)?;
        let shared = SharedLayouts::new(&context.device);
        Ok(Self {
            context,
            shared,
            dump_path,
            compiled: 0,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }

    fn dump(&self, source: &str) {
        let Some(path) = self.dump_path.as_ref() else {
            return;
        };
        if let Err(err) = std::fs::write(path, source) {
            tracing::warn!(path = %path.display(), error = %err, "failed to dump wrapped shader");
        } else {
            tracing::debug!(path = %path.display(), "dumped wrapped shader");
        }
    }

    fn warn_mismatches(program: &mut GpuProgram, names: Vec<String>) {
        for name in names {
            if program.warned.insert(name.clone()) {
                tracing::warn!(uniform = %name, "uniform value does not match its declared type");
            }
        }
    }
}

impl RenderHost for WgpuHost {
    type Program = GpuProgram;

    fn compile(&mut self, program: &ComposedProgram) -> Result<GpuProgram, CompileLinkError> {
        let wrapped = wrap_fragment(&program.source)?;
        self.dump(&wrapped.source);
        validate_glsl(&wrapped.source, wgpu::naga::ShaderStage::Fragment)?;

        self.compiled += 1;
        let label = format!("composed program #{}", self.compiled);
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = ProgramPipeline::new(
            device,
            &self.context.queue,
            &self.shared,
            self.context.surface_format,
            &wrapped,
            &label,
        );
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(CompileLinkError::link(error.to_string()));
        }

        tracing::debug!(
            program = %label,
            uniform_bytes = wrapped.layout.size(),
            textures = wrapped.textures.len(),
            "built pipeline"
        );
        Ok(GpuProgram {
            pipeline,
            layout: wrapped.layout,
            staging: Vec::new(),
            warned: BTreeSet::new(),
        })
    }

    fn upload_uniforms(&mut self, program: &mut GpuProgram, uniforms: &UniformTable) {
        let mismatched = program.layout.pack(uniforms, &mut program.staging);
        Self::warn_mismatches(program, mismatched);
        self.context
            .queue
            .write_buffer(&program.pipeline.uniform_buffer, 0, &program.staging);

        let mut rebuild = false;
        let mut wrong_kind = Vec::new();
        for slot in &mut program.pipeline.textures {
            match uniforms.get(&slot.name) {
                Some(UniformValue::Texture(data)) => {
                    rebuild |= slot.upload(&self.context.device, &self.context.queue, data);
                }
                Some(_) => wrong_kind.push(slot.name.clone()),
                None => {}
            }
        }
        Self::warn_mismatches(program, wrong_kind);
        if rebuild {
            program
                .pipeline
                .rebuild_texture_bind_group(&self.context.device);
        }
    }

    fn draw(&mut self, program: &GpuProgram) -> Result<(), DrawError> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                return Err(DrawError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::Timeout) => return Err(DrawError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(DrawError::OutOfMemory),
            Err(other) => return Err(DrawError::Other(other.to_string())),
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&program.pipeline.pipeline);
            render_pass.set_bind_group(0, &program.pipeline.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &program.pipeline.texture_bind_group, &[]);
            render_pass.draw(0..4, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
