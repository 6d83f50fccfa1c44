use chunks::TextureData;
use wgpu::util::{DeviceExt, TextureDataOrder};

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const BYTES_PER_PIXEL: u32 = 4;

/// GPU texture backing one `sampler2D` uniform.
pub(crate) struct TextureSlot {
    pub name: String,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    texture: wgpu::Texture,
    size: (u32, u32),
    uploaded: Option<TextureData>,
}

impl TextureSlot {
    /// Starts as a 1x1 opaque white texel until a hook stores pixels.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue, name: &str) -> Self {
        let texture = create_texture(device, queue, name, 1, 1, &[255, 255, 255, 255]);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{name} sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            name: name.to_string(),
            view,
            sampler,
            texture,
            size: (1, 1),
            uploaded: None,
        }
    }

    /// Uploads `data` unless it is the allocation already on the GPU.
    ///
    /// Returns `true` when the texture was recreated and bind groups referring
    /// to the old view must be rebuilt.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> bool {
        if self
            .uploaded
            .as_ref()
            .is_some_and(|current| current.same_allocation(data))
        {
            return false;
        }

        let size = (data.width(), data.height());
        let recreated = size != self.size;
        if recreated {
            self.texture = create_texture(device, queue, &self.name, size.0, size.1, data.pixels());
            self.view = self
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.size = size;
            tracing::debug!(uniform = %self.name, width = size.0, height = size.1, "resized texture uniform");
        } else {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data.pixels(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.0 * BYTES_PER_PIXEL),
                    rows_per_image: Some(size.1),
                },
                wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.uploaded = Some(data.clone());
        recreated
    }
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    name: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("{name} texture")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        pixels,
    )
}

pub(crate) fn layout_entries(count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count * 2);
    for index in 0..count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

pub(crate) fn bind_group_entries(slots: &[TextureSlot]) -> Vec<wgpu::BindGroupEntry<'_>> {
    let mut entries = Vec::with_capacity(slots.len() * 2);
    for (index, slot) in slots.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(&slot.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&slot.sampler),
        });
    }
    entries
}
