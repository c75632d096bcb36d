use crate::shaders::REPLACEMENT_UNIFORM_SIZE;
use ahash::AHashMap as HashMap;
use hires_texture::{ReplacementId, ReplacementImage};
use slog::{debug, Logger};
use wgpu::util::DeviceExt;

struct GpuReplacement {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// GPU textures for replacement images, keyed by image identity.
///
/// Entries are only dropped by [`clear`](Self::clear), once the images they were made from are
/// gone.
pub(crate) struct GpuReplacementCache {
    sampler: wgpu::Sampler,
    enabled_buffer: wgpu::Buffer,
    fallback_bg: wgpu::BindGroup,
    entries: HashMap<ReplacementId, GpuReplacement>,
}

fn uniform_contents(enabled: bool) -> [u32; REPLACEMENT_UNIFORM_SIZE as usize / 4] {
    [enabled as u32, 0, 0, 0]
}

impl GpuReplacementCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("3D renderer replacement sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let enabled_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("3D renderer replacement enabled"),
            contents: bytemuck::cast_slice(&uniform_contents(true)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let disabled_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("3D renderer replacement disabled"),
            contents: bytemuck::cast_slice(&uniform_contents(false)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // A 1x1 placeholder, never sampled
        let placeholder = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("3D renderer replacement placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[0; 4],
        );
        let fallback_bg = create_bind_group(
            device,
            layout,
            &disabled_buffer,
            &placeholder.create_view(&wgpu::TextureViewDescriptor::default()),
            &sampler,
        );

        GpuReplacementCache {
            sampler,
            enabled_buffer,
            fallback_bg,
            entries: HashMap::default(),
        }
    }

    /// The bind group for draws sampling hardware textures.
    #[inline]
    pub fn fallback(&self) -> &wgpu::BindGroup {
        &self.fallback_bg
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Uploads `image` on first use.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        image: &ReplacementImage,
        logger: &Logger,
    ) {
        if self.entries.contains_key(&image.id()) {
            return;
        }
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("3D renderer replacement texture"),
                size: wgpu::Extent3d {
                    width: image.width(),
                    height: image.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.rgba(),
        );
        let bind_group = create_bind_group(
            device,
            layout,
            &self.enabled_buffer,
            &texture.create_view(&wgpu::TextureViewDescriptor::default()),
            &self.sampler,
        );
        debug!(
            logger,
            "Uploaded replacement texture {:?} ({}x{})",
            image.id(),
            image.width(),
            image.height()
        );
        self.entries.insert(image.id(), GpuReplacement { texture, bind_group });
    }

    /// Destroys every uploaded texture.
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.texture.destroy();
        }
    }

    /// The bind group for a replacement previously passed to [`prepare`](Self::prepare), or the
    /// fallback if it wasn't.
    pub fn bind_group(&self, id: ReplacementId) -> &wgpu::BindGroup {
        self.entries
            .get(&id)
            .map_or(&self.fallback_bg, |entry| &entry.bind_group)
    }
}

impl Drop for GpuReplacementCache {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.texture.destroy();
        }
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("3D renderer replacement bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

pub(crate) fn create_bg_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("3D renderer replacement bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(REPLACEMENT_UNIFORM_SIZE),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}
