#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

mod batch;
mod capture;
mod data;
pub use data::{FrameData, MAX_POLYGONS, MAX_VERTICES};
mod key;
mod prepare;
mod replacement;
mod scene;
mod shaders;
mod state;
mod utils;
mod vram;

use ahash::AHashMap as HashMap;
use capture::Capture;
use core::mem;
use hires_core::gpu::{
    engine_3d::{Color, RenderingControl, RenderingState},
    vram::VramSource,
    SCREEN_HEIGHT, SCREEN_WIDTH,
};
use hires_texture::{toggles::Features, ReplacementConfig, ReplacementId, TextureReplacer};
use prepare::{PolygonPreparer, Vertex};
use replacement::GpuReplacementCache;
use scene::{Command, SceneParams, ScenePlanner};
use shaders::{edge_marking::EdgeUniform, fog::FogUniform};
use slog::{debug, info, Logger};
use state::PipelineKey;
use std::sync::Arc;
use utils::{color_to_wgpu_f64, round_up_to_alignment};

proc_bitfield::bitfield! {
    /// The display control bits the scene shaders look at.
    #[derive(Clone, Copy, PartialEq, Eq)]
    struct ShaderControl(pub u32): Debug {
        pub texture_mapping_enabled: bool @ 0,
        pub highlight_shading_enabled: bool @ 1,
        pub alpha_test_enabled: bool @ 2,
    }
}

impl From<RenderingControl> for ShaderControl {
    fn from(other: RenderingControl) -> Self {
        ShaderControl(other.0 as u32 & 7)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    screen_size: [f32; 2],
    disp_cnt: u32,
    alpha_test_ref: u32,
    toon_colors: [[f32; 4]; 32],
}

impl FrameUniforms {
    fn new(state: &RenderingState, scale_factor: u8) -> Self {
        FrameUniforms {
            screen_size: [
                (SCREEN_WIDTH * scale_factor as usize) as f32,
                (SCREEN_HEIGHT * scale_factor as usize) as f32,
            ],
            disp_cnt: ShaderControl::from(state.control).0,
            alpha_test_ref: state.alpha_test_ref as u32,
            toon_colors: state.toon_colors.map(Color::to_f32),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct RenderSettings {
    /// Integer upscale factor applied to the native 256x192 resolution.
    pub scale_factor: u8,
    /// Splits polygons with more than 3 vertices into a fan around their center.
    pub better_polygons: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            scale_factor: 1,
            better_polygons: false,
        }
    }
}

impl RenderSettings {
    pub const MAX_SCALE_FACTOR: u8 = 16;

    #[must_use]
    pub fn clamped(self) -> Self {
        RenderSettings {
            scale_factor: self.scale_factor.clamp(1, Self::MAX_SCALE_FACTOR),
            ..self
        }
    }
}

pub(crate) struct BgLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub replacement: wgpu::BindGroupLayout,
    pub depth_attrs: wgpu::BindGroupLayout,
    pub edge: wgpu::BindGroupLayout,
    pub fog: wgpu::BindGroupLayout,
    pub color: wgpu::BindGroupLayout,
}

fn texture_layout_entry(
    binding: u32,
    sample_type: wgpu::TextureSampleType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

impl BgLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let unfilterable = wgpu::TextureSampleType::Float { filterable: false };

        BgLayouts {
            frame: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("3D renderer frame bind group layout"),
                entries: &[
                    uniform_layout_entry(
                        0,
                        wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        mem::size_of::<FrameUniforms>(),
                    ),
                    texture_layout_entry(1, wgpu::TextureSampleType::Uint),
                    texture_layout_entry(2, wgpu::TextureSampleType::Uint),
                ],
            }),
            replacement: replacement::create_bg_layout(device),
            depth_attrs: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("3D renderer depth and attributes bind group layout"),
                entries: &[
                    texture_layout_entry(0, wgpu::TextureSampleType::Depth),
                    texture_layout_entry(1, unfilterable),
                ],
            }),
            edge: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("3D renderer edge marking bind group layout"),
                entries: &[uniform_layout_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    mem::size_of::<EdgeUniform>(),
                )],
            }),
            fog: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("3D renderer fog bind group layout"),
                entries: &[uniform_layout_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    mem::size_of::<FogUniform>(),
                )],
            }),
            color: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("3D renderer color bind group layout"),
                entries: &[texture_layout_entry(0, unfilterable)],
            }),
        }
    }
}

pub(crate) struct OutputAttachments {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    attrs_view: wgpu::TextureView,
    depth_stencil_view: wgpu::TextureView,
    depth_attrs_bg: wgpu::BindGroup,
    color_bg: wgpu::BindGroup,
}

impl OutputAttachments {
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const ATTRS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    fn new(device: &wgpu::Device, bg_layouts: &BgLayouts, scale_factor: u8) -> Self {
        let size = wgpu::Extent3d {
            width: SCREEN_WIDTH as u32 * scale_factor as u32,
            height: SCREEN_HEIGHT as u32 * scale_factor as u32,
            depth_or_array_layers: 1,
        };
        let create = |label: &str, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };

        let color = create("3D renderer color", Self::COLOR_FORMAT);
        let color_view = color.create_view(&wgpu::TextureViewDescriptor {
            label: Some("3D renderer color view"),
            ..wgpu::TextureViewDescriptor::default()
        });

        let attrs = create("3D renderer attributes", Self::ATTRS_FORMAT);
        let attrs_view = attrs.create_view(&wgpu::TextureViewDescriptor {
            label: Some("3D renderer attributes view"),
            ..wgpu::TextureViewDescriptor::default()
        });

        let depth = create("3D renderer depth", Self::DEPTH_FORMAT);
        let depth_stencil_view = depth.create_view(&wgpu::TextureViewDescriptor {
            label: Some("3D renderer depth/stencil view"),
            ..wgpu::TextureViewDescriptor::default()
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor {
            label: Some("3D renderer depth view"),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..wgpu::TextureViewDescriptor::default()
        });

        let depth_attrs_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("3D renderer depth and attributes bind group"),
            layout: &bg_layouts.depth_attrs,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&attrs_view),
                },
            ],
        });
        let color_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("3D renderer color bind group"),
            layout: &bg_layouts.color,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color_view),
            }],
        });

        OutputAttachments {
            color,
            color_view,
            attrs_view,
            depth_stencil_view,
            depth_attrs_bg,
            color_bg,
        }
    }
}

/// A vertex or index buffer that grows to fit each frame's contents.
struct GrowableBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    raw: wgpu::Buffer,
}

impl GrowableBuffer {
    const GRANULARITY: usize = 0x1_0000;

    fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        size: usize,
    ) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        GrowableBuffer {
            label,
            usage,
            raw: Self::create(device, label, usage, size),
        }
    }

    fn create(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        size: usize,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: round_up_to_alignment(size.max(1), Self::GRANULARITY) as u64,
            usage,
            mapped_at_creation: false,
        })
    }

    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if (self.raw.size() as usize) < data.len() {
            self.raw = Self::create(device, self.label, self.usage, data.len());
        }
        queue.write_buffer(&self.raw, 0, data);
    }
}

fn create_uniform_bg(
    device: &wgpu::Device,
    label: &'static str,
    layout: &wgpu::BindGroupLayout,
    entries: &[wgpu::BindGroupEntry],
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries,
    })
}

fn create_uniform_buffer(device: &wgpu::Device, label: &'static str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    logger: Logger,

    settings: RenderSettings,
    bg_layouts: BgLayouts,
    output_attachments: OutputAttachments,

    vram: vram::GpuVram,
    frame_buffer: wgpu::Buffer,
    frame_bg: wgpu::BindGroup,
    edge_buffer: wgpu::Buffer,
    edge_bg: wgpu::BindGroup,
    fog_buffer: wgpu::Buffer,
    fog_bg: wgpu::BindGroup,

    preparer: PolygonPreparer,
    vtx_buffer: GrowableBuffer,
    idx_buffer: GrowableBuffer,
    edge_idx_buffer: GrowableBuffer,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    clear_shadow_pipeline: wgpu::RenderPipeline,
    edge_marking_pipelines: [wgpu::RenderPipeline; 2],
    fog_pipelines: [wgpu::RenderPipeline; 2],
    downscale_pipeline: wgpu::RenderPipeline,

    replacer: TextureReplacer,
    replacements: GpuReplacementCache,
    capture: Capture,
}

impl Renderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        settings: RenderSettings,
        replacement_config: &ReplacementConfig,
        logger: Logger,
    ) -> Self {
        let settings = settings.clamped();
        let bg_layouts = BgLayouts::new(&device);
        let output_attachments =
            OutputAttachments::new(&device, &bg_layouts, settings.scale_factor);

        let vram = vram::GpuVram::new(&device);

        let frame_buffer = create_uniform_buffer(
            &device,
            "3D renderer frame uniforms",
            mem::size_of::<FrameUniforms>(),
        );
        let frame_bg = create_uniform_bg(
            &device,
            "3D renderer frame bind group",
            &bg_layouts.frame,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&vram.texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&vram.tex_pal_view),
                },
            ],
        );

        let edge_buffer = create_uniform_buffer(
            &device,
            "3D renderer edge marking uniforms",
            mem::size_of::<EdgeUniform>(),
        );
        let edge_bg = create_uniform_bg(
            &device,
            "3D renderer edge marking bind group",
            &bg_layouts.edge,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: edge_buffer.as_entire_binding(),
            }],
        );

        let fog_buffer =
            create_uniform_buffer(&device, "3D renderer fog uniforms", mem::size_of::<FogUniform>());
        let fog_bg = create_uniform_bg(
            &device,
            "3D renderer fog bind group",
            &bg_layouts.fog,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: fog_buffer.as_entire_binding(),
            }],
        );

        let vtx_buffer = GrowableBuffer::new(
            &device,
            "3D renderer vertices",
            wgpu::BufferUsages::VERTEX,
            mem::size_of::<Vertex>() * MAX_VERTICES,
        );
        let idx_buffer = GrowableBuffer::new(
            &device,
            "3D renderer vertex indices",
            wgpu::BufferUsages::INDEX,
            4 * MAX_POLYGONS * (10 - 2) * 3,
        );
        let edge_idx_buffer = GrowableBuffer::new(
            &device,
            "3D renderer edge indices",
            wgpu::BufferUsages::INDEX,
            4 * MAX_POLYGONS * 10 * 2,
        );

        let clear_shadow_pipeline = shaders::clear_shadow::create_pipeline(&device);
        let edge_marking_pipelines = [false, true]
            .map(|aa| shaders::edge_marking::create_pipeline(aa, &device, &bg_layouts));
        let fog_pipelines = [false, true]
            .map(|only_alpha| shaders::fog::create_pipeline(only_alpha, &device, &bg_layouts));
        let downscale_pipeline = shaders::downscale::create_pipeline(&device, &bg_layouts);

        let replacer = TextureReplacer::new(
            replacement_config,
            logger.new(slog::o!("component" => "replacer")),
        );
        let replacements = GpuReplacementCache::new(&device, &queue, &bg_layouts.replacement);
        let capture = Capture::new(&device);

        info!(logger, "3D renderer created"; "scale_factor" => settings.scale_factor);

        Renderer {
            device,
            queue,
            logger,

            settings,
            bg_layouts,
            output_attachments,

            vram,
            frame_buffer,
            frame_bg,
            edge_buffer,
            edge_bg,
            fog_buffer,
            fog_bg,

            preparer: PolygonPreparer::new(),
            vtx_buffer,
            idx_buffer,
            edge_idx_buffer,

            pipelines: HashMap::default(),
            clear_shadow_pipeline,
            edge_marking_pipelines,
            fog_pipelines,
            downscale_pipeline,

            replacer,
            replacements,
            capture,
        }
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn render_settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        let settings = settings.clamped();
        if settings.scale_factor != self.settings.scale_factor {
            info!(
                self.logger,
                "Changing 3D resolution";
                "width" => SCREEN_WIDTH * settings.scale_factor as usize,
                "height" => SCREEN_HEIGHT * settings.scale_factor as usize,
            );
            self.output_attachments =
                OutputAttachments::new(&self.device, &self.bg_layouts, settings.scale_factor);
        }
        self.settings = settings;
    }

    /// Forgets loaded replacement images, their GPU copies and the set of dumped textures.
    pub fn reset(&mut self) {
        self.replacer.reset();
        self.replacements.clear();
    }

    pub fn create_output_view(&self) -> wgpu::TextureView {
        self.output_attachments
            .color
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Returns a line of the last frame at native resolution, converted to 6-bit color with
    /// alpha in bits 24-28.
    pub fn read_capture_line(&mut self, line: usize) -> [u32; SCREEN_WIDTH] {
        self.capture.read_line(&self.device, line, &self.logger)
    }

    fn write_uniforms(&self, state: &RenderingState) {
        self.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms::new(state, self.settings.scale_factor)),
        );
        self.queue.write_buffer(
            &self.edge_buffer,
            0,
            bytemuck::bytes_of(&EdgeUniform {
                colors: state.edge_colors.map(Color::to_f32),
                clear_id: state.clear_attrs.poly_id() as f32 / 63.0,
                clear_depth: state.clear_depth_24() as f32 / (1 << 24) as f32,
                _pad: [0.0; 2],
            }),
        );
        self.queue.write_buffer(
            &self.fog_buffer,
            0,
            bytemuck::bytes_of(&FogUniform::new(
                &state.fog_densities,
                state.fog_offset_24(),
                state.control.fog_depth_shift(),
            )),
        );
    }

    fn replacement_bg(&self, id: Option<ReplacementId>) -> &wgpu::BindGroup {
        match id {
            Some(id) => self.replacements.bind_group(id),
            None => self.replacements.fallback(),
        }
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        state: &RenderingState,
        commands: &[Command],
    ) {
        let clear_attrs = state.clear_attrs;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("3D renderer scene pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_attachments.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color_to_wgpu_f64(state.clear_color())),
                        store: wgpu::StoreOp::Store,
                    },
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_attachments.attrs_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear_attrs.poly_id() as f64 / 63.0,
                            g: 0.0,
                            b: clear_attrs.fog_enabled() as u8 as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.output_attachments.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(state.clear_depth_24() as f32 / (1 << 24) as f32),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0xFF),
                    store: wgpu::StoreOp::Discard,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if commands.is_empty() {
            return;
        }

        render_pass.set_vertex_buffer(0, self.vtx_buffer.raw.slice(..));
        render_pass.set_bind_group(0, &self.frame_bg, &[]);

        let mut cur_state = None;
        let mut cur_pipeline = None;
        let mut cur_replacement = None;
        let mut cur_edges = None;

        for command in commands {
            match command {
                Command::SetState(pass_state) => {
                    cur_state = Some(*pass_state);
                    render_pass.set_stencil_reference(pass_state.stencil.reference as u32);
                }

                Command::ClearShadowBits => {
                    render_pass.set_pipeline(&self.clear_shadow_pipeline);
                    render_pass.draw(0..4, 0..1);
                    cur_pipeline = None;
                }

                Command::Draw(draw) => {
                    let Some(pass_state) = cur_state else {
                        continue;
                    };
                    let key = pass_state.pipeline_key(draw.prim, state.w_buffering);
                    if cur_pipeline != Some(key) {
                        let Some(pipeline) = self.pipelines.get(&key) else {
                            continue;
                        };
                        render_pass.set_pipeline(pipeline);
                        render_pass.set_bind_group(0, &self.frame_bg, &[]);
                        cur_pipeline = Some(key);
                        cur_replacement = None;
                    }

                    let replacement = draw.replacement.as_ref().map(|image| image.id());
                    if cur_replacement != Some(replacement) {
                        render_pass.set_bind_group(1, self.replacement_bg(replacement), &[]);
                        cur_replacement = Some(replacement);
                    }

                    if cur_edges != Some(draw.edges) {
                        let buffer = if draw.edges {
                            &self.edge_idx_buffer
                        } else {
                            &self.idx_buffer
                        };
                        render_pass
                            .set_index_buffer(buffer.raw.slice(..), wgpu::IndexFormat::Uint32);
                        cur_edges = Some(draw.edges);
                    }

                    render_pass.draw_indexed(draw.indices.clone(), 0, 0..1);
                }
            }
        }
    }

    fn encode_composite(&self, encoder: &mut wgpu::CommandEncoder, state: &RenderingState) {
        let control = state.control;
        if !control.edge_marking_enabled() && !control.fog_enabled() {
            return;
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("3D renderer composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.output_attachments.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_bind_group(1, &self.output_attachments.depth_attrs_bg, &[]);

        if control.edge_marking_enabled() {
            render_pass.set_pipeline(
                &self.edge_marking_pipelines[control.antialiasing_enabled() as usize],
            );
            render_pass.set_bind_group(0, &self.edge_bg, &[]);
            render_pass.draw(0..4, 0..1);
        }

        if control.fog_enabled() {
            render_pass.set_pipeline(&self.fog_pipelines[control.fog_only_alpha() as usize]);
            render_pass.set_bind_group(0, &self.fog_bg, &[]);
            render_pass.set_blend_constant(color_to_wgpu_f64(state.fog_color));
            render_pass.draw(0..4, 0..1);
        }
    }

    pub fn render_frame(
        &mut self,
        frame: &FrameData,
        vram: &mut impl VramSource,
    ) -> wgpu::CommandBuffer {
        let dirty = vram.derive_state();
        vram.make_coherent(dirty);
        self.vram.upload(&self.queue, vram.flat(), dirty);

        let features = Features::current();
        self.replacer.scan_frame(&frame.poly_ram, vram.flat(), features);

        let state = &frame.state;
        let replacer = &self.replacer;
        self.preparer.prepare(
            &frame.vert_ram,
            &frame.poly_ram,
            state.w_buffering,
            &self.settings,
            |poly| {
                if features.replace {
                    replacer.bound_replacement(poly)
                } else {
                    None
                }
            },
        );

        for image in self.preparer.polys.iter().filter_map(|poly| poly.replacement.as_ref()) {
            self.replacements.prepare(
                &self.device,
                &self.queue,
                &self.bg_layouts.replacement,
                image,
                &self.logger,
            );
        }

        self.vtx_buffer.write(
            &self.device,
            &self.queue,
            bytemuck::cast_slice(&self.preparer.vertices),
        );
        self.idx_buffer.write(
            &self.device,
            &self.queue,
            bytemuck::cast_slice(&self.preparer.indices),
        );
        self.edge_idx_buffer.write(
            &self.device,
            &self.queue,
            bytemuck::cast_slice(&self.preparer.edge_indices),
        );
        self.write_uniforms(state);

        let commands = ScenePlanner::new(
            &self.preparer.polys,
            SceneParams::new(state, features.replace),
        )
        .plan();

        let mut cur_state = None;
        for command in &commands {
            match command {
                Command::SetState(pass_state) => cur_state = Some(*pass_state),
                Command::Draw(draw) => {
                    if let Some(pass_state) = cur_state {
                        let key = pass_state.pipeline_key(draw.prim, state.w_buffering);
                        self.pipelines.entry(key).or_insert_with(|| {
                            shaders::scene::create_pipeline(key, &self.device, &self.bg_layouts)
                        });
                    }
                }
                Command::ClearShadowBits => {}
            }
        }

        debug!(
            self.logger,
            "Rendering 3D frame";
            "polys" => self.preparer.polys.len(),
            "commands" => commands.len(),
            "pipelines" => self.pipelines.len(),
            "replacement_textures" => self.replacements.len(),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("3D renderer command encoder"),
            });

        self.encode_scene(&mut encoder, state, &commands);
        self.encode_composite(&mut encoder, state);
        self.capture.encode(
            &mut encoder,
            &self.downscale_pipeline,
            &self.output_attachments.color_bg,
        );

        encoder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_control_keeps_shading_bits() {
        let control = RenderingControl(0)
            .with_texture_mapping_enabled(true)
            .with_alpha_test_enabled(true)
            .with_fog_enabled(true)
            .with_edge_marking_enabled(true);
        let shader_control = ShaderControl::from(control);
        assert!(shader_control.texture_mapping_enabled());
        assert!(!shader_control.highlight_shading_enabled());
        assert!(shader_control.alpha_test_enabled());
        assert_eq!(shader_control.0, 0b101);
    }

    #[test]
    fn frame_uniforms_match_wgsl_layout() {
        assert_eq!(mem::size_of::<FrameUniforms>(), 528);
    }

    #[test]
    fn frame_uniforms_scale_screen_size() {
        let uniforms = FrameUniforms::new(&RenderingState::default(), 3);
        assert_eq!(uniforms.screen_size, [768.0, 576.0]);
    }

    #[test]
    fn settings_are_clamped() {
        let settings = RenderSettings {
            scale_factor: 0,
            better_polygons: true,
        }
        .clamped();
        assert_eq!(settings.scale_factor, 1);
        assert!(settings.better_polygons);
        assert_eq!(
            RenderSettings {
                scale_factor: 40,
                ..RenderSettings::default()
            }
            .clamped()
            .scale_factor,
            RenderSettings::MAX_SCALE_FACTOR
        );
    }
}
