mod context;
mod depth;
mod pipeline;

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use winit::window::Window;

use self::context::GpuContext;
use self::depth::Depth;
use self::pipeline::PipelineBuilder;
use super::{
    BackendKind, BoundMaterial, FixedFunctionState, MaterialBinding, RasterBackend, TriangleBatch,
};
use crate::error::BackendError;
use crate::renderer::{Color, ScissorRect, TexEnvMode, Texture};
use crate::scene::Camera;
use crate::settings::RenderSettings;

const MODE_TEXTURED: u32 = 1 << 2;
const MODE_ALPHA_TEST: u32 = 1 << 3;
const INITIAL_VERTEX_CAPACITY: usize = 4096;

/// Clip-space vertex. Transforms run on the CPU so one buffer serves every
/// draw in the frame regardless of how many matrices were loaded.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct GpuVertex {
    clip: [f32; 4],
    color: [f32; 4],
    uv: [f32; 2],
    mode: u32,
    _pad: u32,
}

impl GpuVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x2, 3 => Uint32];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Bits 0-1 select the texture environment, bit 2 enables sampling and bit
/// 3 discards fragments below half alpha.
fn shader_mode(material: &BoundMaterial) -> u32 {
    let mut mode = match material.tex_env_mode {
        TexEnvMode::Modulate => 0,
        TexEnvMode::Replace => 1,
        TexEnvMode::Decal => 2,
    };
    if material.texture.is_some() {
        mode |= MODE_TEXTURED;
    }
    if material.alpha_test {
        mode |= MODE_ALPHA_TEST;
    }
    mode
}

#[derive(Debug, Clone, Copy)]
struct DrawCommand {
    first_vertex: u32,
    vertex_count: u32,
    texture: Option<u64>,
    blend: bool,
    scissor: (u32, u32, u32, u32),
    layer: u32,
}

/// wgpu rasterizer. Draw calls are recorded during the frame and replayed
/// at `end_frame`, one render pass per depth layer.
pub struct GpuBackend {
    context: GpuContext,
    opaque_pipeline: wgpu::RenderPipeline,
    blend_pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,
    textures: HashMap<u64, wgpu::BindGroup>,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    state: FixedFunctionState,
    vertices: Vec<GpuVertex>,
    draws: Vec<DrawCommand>,
    clear: Color,
    layer: u32,
}

impl GpuBackend {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, BackendError> {
        let context = GpuContext::new(window, settings).await?;
        let device = &context.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Layered Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shader/layered.wgsl").into()),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Layered Pipeline Layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });

        let format = context.config.format;
        let opaque_pipeline = PipelineBuilder::new(device, &layout, &shader)
            .with_label("Opaque Pipeline")
            .with_vertex_buffer(GpuVertex::desc())
            .with_color_target(format, Some(wgpu::BlendState::REPLACE))
            .with_depth_stencil(Depth::FORMAT, true, wgpu::CompareFunction::LessEqual)
            .with_no_culling()
            .build();
        let blend_pipeline = PipelineBuilder::new(device, &layout, &shader)
            .with_label("Blend Pipeline")
            .with_vertex_buffer(GpuVertex::desc())
            .with_color_target(format, Some(wgpu::BlendState::ALPHA_BLENDING))
            .with_depth_stencil(Depth::FORMAT, false, wgpu::CompareFunction::LessEqual)
            .with_no_culling()
            .build();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = Self::create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY);

        let backend = Self {
            white: Self::upload_texture(
                &context,
                &texture_layout,
                &sampler,
                &Texture::solid("white", Color::WHITE),
            ),
            context,
            opaque_pipeline,
            blend_pipeline,
            texture_layout,
            sampler,
            textures: HashMap::new(),
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            state: FixedFunctionState::default(),
            vertices: Vec::new(),
            draws: Vec::new(),
            clear: Color::BLACK,
            layer: 0,
        };
        log::info!(
            "GPU backend ready ({}x{}, {:?})",
            backend.context.config.width,
            backend.context.config.height,
            format
        );
        Ok(backend)
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Vertex Buffer"),
            size: (capacity * std::mem::size_of::<GpuVertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn upload_texture(
        context: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture: &Texture,
    ) -> wgpu::BindGroup {
        let size = wgpu::Extent3d {
            width: texture.width(),
            height: texture.height(),
            depth_or_array_layers: 1,
        };
        let gpu_texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(texture.name()),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texture.image().as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * texture.width()),
                rows_per_image: Some(texture.height()),
            },
            size,
        );
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn ensure_texture(&mut self, texture: &Texture) {
        if self.textures.contains_key(&texture.id()) {
            return;
        }
        log::debug!("Uploading texture '{}' ({})", texture.name(), texture.id());
        let bind_group =
            Self::upload_texture(&self.context, &self.texture_layout, &self.sampler, texture);
        self.textures.insert(texture.id(), bind_group);
    }

    fn upload_vertices(&mut self) {
        if self.vertices.len() > self.vertex_capacity {
            self.vertex_capacity = self.vertices.len().next_power_of_two();
            log::debug!("Growing frame vertex buffer to {}", self.vertex_capacity);
            self.vertex_buffer = Self::create_vertex_buffer(&self.context.device, self.vertex_capacity);
        }
        if !self.vertices.is_empty() {
            self.context
                .queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        }
    }

    fn reset_frame(&mut self) {
        self.vertices.clear();
        self.draws.clear();
        self.layer = 0;
    }

    fn encode_layers(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let [r, g, b, a] = self.clear.to_f32();
        for layer in 0..=self.layer {
            let load = if layer == 0 {
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                })
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Layer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.context.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if self.vertices.is_empty() {
                continue;
            }
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            for draw in self.draws.iter().filter(|d| d.layer == layer) {
                pass.set_pipeline(if draw.blend {
                    &self.blend_pipeline
                } else {
                    &self.opaque_pipeline
                });
                let bind_group = draw
                    .texture
                    .and_then(|id| self.textures.get(&id))
                    .unwrap_or(&self.white);
                pass.set_bind_group(0, bind_group, &[]);
                let (x0, y0, x1, y1) = draw.scissor;
                pass.set_scissor_rect(x0, y0, x1 - x0, y1 - y0);
                pass.draw(draw.first_vertex..draw.first_vertex + draw.vertex_count, 0..1);
            }
        }
    }
}

impl RasterBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn begin_frame(&mut self, clear: Color) {
        self.reset_frame();
        self.clear = clear;
        self.state.model = Mat4::IDENTITY;
        self.state.scissor = ScissorRect::DISABLED;
        self.state.material = None;
    }

    fn apply_camera_projection(&mut self, camera: &Camera) {
        self.state.view_proj = camera.view_proj();
    }

    fn load_transform(&mut self, matrix: &Mat4) {
        self.state.model = *matrix;
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) {
        self.state.scissor = *scissor;
    }

    fn bind_material(&mut self, binding: &MaterialBinding<'_>) {
        let bound = BoundMaterial::from_binding(binding);
        if let Some(texture) = &bound.texture {
            self.ensure_texture(texture);
        }
        self.state.material = Some(bound);
    }

    fn unbind_material(&mut self) {
        self.state.material = None;
    }

    fn draw_indexed_triangles(&mut self, batch: &TriangleBatch<'_>) {
        let (width, height) = self.viewport_size();
        let Some(scissor) = self.state.scissor.clip_bounds(width, height) else {
            return;
        };
        let material = self.state.material();
        let mvp = self.state.mvp();
        let mode = shader_mode(&material);
        let used = batch.triangle_count() * 3;
        if used == 0 {
            return;
        }
        let first_vertex = self.vertices.len() as u32;
        for &index in &batch.indices[..used] {
            let i = index as usize;
            let clip = mvp * batch.vertices[i].extend(1.0);
            self.vertices.push(GpuVertex {
                clip: clip.to_array(),
                color: material.base_color(batch.color(i)).to_f32(),
                uv: batch.uv(i).to_array(),
                mode,
                _pad: 0,
            });
        }
        self.draws.push(DrawCommand {
            first_vertex,
            vertex_count: used as u32,
            texture: material.texture.as_ref().map(|t| t.id()),
            blend: material.alpha_blend,
            scissor,
            layer: self.layer,
        });
    }

    fn clear_depth(&mut self) {
        self.layer += 1;
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated; reconfiguring and dropping the frame");
                self.context.reconfigure();
                self.reset_frame();
                return Ok(());
            }
            Err(err) => {
                self.reset_frame();
                return Err(err.into());
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_vertices();
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });
        self.encode_layers(&mut encoder, &view);
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();

        log::trace!(
            "GPU frame: {} draws, {} vertices, {} layers",
            self.draws.len(),
            self.vertices.len(),
            self.layer + 1
        );
        self.reset_frame();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }
}
