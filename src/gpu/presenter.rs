// ============================================================================
// VIEW PRESENTER — GPU rendition of `ViewTransform::render`
// ============================================================================
//
// One pass per frame: clear an offscreen target to the view background, draw
// the flattened canvas as a transformed quad with hardware alpha blending,
// then read the target back into the view's display surface so the rest of
// the app sees the same `Surface` it would get from the CPU path.

use bytemuck::{Pod, Zeroable};
use kurbo::Size;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::texture::{RenderTexture, SurfaceTexture};
use super::aligned_bytes_per_row;
use crate::error::PaintError;
use crate::surface::Surface;
use crate::view::ViewTransform;

/// Screen pixels per canvas pixel at which sampling switches to nearest.
const NEAREST_FILTER_ZOOM: f64 = 1.5;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ViewUniforms {
    /// Column-major `mat3x3<f32>`, each column padded to 16 bytes.
    pub transform: [[f32; 4]; 3],
}

pub struct ViewPresenter {
    ctx: GpuContext,
    pipeline: wgpu::RenderPipeline,
    texture_bgl: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sampler_linear: wgpu::Sampler,
    sampler_nearest: wgpu::Sampler,
    source: Option<SurfaceTexture>,
    target: Option<RenderTexture>,
    staging: Option<(wgpu::Buffer, u64)>,
}

impl ViewPresenter {
    pub fn new(ctx: GpuContext) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("view_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::VIEW_SHADER.into()),
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("view_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("view_tex_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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
            label: Some("view_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("view_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_view",
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // A flipped view reverses the winding.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_view",
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    // Surfaces hold straight alpha.
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("view_uniforms"),
            contents: bytemuck::bytes_of(&ViewUniforms {
                transform: [[0.0; 4]; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view_uniform_bg"),
            layout: &uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_linear"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_nearest"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            ctx,
            pipeline,
            texture_bgl,
            uniform_buffer,
            uniform_bind_group,
            sampler_linear,
            sampler_nearest,
            source: None,
            target: None,
            staging: None,
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Nearest-neighbour once canvas pixels are visibly large.
    fn sampler_for_zoom(&self, pixels_per_canvas_pixel: f64) -> &wgpu::Sampler {
        if pixels_per_canvas_pixel >= NEAREST_FILTER_ZOOM {
            &self.sampler_nearest
        } else {
            &self.sampler_linear
        }
    }

    /// Draw `source` through `view` into the view's display surface.
    /// `Ok(false)` for a degenerate viewport or view, as on the CPU path.
    pub fn render(
        &mut self,
        view: &mut ViewTransform,
        viewport: Size,
        source: &Surface,
    ) -> Result<bool, PaintError> {
        if !view.set_viewport(viewport) || view.screen_to_canvas_affine().is_none() {
            return Ok(false);
        }
        let width = viewport.width.round() as u32;
        let height = viewport.height.round() as u32;
        let (src_w, src_h) = source.size();
        if !self.ctx.supports_size(width, height) || !self.ctx.supports_size(src_w, src_h) {
            return Err(PaintError::Device(format!(
                "texture size exceeds device limit {}",
                self.ctx.max_texture_dim
            )));
        }

        self.upload_source(source);
        self.ensure_target(width, height);

        let uniforms = ViewUniforms {
            transform: view.transform_columns(),
        };
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let (Some(src_tex), Some(target)) = (self.source.as_ref(), self.target.as_ref()) else {
            return Ok(false);
        };
        let sampler = self.sampler_for_zoom(view.canvas_length_to_screen(1.0));
        let texture_bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view_tex_bg"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_tex.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let bg = view.background();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("view_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("view_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.r as f64,
                            g: bg.g as f64,
                            b: bg.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &texture_bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.ctx.submit_one(encoder);

        let pixels = readback_texture(&self.ctx, &target.texture, width, height, &mut self.staging)?;
        let display = view.display_target()?;
        if !display.bind().write_raw(&pixels) {
            return Err(PaintError::Readback("display size mismatch".to_string()));
        }
        Ok(true)
    }

    fn upload_source(&mut self, source: &Surface) {
        let stale = self.source.as_ref().is_none_or(|t| !t.matches(source));
        if stale {
            let (w, h) = source.size();
            self.source = Some(SurfaceTexture::new(&self.ctx.device, w, h));
        }
        if let Some(tex) = self.source.as_mut() {
            tex.sync(&self.ctx.queue, source);
        }
    }

    fn ensure_target(&mut self, width: u32, height: u32) {
        let stale = self
            .target
            .as_ref()
            .is_none_or(|t| (t.width, t.height) != (width, height));
        if stale {
            self.target = Some(RenderTexture::new(&self.ctx.device, width, height));
        }
    }
}

/// Copy a texture into tightly packed RGBA rows.  Blocks until the GPU has
/// finished; keep it out of hot per-stamp paths.
pub fn readback_texture(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    cached_staging: &mut Option<(wgpu::Buffer, u64)>,
) -> Result<Vec<u8>, PaintError> {
    let device = &ctx.device;
    let bytes_per_row = aligned_bytes_per_row(width);
    let buffer_size = bytes_per_row as u64 * height as u64;

    let reuse = matches!(cached_staging, Some((_, size)) if *size >= buffer_size);
    if !reuse {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        *cached_staging = Some((buffer, buffer_size));
    }
    let Some((staging, _)) = cached_staging.as_ref() else {
        return Err(PaintError::Readback("no staging buffer".to_string()));
    };

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.submit_one(encoder);

    let slice = staging.slice(..buffer_size);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(PaintError::Readback(format!("map failed: {:?}", e))),
        Err(e) => return Err(PaintError::Readback(format!("channel closed: {}", e))),
    }

    let row = width as usize * 4;
    let mut pixels = Vec::with_capacity(row * height as usize);
    {
        let mapped = slice.get_mapped_range();
        for y in 0..height as usize {
            let start = y * bytes_per_row as usize;
            pixels.extend_from_slice(&mapped[start..start + row]);
        }
    }
    staging.unmap();
    Ok(pixels)
}
