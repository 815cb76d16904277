use std::sync::Arc;

use bytemuck::Zeroable;
use redshift_relativity::ShaderParameters;
use wgpu::util::DeviceExt;

use super::{WARP_SHADER_SOURCE, WarpError, WarpStage, WarpUniforms, check_sizes};
use crate::camera::ViewCamera;
use crate::cubemap::EnvironmentMap;
use crate::gpu::{GpuContext, GpuContextError};
use crate::raster::Raster;

const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Warp pass on the GPU: upload, one fullscreen draw, read back.
pub struct GpuWarpStage {
    context: Option<GpuContext>,
    pipeline: Option<WarpPipeline>,
    frame: Option<FrameTargets>,
    environment: Option<Arc<EnvironmentMap>>,
    shader_source: &'static str,
}

/// Size-independent GPU objects.
struct WarpPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    environment_view: wgpu::TextureView,
    has_environment: bool,
}

/// Objects sized to the frame.
struct FrameTargets {
    width: u32,
    height: u32,
    padded_row: u32,
    source_texture: wgpu::Texture,
    output_texture: wgpu::Texture,
    output_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl Default for GpuWarpStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuWarpStage {
    /// Stage with no device yet; `init` acquires one.
    pub fn new() -> Self {
        Self {
            context: None,
            pipeline: None,
            frame: None,
            environment: None,
            shader_source: WARP_SHADER_SOURCE,
        }
    }

    /// Acquire a device up front so the caller can choose another stage on failure.
    pub fn probe() -> Result<Self, GpuContextError> {
        let context = GpuContext::new()?;
        Ok(Self {
            context: Some(context),
            ..Self::new()
        })
    }

    fn upload_environment(&mut self) {
        let (Some(ctx), Some(pipeline)) = (self.context.as_ref(), self.pipeline.as_mut()) else {
            return;
        };
        let (view, has_environment) = create_environment_view(ctx, self.environment.as_deref());
        pipeline.environment_view = view;
        pipeline.has_environment = has_environment;
        if let Some(frame) = self.frame.as_mut() {
            frame.bind_group = create_bind_group(ctx, pipeline, &frame.source_texture);
        }
    }
}

impl WarpStage for GpuWarpStage {
    fn label(&self) -> &'static str {
        "gpu"
    }

    fn init(&mut self, width: u32, height: u32) -> Result<(), WarpError> {
        let (width, height) = (width.max(1), height.max(1));
        if self.context.is_none() {
            self.context = Some(GpuContext::new()?);
        }
        let Some(ctx) = self.context.as_ref() else {
            return Err(WarpError::Unavailable("gpu"));
        };
        if self.pipeline.is_none() {
            self.frame = None;
            let pipeline = create_pipeline(ctx, self.shader_source, self.environment.as_deref())?;
            self.pipeline = Some(pipeline);
        }
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(WarpError::Unavailable("gpu"));
        };
        self.frame = Some(create_frame_targets(ctx, pipeline, width, height));
        log::debug!("GPU warp stage sized to {width}x{height}");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.context.is_some() && self.pipeline.is_some() && self.frame.is_some()
    }

    fn set_environment(&mut self, environment: Option<Arc<EnvironmentMap>>) {
        self.environment = environment;
        self.upload_environment();
    }

    fn apply(
        &mut self,
        params: &ShaderParameters,
        camera: &ViewCamera,
        source: &Raster,
        target: &mut Raster,
    ) -> Result<(), WarpError> {
        let (Some(ctx), Some(pipeline), Some(frame)) = (
            self.context.as_ref(),
            self.pipeline.as_ref(),
            self.frame.as_ref(),
        ) else {
            return Err(WarpError::Unavailable("gpu"));
        };
        check_sizes((frame.width, frame.height), source, target)?;

        let camera = camera.with_size(frame.width, frame.height);
        let uniforms = WarpUniforms::new(params, &camera, pipeline.has_environment);
        ctx.queue
            .write_buffer(&pipeline.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let extent = wgpu::Extent3d {
            width: frame.width,
            height: frame.height,
            depth_or_array_layers: 1,
        };
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.source_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            source.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            extent,
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("warp-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("warp-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &frame.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.output_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &frame.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(frame.padded_row),
                    rows_per_image: Some(frame.height),
                },
            },
            extent,
        );
        ctx.queue.submit([encoder.finish()]);

        let slice = frame.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        if let Err(err) = ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            frame.readback.unmap();
            return Err(WarpError::Readback(err.to_string()));
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(WarpError::Readback(err.to_string())),
            Err(err) => return Err(WarpError::Readback(err.to_string())),
        }

        {
            let mapped = slice.get_mapped_range();
            let row = frame.width as usize * 4;
            let out = target.as_bytes_mut();
            for y in 0..frame.height as usize {
                let start = y * frame.padded_row as usize;
                out[y * row..(y + 1) * row].copy_from_slice(&mapped[start..start + row]);
            }
        }
        frame.readback.unmap();
        Ok(())
    }

    fn teardown(&mut self) {
        self.frame = None;
        self.pipeline = None;
        self.context = None;
        log::debug!("GPU warp stage torn down");
    }
}

/// Build the pipeline inside a validation scope so a bad shader is an error, not a panic.
fn create_pipeline(
    ctx: &GpuContext,
    shader_source: &str,
    environment: Option<&EnvironmentMap>,
) -> Result<WarpPipeline, WarpError> {
    let device = &ctx.device;
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("warp-shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("warp-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<WarpUniforms>() as u64,
                    ),
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
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("warp-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("warp-pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_warp"),
            targets: &[Some(wgpu::ColorTargetState {
                format: FRAME_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(scope.pop()) {
        return Err(WarpError::Pipeline(err.to_string()));
    }

    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("warp-uniforms"),
        contents: bytemuck::bytes_of(&WarpUniforms::zeroed()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("warp-environment-sampler"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let (environment_view, has_environment) = create_environment_view(ctx, environment);
    log::info!("GPU warp pipeline created");

    Ok(WarpPipeline {
        pipeline,
        bind_group_layout,
        uniform_buffer,
        sampler,
        environment_view,
        has_environment,
    })
}

/// Upload the cubemap, or a 1x1 transparent placeholder when there is none.
fn create_environment_view(
    ctx: &GpuContext,
    environment: Option<&EnvironmentMap>,
) -> (wgpu::TextureView, bool) {
    let placeholder;
    let (env, present) = match environment {
        Some(env) => (env, true),
        None => {
            placeholder = EnvironmentMap::uniform(1, [0, 0, 0, 0]);
            (&placeholder, false)
        }
    };
    let face_size = env.face_size();
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("warp-environment"),
        size: wgpu::Extent3d {
            width: face_size,
            height: face_size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FRAME_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (i, face) in env.faces().iter().enumerate() {
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: i as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            face,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(face_size * 4),
                rows_per_image: Some(face_size),
            },
            wgpu::Extent3d {
                width: face_size,
                height: face_size,
                depth_or_array_layers: 1,
            },
        );
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    (view, present)
}

fn create_frame_targets(
    ctx: &GpuContext,
    pipeline: &WarpPipeline,
    width: u32,
    height: u32,
) -> FrameTargets {
    let device = &ctx.device;
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let source_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("warp-source"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FRAME_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let output_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("warp-output"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FRAME_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = (width * 4).div_ceil(align) * align;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("warp-readback"),
        size: u64::from(padded_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let bind_group = create_bind_group(ctx, pipeline, &source_texture);

    FrameTargets {
        width,
        height,
        padded_row,
        source_texture,
        output_texture,
        output_view,
        readback,
        bind_group,
    }
}

fn create_bind_group(
    ctx: &GpuContext,
    pipeline: &WarpPipeline,
    source_texture: &wgpu::Texture,
) -> wgpu::BindGroup {
    let source_view = source_texture.create_view(&wgpu::TextureViewDescriptor::default());
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("warp-bg"),
        layout: &pipeline.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: pipeline.uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&source_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&pipeline.environment_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
            },
        ],
    })
}
