//! wgpu implementation of [`RenderBackend`].
//!
//! Provides [`GpuContext`] for headless device creation and [`WgpuBackend`],
//! which records every blit as a full-screen-triangle render pass into one
//! command encoder. Encoder order is what guarantees each stage sees the
//! previous stage's output.

use std::collections::{HashMap, HashSet};

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::backend::RenderBackend;
use crate::error::PassError;
use crate::frustum::CORNER_PARAMETER_NAMES;
use crate::params::ShaderParameters;
use crate::pool::TemporaryPool;
use crate::shader::{FRAGMENT_ENTRY, ProgramSource, VERTEX_ENTRY};
use crate::target::{BufferDesc, FilterMode};

/// Error type for GPU device initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum GpuContextError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Owns a headless wgpu device and queue.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Initialize a device without a surface.
    pub async fn new_headless() -> Result<Self, GpuContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(GpuContextError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("obra-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// Initialize a headless GPU context synchronously using `pollster`.
pub fn init_headless_blocking() -> Result<GpuContext, GpuContextError> {
    pollster::block_on(GpuContext::new_headless())
}

/// GPU uniform carrying the four frustum corner parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CornerUniform {
    pub bl: [f32; 4],
    pub tl: [f32; 4],
    pub tr: [f32; 4],
    pub br: [f32; 4],
}

impl CornerUniform {
    /// Pack `_BL`, `_TL`, `_TR`, `_BR`; absent names upload as zero.
    pub fn from_params(params: &ShaderParameters) -> Self {
        let [bl, tl, tr, br] = CORNER_PARAMETER_NAMES
            .map(|name| params.vector(name).unwrap_or(Vec4::ZERO).to_array());
        Self { bl, tl, tr, br }
    }
}

/// A compiled WGSL filter program.
pub struct WgslProgram {
    id: u64,
    name: String,
    module: wgpu::ShaderModule,
}

impl WgslProgram {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A texture usable as blit source and destination.
#[derive(Debug)]
pub struct GpuTexture {
    id: u64,
    label: &'static str,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    filter: FilterMode,
    /// Set for pooled temporaries.
    desc: Option<BufferDesc>,
}

impl GpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn desc(&self) -> Option<&BufferDesc> {
        self.desc.as_ref()
    }
}

/// wgpu-backed [`RenderBackend`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    params_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler_linear: wgpu::Sampler,
    sampler_nearest: wgpu::Sampler,
    copy_program: WgslProgram,
    pipelines: HashMap<(u64, wgpu::TextureFormat), wgpu::RenderPipeline>,
    pool: TemporaryPool<(wgpu::Texture, wgpu::TextureView)>,
    written: HashSet<u64>,
    encoder: Option<wgpu::CommandEncoder>,
    open_scopes: usize,
    next_id: u64,
}

impl WgpuBackend {
    /// Create a backend with an unbounded temporary pool.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self::with_pool(device, queue, TemporaryPool::new())
    }

    /// Create a backend whose temporary pool refuses to grow past `bytes`.
    pub fn with_budget(device: wgpu::Device, queue: wgpu::Queue, bytes: u64) -> Self {
        Self::with_pool(device, queue, TemporaryPool::with_budget(bytes))
    }

    fn with_pool(
        device: wgpu::Device,
        queue: wgpu::Queue,
        pool: TemporaryPool<(wgpu::Texture, wgpu::TextureView)>,
    ) -> Self {
        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("obra-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<CornerUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("obra-source-bgl"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("obra-blit-layout"),
            bind_group_layouts: &[&params_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let sampler_linear = create_sampler(&device, FilterMode::Bilinear);
        let sampler_nearest = create_sampler(&device, FilterMode::Point);

        let copy_program = compile(&device, 0, &ProgramSource::copy());

        Self {
            device,
            queue,
            params_bgl,
            texture_bgl,
            pipeline_layout,
            sampler_linear,
            sampler_nearest,
            copy_program,
            pipelines: HashMap::new(),
            pool,
            written: HashSet::new(),
            encoder: None,
            open_scopes: 0,
            next_id: 1,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Compile a filter program.
    pub fn create_program(&mut self, source: &ProgramSource) -> WgslProgram {
        let id = self.take_id();
        compile(&self.device, id, source)
    }

    /// Load and compile a filter program from a `.wgsl` file.
    pub fn load_program(&mut self, path: &std::path::Path) -> Result<WgslProgram, PassError> {
        let source = ProgramSource::from_file(path)?;
        Ok(self.create_program(&source))
    }

    /// Wrap a host-owned texture (e.g. a camera color target).
    ///
    /// The texture needs `RENDER_ATTACHMENT | TEXTURE_BINDING` usage.
    pub fn wrap_target(&mut self, texture: wgpu::Texture, filter: FilterMode) -> GpuTexture {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            id: self.take_id(),
            label: "camera-color",
            texture,
            view,
            filter,
            desc: None,
        }
    }

    /// Upload an image into a new host-owned `Rgba8Unorm` target.
    pub fn create_target_from_image(&mut self, image: &RgbaImage, filter: FilterMode) -> GpuTexture {
        let (width, height) = image.dimensions();
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera-color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if width > 0 && height > 0 {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: None,
                },
                size,
            );
        }
        self.wrap_target(texture, filter)
    }

    /// Overwrite a host-owned `Rgba8Unorm` target with `image`.
    ///
    /// Pending commands are submitted first so earlier blits read the old
    /// contents. Returns `false` for temporaries and size mismatches.
    pub fn write_target(&mut self, target: &GpuTexture, image: &RgbaImage) -> bool {
        let (width, height) = image.dimensions();
        if target.desc.is_some()
            || target.texture.width() != width
            || target.texture.height() != height
        {
            return false;
        }
        self.submit();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: None,
            },
            target.texture.size(),
        );
        true
    }

    /// Submit recorded commands. Returns `false` if nothing was recorded.
    pub fn submit(&mut self) -> bool {
        if self.open_scopes > 0 {
            log::warn!("Submitting with {} open profiling scope(s)", self.open_scopes);
        }
        match self.encoder.take() {
            Some(encoder) => {
                self.queue.submit([encoder.finish()]);
                true
            }
            None => false,
        }
    }

    /// Submit pending work and read a 4-byte-per-texel target back to the CPU.
    ///
    /// The texture needs `COPY_SRC` usage. Returns `None` if mapping fails.
    pub fn read_target(&mut self, target: &GpuTexture) -> Option<RgbaImage> {
        let texture = &target.texture;
        let (w, h) = (texture.width(), texture.height());
        let unpadded = w * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("obra-readback"),
            size: u64::from(padded * h),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let encoder = self.encoder_mut();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(h),
                },
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        self.submit();

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        if !matches!(rx.recv(), Ok(Ok(()))) {
            log::error!("Failed to map readback buffer");
            return None;
        }

        let is_bgra = matches!(
            texture.format(),
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((w * h * 4) as usize);
        for row in 0..h {
            let start = (row * padded) as usize;
            let row_data = &mapped[start..start + unpadded as usize];
            if is_bgra {
                for chunk in row_data.chunks_exact(4) {
                    pixels.extend_from_slice(&[chunk[2], chunk[1], chunk[0], chunk[3]]);
                }
            } else {
                pixels.extend_from_slice(row_data);
            }
        }
        drop(mapped);
        buffer.unmap();

        RgbaImage::from_raw(w, h, pixels)
    }

    /// Temporaries currently handed out.
    pub fn outstanding_temporaries(&self) -> usize {
        self.pool.outstanding()
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("obra-encoder"),
            })
        })
    }
}

impl RenderBackend for WgpuBackend {
    type Texture = GpuTexture;
    type Program = WgslProgram;

    fn allocate_temporary(&mut self, desc: &BufferDesc) -> Result<GpuTexture, PassError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(PassError::ResourceAllocation {
                width: desc.width,
                height: desc.height,
                reason: format!("outside device texture limits (1..={max})"),
            });
        }

        let device = &self.device;
        let (texture, view) = self.pool.acquire(desc, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format.to_wgpu(),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            Ok((texture, view))
        })?;

        let id = self.take_id();
        Ok(GpuTexture {
            id,
            label: desc.label,
            texture,
            view,
            filter: desc.filter,
            desc: Some(*desc),
        })
    }

    fn release_temporary(&mut self, texture: GpuTexture) {
        let GpuTexture {
            id,
            label,
            texture,
            view,
            desc,
            ..
        } = texture;
        self.written.remove(&id);
        match desc {
            Some(desc) => self.pool.release(&desc, (texture, view)),
            None => log::warn!("Ignoring release of host-owned {label}"),
        }
    }

    fn blit(
        &mut self,
        source: &GpuTexture,
        destination: &GpuTexture,
        program: Option<&WgslProgram>,
        params: &ShaderParameters,
    ) -> Result<(), PassError> {
        if source.id == destination.id {
            return Err(PassError::OrderingViolation(format!(
                "{} is both source and destination",
                source.label
            )));
        }
        if source.desc.is_some() && !self.written.contains(&source.id) {
            return Err(PassError::OrderingViolation(format!(
                "{} read before any stage wrote it",
                source.label
            )));
        }

        let program = program.unwrap_or(&self.copy_program);
        let format = destination.texture.format();
        let pipeline = self
            .pipelines
            .entry((program.id, format))
            .or_insert_with(|| {
                create_fullscreen_pipeline(
                    &self.device,
                    &self.pipeline_layout,
                    &program.module,
                    format,
                    &program.name,
                )
            });

        let uniform = CornerUniform::from_params(params);
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("obra-params"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let params_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("obra-params-bg"),
            layout: &self.params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let sampler = match source.filter {
            FilterMode::Bilinear => &self.sampler_linear,
            FilterMode::Point => &self.sampler_nearest,
        };
        let source_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("obra-source-bg"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("obra-encoder"),
            })
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.name.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &destination.view,
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
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &params_bind_group, &[]);
            pass.set_bind_group(1, &source_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        log::trace!(
            "Blit {} -> {} ({})",
            source.label,
            destination.label,
            program.name
        );
        self.written.insert(destination.id);
        Ok(())
    }

    fn begin_profiling_scope(&mut self, label: &str) {
        self.encoder_mut().push_debug_group(label);
        self.open_scopes += 1;
    }

    fn end_profiling_scope(&mut self) {
        if self.open_scopes == 0 {
            log::warn!("end_profiling_scope without a matching begin");
            return;
        }
        self.open_scopes -= 1;
        self.encoder_mut().pop_debug_group();
    }
}

fn create_sampler(device: &wgpu::Device, filter: FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("obra-sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter.to_wgpu(),
        min_filter: filter.to_wgpu(),
        ..Default::default()
    })
}

fn compile(device: &wgpu::Device, id: u64, source: &ProgramSource) -> WgslProgram {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.name()),
        source: wgpu::ShaderSource::Wgsl(source.compose().into()),
    });
    log::info!("Compiled program '{}'", source.name());
    WgslProgram {
        id,
        name: source.name().to_string(),
        module,
    }
}

/// Create a full-screen render pipeline for `module`'s `fs_main`.
fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    target_format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(VERTEX_ENTRY),
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
            module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}
