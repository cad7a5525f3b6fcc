use crate::resources::{
    DEPTH_FORMAT, FrameUniforms, ObjectUniforms, Vertex, aligned, cube_format, cull_mode,
    image_bytes, pack_vertices,
};
use crate::shaders;
use prism_common::{MeshHandle, PixelFormat, TextureHandle, ViewportSize};
use prism_render::{CubeCamera, CubeFace, CubeTexture, PerspectiveCamera, RenderBackend, RenderError};
use prism_scene::{Background, ImageData, MeshData, SceneGraph, Side};
use std::collections::HashMap;
use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

/// Captures write one frame slot per cube face.
const FRAME_SLOTS: u64 = 6;

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct GpuCube {
    _texture: wgpu::Texture,
    cube_view: wgpu::TextureView,
    face_views: Vec<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

/// One mesh instance ready to draw.
struct DrawItem {
    mesh: MeshHandle,
    texture: Option<TextureHandle>,
    side: Side,
    mirrored: bool,
    offset: u32,
}

/// How a pass fills uncovered pixels.
#[derive(Clone, Copy)]
enum Clear {
    Color(wgpu::Color),
    Sky,
}

struct PassTarget<'a> {
    color: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
    format: wgpu::TextureFormat,
    mirrored_view: bool,
}

/// wgpu implementation of [`RenderBackend`] drawing into a window surface.
///
/// `render` acquires the next surface frame and leaves it open so overlays
/// can draw on top through [`WgpuBackend::frame_view`]; [`WgpuBackend::present`]
/// hands it to the compositor.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    frame: Option<wgpu::SurfaceTexture>,
    depth_view: wgpu::TextureView,
    size: ViewportSize,
    exposure: f32,

    frame_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    mesh_pipeline_layout: wgpu::PipelineLayout,
    sky_pipeline_layout: wgpu::PipelineLayout,
    mesh_shader: wgpu::ShaderModule,
    sky_shader: wgpu::ShaderModule,
    mesh_pipelines: HashMap<(wgpu::TextureFormat, Option<wgpu::Face>), wgpu::RenderPipeline>,
    sky_pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,

    frame_buffer: wgpu::Buffer,
    frame_stride: u64,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_stride: u64,
    object_capacity: u64,

    sampler: wgpu::Sampler,
    default_material: wgpu::BindGroup,
    default_environment: wgpu::TextureView,

    meshes: HashMap<MeshHandle, GpuMesh>,
    textures: HashMap<TextureHandle, GpuTexture>,
    cubes: HashMap<TextureHandle, GpuCube>,
    next_id: u64,
    max_dimension: u32,
    float_targets: bool,
}

impl WgpuBackend {
    /// Pick an adapter for `surface`, open a device and configure the surface.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        size: ViewportSize,
    ) -> Result<Self, RenderError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Surface("no compatible GPU adapter".into()))?;

        let info = adapter.get_info();
        tracing::info!(name = %info.name, backend = ?info.backend, "selected GPU adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("prism_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        let size = size.clamped();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let float_targets = adapter
            .get_texture_format_features(wgpu::TextureFormat::Rgba16Float)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING);

        Ok(Self::with_device(device, queue, surface, config, float_targets))
    }

    fn with_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        float_targets: bool,
    ) -> Self {
        let limits = device.limits();
        let alignment = limits.min_uniform_buffer_offset_alignment as u64;
        let frame_size = std::mem::size_of::<FrameUniforms>() as u64;
        let object_size = std::mem::size_of::<ObjectUniforms>() as u64;
        let frame_stride = aligned(frame_size, alignment);
        let object_stride = aligned(object_size, alignment);

        let uniform_entry = |size: u64| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(size),
            },
            count: None,
        };
        let texture_entry = |binding: u32, view_dimension: wgpu::TextureViewDimension| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                uniform_entry(frame_size),
                texture_entry(1, wgpu::TextureViewDimension::Cube),
                sampler_entry(2),
            ],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object_bind_group_layout"),
            entries: &[uniform_entry(object_size)],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[texture_entry(0, wgpu::TextureViewDimension::D2), sampler_entry(1)],
        });

        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &object_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let sky_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky_pipeline_layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::mesh_source().into()),
        });
        let sky_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sky_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::sky_source().into()),
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniform_buffer"),
            size: frame_stride * FRAME_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_capacity = 64;
        let (object_buffer, object_bind_group) =
            create_object_buffer(&device, &object_layout, object_stride, object_capacity);

        // Equirect images wrap horizontally and clamp at the poles.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("default_white"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255; 4],
        );
        let default_material = create_material_bind_group(
            &device,
            &material_layout,
            &white.create_view(&Default::default()),
            &sampler,
        );

        let black_cube = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("default_environment"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 6,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[0; 24],
        );
        let default_environment = black_cube.create_view(&wgpu::TextureViewDescriptor {
            label: Some("default_environment_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let size = ViewportSize::new(config.width, config.height);
        let depth_view = create_depth_view(&device, size.width, size.height, 1);

        Self {
            max_dimension: limits.max_texture_dimension_2d,
            device,
            queue,
            surface,
            config,
            frame: None,
            depth_view,
            size,
            exposure: 1.0,
            frame_layout,
            object_layout,
            material_layout,
            mesh_pipeline_layout,
            sky_pipeline_layout,
            mesh_shader,
            sky_shader,
            mesh_pipelines: HashMap::new(),
            sky_pipelines: HashMap::new(),
            frame_buffer,
            frame_stride,
            object_buffer,
            object_bind_group,
            object_stride,
            object_capacity,
            sampler,
            default_material,
            default_environment,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            cubes: HashMap::new(),
            next_id: 1,
            float_targets,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// View of the frame acquired by the last `render`, if still open.
    pub fn frame_view(&self) -> Option<wgpu::TextureView> {
        self.frame
            .as_ref()
            .map(|frame| frame.texture.create_view(&Default::default()))
    }

    /// Present the open frame, if any.
    pub fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn acquire(&mut self) -> Option<wgpu::TextureView> {
        if self.frame.is_none() {
            match self.surface.get_current_texture() {
                Ok(frame) => self.frame = Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    tracing::debug!("surface lost or outdated, reconfiguring");
                    self.surface.configure(&self.device, &self.config);
                    return None;
                }
                Err(e) => {
                    tracing::error!("surface error: {e}");
                    return None;
                }
            }
        }
        self.frame_view()
    }

    /// Write per-instance uniforms for every visible mesh the backend knows.
    fn prepare_objects(&mut self, scene: &SceneGraph) -> Vec<DrawItem> {
        let instances = scene.meshes();
        let mut items = Vec::with_capacity(instances.len());
        let mut bytes = Vec::new();
        for instance in &instances {
            if !self.meshes.contains_key(&instance.mesh) {
                tracing::warn!(mesh = ?instance.mesh, "skipping mesh that was never uploaded");
                continue;
            }
            let uniforms = ObjectUniforms::new(instance.world, instance.material);
            let offset = bytes.len() as u64;
            bytes.extend_from_slice(bytemuck::bytes_of(&uniforms));
            bytes.resize((offset + self.object_stride) as usize, 0);
            items.push(DrawItem {
                mesh: instance.mesh,
                texture: instance.material.base_color_texture,
                side: instance.material.side,
                mirrored: instance.world.determinant() < 0.0,
                offset: offset as u32,
            });
        }

        let needed = items.len() as u64;
        if needed > self.object_capacity {
            let capacity = needed.next_power_of_two();
            tracing::debug!(capacity, "growing object uniform buffer");
            let (buffer, bind_group) =
                create_object_buffer(&self.device, &self.object_layout, self.object_stride, capacity);
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
            self.object_capacity = capacity;
        }
        if !bytes.is_empty() {
            self.queue.write_buffer(&self.object_buffer, 0, &bytes);
        }
        items
    }

    fn write_frame(&self, slot: u64, uniforms: &FrameUniforms) -> u32 {
        let offset = slot * self.frame_stride;
        self.queue
            .write_buffer(&self.frame_buffer, offset, bytemuck::bytes_of(uniforms));
        offset as u32
    }

    fn frame_bind_group(&self, environment: Option<TextureHandle>) -> wgpu::BindGroup {
        let env_view = environment
            .and_then(|handle| self.cubes.get(&handle))
            .map(|cube| &cube.cube_view)
            .unwrap_or(&self.default_environment);
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.frame_buffer,
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<FrameUniforms>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(env_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn ensure_pipelines(
        &mut self,
        format: wgpu::TextureFormat,
        items: &[DrawItem],
        mirrored_view: bool,
        clear: Clear,
    ) {
        for item in items {
            let key = (format, cull_mode(item.side, mirrored_view != item.mirrored));
            if !self.mesh_pipelines.contains_key(&key) {
                let pipeline = self.create_mesh_pipeline(key.0, key.1);
                self.mesh_pipelines.insert(key, pipeline);
            }
        }
        if matches!(clear, Clear::Sky) && !self.sky_pipelines.contains_key(&format) {
            let pipeline = self.create_sky_pipeline(format);
            self.sky_pipelines.insert(format, pipeline);
        }
    }

    fn create_mesh_pipeline(
        &self,
        format: wgpu::TextureFormat,
        cull_mode: Option<wgpu::Face>,
    ) -> wgpu::RenderPipeline {
        tracing::debug!(?format, ?cull_mode, "creating mesh pipeline");
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mesh_pipeline"),
                layout: Some(&self.mesh_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.mesh_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.mesh_shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
    }

    fn create_sky_pipeline(&self, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("sky_pipeline"),
                layout: Some(&self.sky_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.sky_shader,
                    entry_point: Some("vs_sky"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.sky_shader,
                    entry_point: Some("fs_sky"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &PassTarget<'_>,
        frame_offset: u32,
        frame_group: &wgpu::BindGroup,
        items: &[DrawItem],
        clear: Clear,
    ) {
        let load = match clear {
            Clear::Color(color) => wgpu::LoadOp::Clear(color),
            Clear::Sky => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        if let (Clear::Sky, Some(sky)) = (clear, self.sky_pipelines.get(&target.format)) {
            pass.set_pipeline(sky);
            pass.set_bind_group(0, frame_group, &[frame_offset]);
            pass.draw(0..3, 0..1);
        }

        for item in items {
            let key = (
                target.format,
                cull_mode(item.side, target.mirrored_view != item.mirrored),
            );
            let (Some(pipeline), Some(mesh)) =
                (self.mesh_pipelines.get(&key), self.meshes.get(&item.mesh))
            else {
                continue;
            };
            if mesh.index_count == 0 {
                continue;
            }
            let material = item
                .texture
                .and_then(|handle| self.textures.get(&handle))
                .map(|texture| &texture.bind_group)
                .unwrap_or(&self.default_material);

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, frame_group, &[frame_offset]);
            pass.set_bind_group(1, &self.object_bind_group, &[item.offset]);
            pass.set_bind_group(2, material, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn allocation_error(resolution: u32, format: PixelFormat, reason: String) -> RenderError {
        RenderError::ResourceAllocation {
            resolution,
            format,
            reason,
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        mesh.validate()
            .map_err(|e| RenderError::MeshUpload(e.to_string()))?;
        let vertices = pack_vertices(mesh);
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertex_buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let handle = MeshHandle(self.allocate_id());
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
            },
        );
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError> {
        if image.width == 0 || image.height == 0 {
            return Err(RenderError::TextureUpload(format!(
                "empty image {}x{}",
                image.width, image.height
            )));
        }
        if image.width > self.max_dimension || image.height > self.max_dimension {
            return Err(RenderError::TextureUpload(format!(
                "{}x{} exceeds device limit of {}",
                image.width, image.height, self.max_dimension
            )));
        }

        let (format, bytes) = image_bytes(image);
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("image_texture"),
                size: wgpu::Extent3d {
                    width: image.width,
                    height: image.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &bytes,
        );
        let bind_group = create_material_bind_group(
            &self.device,
            &self.material_layout,
            &texture.create_view(&Default::default()),
            &self.sampler,
        );
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            GpuTexture {
                _texture: texture,
                bind_group,
            },
        );
        tracing::debug!(?handle, width = image.width, height = image.height, ?format, "uploaded texture");
        Ok(handle)
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            tracing::debug!(?handle, "released texture");
        }
    }

    fn create_cube_target(
        &mut self,
        resolution: u32,
        format: PixelFormat,
    ) -> Result<CubeTexture, RenderError> {
        if resolution == 0 {
            return Err(Self::allocation_error(
                resolution,
                format,
                "resolution must be positive".into(),
            ));
        }
        if resolution > self.max_dimension {
            return Err(Self::allocation_error(
                resolution,
                format,
                format!("exceeds device limit of {}", self.max_dimension),
            ));
        }
        if format == PixelFormat::Float && !self.float_targets {
            return Err(Self::allocation_error(
                resolution,
                format,
                "floating-point render targets are not supported".into(),
            ));
        }

        let texture_format = cube_format(format);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cube_target"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_view = create_depth_view(&self.device, resolution, resolution, 1);
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let invalid = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = out_of_memory.or(invalid) {
            return Err(Self::allocation_error(resolution, format, error.to_string()));
        }

        let cube_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube_target_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        let face_views = CubeFace::ALL
            .iter()
            .map(|face| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(face.label()),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face.layer(),
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let handle = TextureHandle(self.allocate_id());
        self.cubes.insert(
            handle,
            GpuCube {
                _texture: texture,
                cube_view,
                face_views,
                depth_view,
                format: texture_format,
            },
        );
        tracing::info!(?handle, resolution, %format, "allocated cube target");
        Ok(CubeTexture {
            handle,
            resolution,
            format,
        })
    }

    fn set_size(&mut self, size: ViewportSize) {
        let size = size.clamped();
        self.size = size;
        self.config.width = size.width;
        self.config.height = size.height;
        // A frame acquired at the old size cannot outlive the reconfigure.
        self.frame = None;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, size.width, size.height, 1);
    }

    fn size(&self) -> ViewportSize {
        self.size
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) {
        let Some(view) = self.acquire() else {
            return;
        };
        let items = self.prepare_objects(scene);
        let environment = scene
            .environment()
            .filter(|handle| self.cubes.contains_key(handle));
        let uniforms = FrameUniforms::new(
            camera.view_projection(),
            camera.position,
            &scene.lights(),
            self.exposure,
            environment.is_some(),
            false,
        );
        let frame_offset = self.write_frame(0, &uniforms);
        let clear = clear_for(scene.background(), environment.is_some(), self.exposure);
        let format = self.config.format;
        self.ensure_pipelines(format, &items, false, clear);

        let frame_group = self.frame_bind_group(environment);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });
        let target = PassTarget {
            color: &view,
            depth: &self.depth_view,
            format,
            mirrored_view: false,
        };
        self.encode_pass(&mut encoder, &target, frame_offset, &frame_group, &items, clear);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn capture_cube(&mut self, scene: &SceneGraph, camera: &CubeCamera, target: &CubeTexture) {
        let Some(format) = self.cubes.get(&target.handle).map(|cube| cube.format) else {
            tracing::warn!(target = ?target.handle, "capture into unknown cube target");
            return;
        };

        let items = self.prepare_objects(scene);
        // A target cannot be sampled while it is being written.
        let environment = scene
            .environment()
            .filter(|handle| *handle != target.handle && self.cubes.contains_key(handle));
        let lights = scene.lights();
        let offsets: Vec<u32> = CubeFace::ALL
            .iter()
            .map(|face| {
                let uniforms = FrameUniforms::new(
                    camera.view_projection(*face),
                    camera.position,
                    &lights,
                    1.0,
                    environment.is_some(),
                    true,
                );
                self.write_frame(face.layer() as u64, &uniforms)
            })
            .collect();
        let clear = clear_for(scene.background(), environment.is_some(), 1.0);
        self.ensure_pipelines(format, &items, true, clear);

        let Some(cube) = self.cubes.get(&target.handle) else {
            return;
        };
        let frame_group = self.frame_bind_group(environment);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture_encoder"),
            });
        for (face_view, offset) in cube.face_views.iter().zip(offsets) {
            let pass_target = PassTarget {
                color: face_view,
                depth: &cube.depth_view,
                format,
                mirrored_view: true,
            };
            self.encode_pass(&mut encoder, &pass_target, offset, &frame_group, &items, clear);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn clear_for(background: Background, has_environment: bool, exposure: f32) -> Clear {
    match background {
        Background::Color(c) => {
            let c = c * exposure;
            Clear::Color(wgpu::Color {
                r: c.x as f64,
                g: c.y as f64,
                b: c.z as f64,
                a: 1.0,
            })
        }
        Background::Environment if has_environment => Clear::Sky,
        Background::Environment => Clear::Color(wgpu::Color::BLACK),
    }
}

fn create_object_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("object_uniform_buffer"),
        size: stride * capacity,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("object_bind_group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

fn create_material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_depth_view(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    layers: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn color_background_is_exposed() {
        match clear_for(Background::Color(Vec3::new(0.5, 0.25, 0.0)), false, 2.0) {
            Clear::Color(c) => {
                assert_eq!((c.r, c.g, c.b, c.a), (1.0, 0.5, 0.0, 1.0));
            }
            Clear::Sky => panic!("expected a flat clear"),
        }
    }

    #[test]
    fn environment_background_needs_an_environment() {
        assert!(matches!(clear_for(Background::Environment, true, 1.0), Clear::Sky));
        assert!(matches!(
            clear_for(Background::Environment, false, 1.0),
            Clear::Color(c) if c == wgpu::Color::BLACK
        ));
    }
}
