/// Surfex GPU - wgpu backend for the point cloud mirror
///
/// Renders point draws into an offscreen color target with a depth buffer.
/// The `surfex --headless --gpu` run drives it; embedders that present to a
/// window copy from [`WgpuDevice::target`].
use bytemuck::bytes_of;
use log::debug;
use surfex_core::gpu::{
    BufferId, DrawPoints, GpuError, GraphicsDevice, PointShader, PointUniforms, PointVertex,
    ProgramId, FRAGMENT_ENTRY, VERTEX_ENTRY,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    programs: Vec<Option<wgpu::RenderPipeline>>,
    buffers: Vec<Option<wgpu::Buffer>>,
}

impl WgpuDevice {
    /// Acquire a device without a window surface.
    pub fn headless(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("surfex device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        Ok(Self::from_parts(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            width,
            height,
        ))
    }

    /// Wrap an existing device, rendering into a `width` x `height` target
    /// of the given format.
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let size = (width.max(1), height.max(1));
        let (target, target_view) = create_target(&device, format, size, "point target");
        let (_, depth_view) = create_target(&device, DEPTH_FORMAT, size, "point depth");

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("point uniforms layout"),
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

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point uniforms"),
            size: std::mem::size_of::<PointUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("point uniforms"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("point pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let mut surfex = Self {
            device,
            queue,
            format,
            size,
            target,
            target_view,
            depth_view,
            pipeline_layout,
            uniform_buffer,
            uniform_bind_group,
            programs: Vec::new(),
            buffers: Vec::new(),
        };
        // Depth must start at the far plane for the first frame's draws
        surfex.clear(wgpu::Color::BLACK);
        surfex
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    /// Clear color and depth before drawing a new frame.
    pub fn clear(&mut self, color: wgpu::Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(id.0 as usize).and_then(Option::as_ref)
    }
}

fn create_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

impl GraphicsDevice for WgpuDevice {
    fn create_program(&mut self, shader: &PointShader) -> Result<ProgramId, GpuError> {
        shader.validate()?;

        let attributes: Vec<wgpu::VertexAttribute> = shader
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.label),
                source: wgpu::ShaderSource::Wgsl(shader.source.into()),
            });
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(shader.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: VERTEX_ENTRY,
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: PointVertex::SIZE,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: FRAGMENT_ENTRY,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::ShaderCompilation {
                label: shader.label.to_string(),
                reason: error.to_string(),
            });
        }

        self.programs.push(Some(pipeline));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn create_vertex_buffer(&mut self, size: u64) -> BufferId {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point vertices"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        debug!("allocated {} byte vertex buffer", size);
        self.buffers.push(Some(buffer));
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn write_vertex_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        if let Some(target) = self.buffer(buffer) {
            self.queue.write_buffer(target, offset, data);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if let Some(released) = slot.take() {
                released.destroy();
            }
        }
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize) {
            *slot = None;
        }
    }

    fn draw_points(&mut self, draw: &DrawPoints) {
        let (Some(pipeline), Some(vertices)) = (
            self.programs.get(draw.program.0 as usize).and_then(Option::as_ref),
            self.buffer(draw.vertex_buffer),
        ) else {
            return;
        };

        // Each draw is its own submission, so the shared uniform buffer can
        // be rewritten in between
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytes_of(&draw.uniforms));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("point encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("point pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.draw(0..draw.vertex_count, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfex_core::gpu::{LIT_POINT_SHADER, POINT_SHADER};
    use surfex_core::{Frame, PointCloudAssembly, PointCloudMirror};

    fn device() -> Option<WgpuDevice> {
        match WgpuDevice::headless(64, 64) {
            Ok(device) => Some(device),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    #[test]
    fn test_stock_shaders_compile() {
        let Some(mut device) = device() else { return };
        device.create_program(&POINT_SHADER).unwrap();
        device.create_program(&LIT_POINT_SHADER).unwrap();
    }

    #[test]
    fn test_invalid_wgsl_is_rejected() {
        let Some(mut device) = device() else { return };
        let broken = PointShader {
            source: "fn vs_main( fn fs_main( this is not wgsl",
            ..POINT_SHADER
        };
        assert!(matches!(
            device.create_program(&broken),
            Err(GpuError::ShaderCompilation { .. })
        ));
    }

    #[test]
    fn test_mirror_grows_and_draws() {
        let Some(mut device) = device() else { return };
        let mut pca = PointCloudAssembly::new();
        let mut mirror =
            PointCloudMirror::new(&mut device, pca.point_cloud(), &LIT_POINT_SHADER).unwrap();

        let frame: Frame = (0..2000)
            .map(|i| {
                let t = i as f32 * 0.05;
                (
                    nalgebra::Point3::new(t.cos(), t.sin(), i as f32 * 1e-3),
                    nalgebra::Vector3::z(),
                )
            })
            .collect();
        pca.add_data(&frame);
        mirror.update_points(&mut device, pca.point_cloud());
        assert_eq!(mirror.count(), pca.num_points());

        device.clear(wgpu::Color::BLACK);
        mirror.draw(
            &mut device,
            &nalgebra::Matrix4::identity(),
            &nalgebra::Matrix4::identity(),
        );
        let _ = device.device.poll(wgpu::Maintain::Wait);
    }
}
