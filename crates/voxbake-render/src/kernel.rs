//! Compute pipeline for the accumulation kernel.

use glam::UVec3;
use voxbake_core::{validate_work_group_size, KernelUniforms};

use crate::buffer::create_uniform_buffer;
use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderBuilder;

/// Compiled accumulation kernel and its per-dispatch resources.
pub struct AccumulationKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    // Bound in place of a capture during the clear pass.
    placeholder: wgpu::Texture,
    placeholder_view: wgpu::TextureView,
    work_group_size: UVec3,
}

impl AccumulationKernel {
    /// Compiles the kernel for `work_group_size`.
    pub fn new(device: &wgpu::Device, work_group_size: UVec3) -> RenderResult<Self> {
        validate_work_group_size(work_group_size)
            .map_err(|err| RenderError::ShaderCompilationFailed(err.to_string()))?;
        let limits = device.limits();
        let invocations = work_group_size.x * work_group_size.y * work_group_size.z;
        if invocations > limits.max_compute_invocations_per_workgroup {
            return Err(RenderError::ExceedsLimit {
                kind: "work group",
                size: work_group_size.to_array(),
                limit: u64::from(limits.max_compute_invocations_per_workgroup),
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accumulate Bind Group Layout"),
            entries: &[
                // Kernel parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Volume
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Capture
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let shader = ShaderBuilder::new()
            .with_source(include_str!("shaders/accumulate.wgsl"))
            .define("WG_X", work_group_size.x)
            .define("WG_Y", work_group_size.y)
            .define("WG_Z", work_group_size.z)
            .with_label("Accumulate Shader")
            .build_module(device)?;

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Accumulate Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Accumulate Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilationFailed(err.to_string()));
        }

        let uniform_buffer = create_uniform_buffer(
            device,
            &KernelUniforms::clear(UVec3::ONE),
            Some("Accumulate Uniform Buffer"),
        );

        let placeholder = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Accumulate Placeholder Capture"),
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
        });
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("compiled accumulation kernel with work group {work_group_size}");

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            placeholder,
            placeholder_view,
            work_group_size,
        })
    }

    pub fn work_group_size(&self) -> UVec3 {
        self.work_group_size
    }

    /// Records and submits one dispatch of `groups` work groups.
    ///
    /// `capture` is `None` for the clear pass.
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        volume: &wgpu::Buffer,
        capture: Option<&wgpu::TextureView>,
        uniforms: &KernelUniforms,
        groups: UVec3,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Accumulate Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: volume.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        capture.unwrap_or(&self.placeholder_view),
                    ),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Accumulate Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Accumulate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
}

impl Drop for AccumulationKernel {
    fn drop(&mut self) {
        self.placeholder.destroy();
    }
}
