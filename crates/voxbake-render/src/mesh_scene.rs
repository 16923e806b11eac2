//! Triangle-mesh scene rasterized into capture targets.

use glam::{UVec2, Vec3, Vec4};
use voxbake_core::{CaptureError, CapturePose, SceneCapture};

use crate::backend::{GpuBackend, GpuCaptureBuffer};
use crate::buffer::{create_index_buffer, create_position_buffer, create_uniform_buffer};
use crate::engine::RenderEngine;
use crate::error::{RenderError, RenderResult};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Uniforms for one mesh draw.
/// Note: Layout must match WGSL CaptureUniforms exactly (128 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CaptureUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Rig position (xyz).
    pub origin: [f32; 4],
    /// Viewing direction (xyz).
    pub forward: [f32; 4],
    /// Near plane, far plane, boundary margin, unused.
    pub slab: [f32; 4],
}

impl CaptureUniforms {
    pub fn new(pose: &CapturePose, color: Vec4) -> Self {
        Self {
            view_proj: pose.boundary_view_projection_matrix().to_cols_array_2d(),
            color: color.to_array(),
            origin: pose.position.extend(0.0).to_array(),
            forward: pose.forward.extend(0.0).to_array(),
            slab: [pose.near, pose.far, pose.boundary_margin(), 0.0],
        }
    }
}

/// A flat-colored triangle mesh in world space.
#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub color: Vec4,
}

struct MeshRenderData {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_indices: u32,
}

struct ScenePipeline {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

struct DepthTarget {
    size: UVec2,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Meshes rendered with a flat color per mesh and alpha as coverage.
///
/// Faces are drawn from both sides. A face lying on a slab boundary is kept
/// only by the slab on its inner side, which is found from the winding:
/// triangles must be counter-clockwise seen from outside, as
/// [`MeshScene::add_box`] emits them. GPU resources are created on the
/// first capture and reused across slices.
#[derive(Default)]
pub struct MeshScene {
    meshes: Vec<SceneMesh>,
    pipeline: Option<ScenePipeline>,
    render_data: Vec<MeshRenderData>,
    depth: Option<DepthTarget>,
}

impl MeshScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mesh. Fails if a triangle references a missing vertex.
    pub fn add_mesh(
        &mut self,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        color: Vec4,
    ) -> RenderResult<&mut Self> {
        if let Some(index) = triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertices.len())
        {
            return Err(RenderError::InvalidGeometry(format!(
                "index {index} out of range for {} vertices",
                vertices.len()
            )));
        }
        self.meshes.push(SceneMesh {
            vertices,
            triangles,
            color,
        });
        Ok(self)
    }

    /// Adds an axis-aligned box as 12 triangles.
    pub fn add_box(&mut self, center: Vec3, half_extent: Vec3, color: Vec4) -> &mut Self {
        let (vertices, triangles) = box_geometry(center, half_extent);
        self.meshes.push(SceneMesh {
            vertices,
            triangles,
            color,
        });
        self
    }

    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    /// World-space bounds of all vertices, or `None` for an empty scene.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.meshes
            .iter()
            .flat_map(|mesh| mesh.vertices.iter().copied())
            .fold(None, |bounds, v| match bounds {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            })
    }

    /// Clears `target` to transparent and draws every mesh seen from `pose`.
    pub fn render(
        &mut self,
        engine: &RenderEngine,
        pose: &CapturePose,
        target: &GpuCaptureBuffer,
    ) -> RenderResult<()> {
        let device = &engine.device;
        self.prepare(device, target.texture().format());
        self.ensure_depth(device, target.size());

        for (mesh, data) in self.meshes.iter().zip(&self.render_data) {
            let uniforms = CaptureUniforms::new(pose, mesh.color);
            engine
                .queue
                .write_buffer(&data.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let (Some(pipeline), Some(depth)) = (&self.pipeline, &self.depth) else {
            return Err(RenderError::AllocationFailed("scene resources missing".into()));
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Capture Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Capture Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&pipeline.pipeline);
            for data in self.render_data.iter().filter(|d| d.num_indices > 0) {
                pass.set_bind_group(0, &data.bind_group, &[]);
                pass.set_vertex_buffer(0, data.vertex_buffer.slice(..));
                pass.set_index_buffer(data.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..data.num_indices, 0, 0..1);
            }
        }
        engine.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn prepare(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipeline.as_ref().is_none_or(|p| p.format != format) {
            self.pipeline = Some(create_pipeline(device, format));
            self.render_data.clear();
        }
        let Some(pipeline) = &self.pipeline else {
            return;
        };

        for mesh in &self.meshes[self.render_data.len()..] {
            let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.to_array()).collect();
            let vertex_buffer = create_position_buffer(device, &positions, Some("Scene Vertex Buffer"));
            let index_buffer = create_index_buffer(device, &mesh.triangles, Some("Scene Index Buffer"));
            let uniform_buffer = create_uniform_buffer(
                device,
                &CaptureUniforms {
                    color: mesh.color.to_array(),
                    ..bytemuck::Zeroable::zeroed()
                },
                Some("Scene Uniform Buffer"),
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Scene Bind Group"),
                layout: &pipeline.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            self.render_data.push(MeshRenderData {
                vertex_buffer,
                index_buffer,
                uniform_buffer,
                bind_group,
                num_indices: (mesh.triangles.len() * 3) as u32,
            });
        }
    }

    fn ensure_depth(&mut self, device: &wgpu::Device, size: UVec2) {
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }
        if let Some(old) = self.depth.take() {
            old.texture.destroy();
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Texture"),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(DepthTarget {
            size,
            texture,
            view,
        });
    }
}

impl Drop for MeshScene {
    fn drop(&mut self) {
        if let Some(depth) = self.depth.take() {
            depth.texture.destroy();
        }
    }
}

impl<'a> SceneCapture<GpuBackend<'a>> for MeshScene {
    fn capture(
        &mut self,
        backend: &mut GpuBackend<'a>,
        pose: &CapturePose,
        target: &mut GpuCaptureBuffer,
    ) -> Result<(), CaptureError> {
        self.render(backend.engine(), pose, target)
            .map_err(|err| CaptureError::new(err.to_string()))
    }
}

fn create_pipeline(device: &wgpu::Device, format: wgpu::TextureFormat) -> ScenePipeline {
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene Bind Group Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scene Capture Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh_capture.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Capture Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Capture Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
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
        cache: None,
    });

    ScenePipeline {
        format,
        pipeline,
        bind_group_layout,
    }
}

/// Vertices and triangles of an axis-aligned box.
fn box_geometry(center: Vec3, half_extent: Vec3) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let vertices = (0..8)
        .map(|i| {
            let sign = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            center + sign * half_extent
        })
        .collect();
    let triangles = vec![
        // -X, +X
        [0, 4, 6],
        [0, 6, 2],
        [1, 3, 7],
        [1, 7, 5],
        // -Y, +Y
        [0, 1, 5],
        [0, 5, 4],
        [2, 6, 7],
        [2, 7, 3],
        // -Z, +Z
        [0, 2, 3],
        [0, 3, 1],
        [4, 5, 7],
        [4, 7, 6],
    ];
    (vertices, triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<CaptureUniforms>(), 128);
    }

    #[test]
    fn test_uniforms_carry_slab() {
        let pose = CapturePose {
            position: Vec3::new(1.0, 2.0, 3.0),
            forward: Vec3::NEG_X,
            up: Vec3::Y,
            half_size: glam::Vec2::splat(2.0),
            near: 0.0,
            far: 0.5,
        };
        let uniforms = CaptureUniforms::new(&pose, Vec4::ONE);
        assert_eq!(uniforms.origin, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(uniforms.forward, [-1.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniforms.slab[..2], [0.0, 0.5]);
        assert!(uniforms.slab[2] > 0.0);
    }

    /// Triangles must wind counter-clockwise seen from outside so the
    /// capture shader can tell which side of a boundary a face belongs to.
    #[test]
    fn test_box_faces_wind_outward() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let (vertices, triangles) = box_geometry(center, Vec3::splat(0.5));
        for tri in &triangles {
            let [a, b, c] = tri.map(|i| vertices[i as usize]);
            let normal = (b - a).cross(c - a);
            assert!(normal.dot((a + b + c) / 3.0 - center) > 0.0, "{tri:?}");
        }
    }

    #[test]
    fn test_box_geometry_faces_lie_on_box() {
        let (vertices, triangles) = box_geometry(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(0.5));
        assert_eq!(vertices.len(), 8);
        assert_eq!(triangles.len(), 12);
        for tri in &triangles {
            let [a, b, c] = tri.map(|i| vertices[i as usize]);
            // Each face is axis aligned: one coordinate is shared by all corners.
            let shared = (0..3).filter(|&k| a[k] == b[k] && b[k] == c[k]).count();
            assert_eq!(shared, 1, "{tri:?}");
        }
    }

    #[test]
    fn test_add_mesh_rejects_bad_indices() {
        let mut scene = MeshScene::new();
        let err = scene
            .add_mesh(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 3]], Vec4::ONE)
            .err()
            .unwrap();
        assert!(err.to_string().contains("index 3"));
        assert!(scene.meshes().is_empty());
    }

    #[test]
    fn test_bounding_box() {
        let mut scene = MeshScene::new();
        assert!(scene.bounding_box().is_none());
        scene
            .add_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE)
            .add_box(Vec3::new(3.0, 0.0, 0.0), Vec3::splat(0.5), Vec4::ONE);
        let (min, max) = scene.bounding_box().unwrap();
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::new(3.5, 1.0, 1.0));
    }
}
