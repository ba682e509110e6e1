/// Graphics device seam and the GPU-side mirror of the point cloud
///
/// The graphics context is passed explicitly as a [`GraphicsDevice`]. Devices
/// hand out opaque [`ProgramId`] and [`BufferId`] handles, in the manner of
/// GL object names, and own the resources behind them.
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};
use thiserror::Error;

use crate::transform::Transform;

mod headless;
mod mirror;
mod shader;

pub use headless::{HeadlessDevice, ResourceStore};
pub use mirror::PointCloudMirror;
pub use shader::{
    PointShader, VertexAttribute, FRAGMENT_ENTRY, LIT_POINT_SHADER, POINT_SHADER, VERTEX_ENTRY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("shader `{label}` failed to compile: {reason}")]
    ShaderCompilation { label: String, reason: String },
    #[error("no suitable graphics adapter found")]
    NoAdapter,
    #[error("failed to acquire graphics device: {0}")]
    DeviceRequest(String),
}

/// Interleaved vertex as uploaded to vertex buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl PointVertex {
    pub const SIZE: u64 = std::mem::size_of::<PointVertex>() as u64;

    pub fn new(position: &Point3<f32>, normal: &Vector3<f32>) -> Self {
        Self {
            position: position.coords.into(),
            normal: (*normal).into(),
        }
    }
}

/// Uniform block shared by the point shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl PointUniforms {
    pub fn new(model: &Matrix4<f32>, view: &Matrix4<f32>, projection: &Matrix4<f32>) -> Self {
        Self {
            model: Transform::to_columns(model),
            view: Transform::to_columns(view),
            projection: Transform::to_columns(projection),
        }
    }

    pub fn mvp(&self) -> Matrix4<f32> {
        let m = |c: &[[f32; 4]; 4]| Matrix4::from(*c);
        Transform::mvp_matrix(&m(&self.model), &m(&self.view), &m(&self.projection))
    }
}

/// One point-list draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPoints {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub vertex_count: u32,
    pub uniforms: PointUniforms,
}

/// Explicit graphics context.
///
/// `write_vertex_buffer` and `draw_points` have no failure path; callers
/// must stay within the size a buffer was created with.
pub trait GraphicsDevice {
    fn create_program(&mut self, shader: &PointShader) -> Result<ProgramId, GpuError>;

    fn create_vertex_buffer(&mut self, size: u64) -> BufferId;

    fn write_vertex_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn destroy_program(&mut self, program: ProgramId);

    fn draw_points(&mut self, draw: &DrawPoints);
}
