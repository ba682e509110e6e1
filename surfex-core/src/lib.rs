/// Surfex Core Library - point cloud assembly from simulated scans
///
/// This library merges per-frame surface samples into a de-duplicated,
/// density-controlled point cloud, keeps a GPU vertex buffer mirror of it in
/// sync, and handles the reference model and point file formats.

pub mod assembly;
pub mod frame;
pub mod geometry;
pub mod gpu;
pub mod obj;
pub mod projection;
pub mod sampler;
pub mod spatial;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use assembly::{AssemblyError, Density, PointCloudAssembly, PointCloudView};
pub use frame::{Frame, SampleSource, VecSampleSource};
pub use geometry::{Mesh, Ray, Triangle, Vertex};
pub use gpu::{GpuError, GraphicsDevice, HeadlessDevice, PointCloudMirror};
pub use obj::ExportError;
pub use projection::{Camera, ProjectionMode};
pub use sampler::PolyhedronViewSampler;
pub use transform::{RotationState, Transform};
