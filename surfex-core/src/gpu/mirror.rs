/// GPU vertex buffer mirror of the assembled point cloud
use log::debug;
use nalgebra::Matrix4;

use super::{
    BufferId, DrawPoints, GpuError, GraphicsDevice, PointShader, PointUniforms, PointVertex,
    ProgramId,
};
use crate::assembly::PointCloudView;

/// Buffers are never allocated smaller than this many points.
const MIN_CAPACITY: usize = 1024;

/// GPU vertex buffer mirroring a [`PointCloudView`].
///
/// The mirror never caches the view; it is handed a fresh one on every
/// [`update_points`](Self::update_points). Drawing without a resync after
/// the cloud changed renders the previous contents.
#[derive(Debug)]
pub struct PointCloudMirror {
    program: ProgramId,
    buffer: BufferId,
    capacity: usize,
    count: usize,
    model: Matrix4<f32>,
    staging: Vec<PointVertex>,
}

impl PointCloudMirror {
    /// Compiles `shader` and uploads the initial cloud. Fails if the device
    /// cannot build the program; no buffers are allocated in that case.
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        cloud: PointCloudView<'_>,
        shader: &PointShader,
    ) -> Result<Self, GpuError> {
        let program = device.create_program(shader)?;
        let capacity = cloud.len().max(MIN_CAPACITY);
        let buffer = device.create_vertex_buffer(capacity as u64 * PointVertex::SIZE);

        let mut mirror = Self {
            program,
            buffer,
            capacity,
            count: 0,
            model: Matrix4::identity(),
            staging: Vec::with_capacity(cloud.len()),
        };
        mirror.update_points(device, cloud);
        Ok(mirror)
    }

    /// Re-uploads the whole cloud, growing the buffer when it no longer fits.
    pub fn update_points<D: GraphicsDevice>(&mut self, device: &mut D, cloud: PointCloudView<'_>) {
        self.staging.clear();
        self.staging
            .extend(cloud.iter().map(|(p, n)| PointVertex::new(p, n)));

        let len = self.staging.len();
        if len > self.capacity {
            let capacity = len.max(self.capacity * 2);
            debug!(
                "growing point buffer from {} to {} points",
                self.capacity, capacity
            );
            device.destroy_buffer(self.buffer);
            self.buffer = device.create_vertex_buffer(capacity as u64 * PointVertex::SIZE);
            self.capacity = capacity;
        }

        if len > 0 {
            device.write_vertex_buffer(self.buffer, 0, bytemuck::cast_slice(&self.staging));
        }
        self.count = len;
    }

    pub fn set_model_matrix(&mut self, model: Matrix4<f32>) {
        self.model = model;
    }

    pub fn model_matrix(&self) -> &Matrix4<f32> {
        &self.model
    }

    /// Draws the first [`count`](Self::count) vertices as points.
    pub fn draw<D: GraphicsDevice>(
        &self,
        device: &mut D,
        projection: &Matrix4<f32>,
        view: &Matrix4<f32>,
    ) {
        if self.count == 0 {
            return;
        }
        device.draw_points(&DrawPoints {
            program: self.program,
            vertex_buffer: self.buffer,
            vertex_count: self.count as u32,
            uniforms: PointUniforms::new(&self.model, view, projection),
        });
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Number of points drawn.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of points the current buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Releases the vertex buffer and the program.
    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        device.destroy_buffer(self.buffer);
        device.destroy_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector3};

    use super::*;
    use crate::assembly::{Density, PointCloudAssembly};
    use crate::frame::Frame;
    use crate::gpu::{HeadlessDevice, LIT_POINT_SHADER, POINT_SHADER};

    fn line(n: usize, spacing: f32) -> Frame {
        (0..n)
            .map(|i| (Point3::new(i as f32 * spacing, 0.0, 0.0), Vector3::y()))
            .collect()
    }

    fn setup() -> (HeadlessDevice, PointCloudAssembly, PointCloudMirror) {
        let mut device = HeadlessDevice::new();
        let pca = PointCloudAssembly::with_density(Density::new(0.01).unwrap());
        let mirror = PointCloudMirror::new(&mut device, pca.point_cloud(), &LIT_POINT_SHADER).unwrap();
        (device, pca, mirror)
    }

    fn uploaded(device: &HeadlessDevice, mirror: &PointCloudMirror) -> Vec<PointVertex> {
        device
            .store()
            .vertices(mirror.buffer(), mirror.count() as u32)
            .collect()
    }

    #[test]
    fn test_empty_cloud_draws_nothing() {
        let (mut device, _pca, mirror) = setup();
        assert_eq!(mirror.count(), 0);
        mirror.draw(&mut device, &Matrix4::identity(), &Matrix4::identity());
        assert!(device.draws().is_empty());
    }

    #[test]
    fn test_count_follows_assembly() {
        let (mut device, mut pca, mut mirror) = setup();

        pca.add_data(&line(10, 0.1));
        mirror.update_points(&mut device, pca.point_cloud());
        assert_eq!(mirror.count(), pca.num_points());

        pca.resample(0.25).unwrap();
        mirror.update_points(&mut device, pca.point_cloud());
        assert_eq!(mirror.count(), pca.num_points());

        let expected: Vec<_> = pca
            .point_cloud()
            .iter()
            .map(|(p, n)| PointVertex::new(p, n))
            .collect();
        assert_eq!(uploaded(&device, &mirror), expected);
    }

    #[test]
    fn test_no_implicit_resync() {
        let (mut device, mut pca, mut mirror) = setup();
        pca.add_data(&line(3, 0.1));
        mirror.update_points(&mut device, pca.point_cloud());

        pca.add_data(&line(3, -0.5));
        mirror.draw(&mut device, &Matrix4::identity(), &Matrix4::identity());
        assert_eq!(device.draws()[0].vertex_count, 3);
        assert_eq!(pca.num_points(), 5);
    }

    #[test]
    fn test_idempotent_resync() {
        let (mut device, mut pca, mut mirror) = setup();
        pca.add_data(&line(50, 0.02));

        mirror.update_points(&mut device, pca.point_cloud());
        let first = device.store().buffer(mirror.buffer()).unwrap().to_vec();
        mirror.update_points(&mut device, pca.point_cloud());
        let second = device.store().buffer(mirror.buffer()).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_buffer_grows_past_capacity() {
        let (mut device, mut pca, mut mirror) = setup();
        let initial = mirror.capacity();
        let program = mirror.program();

        pca.add_data(&line(initial + 1, 0.02));
        mirror.update_points(&mut device, pca.point_cloud());

        assert_eq!(mirror.count(), initial + 1);
        assert_eq!(mirror.capacity(), initial * 2);
        assert_eq!(mirror.program(), program);
        // Old buffer released, only the new one is live
        assert_eq!(device.store().live_buffers(), 1);
        assert_eq!(uploaded(&device, &mirror).len(), initial + 1);
    }

    #[test]
    fn test_shrink_draws_only_current_points() {
        let (mut device, mut pca, mut mirror) = setup();
        pca.add_data(&line(100, 0.02));
        mirror.update_points(&mut device, pca.point_cloud());

        pca.resample(0.5).unwrap();
        mirror.update_points(&mut device, pca.point_cloud());
        mirror.draw(&mut device, &Matrix4::identity(), &Matrix4::identity());

        let draw = device.draws().last().unwrap();
        assert_eq!(draw.vertex_count as usize, pca.num_points());
        assert!(pca.num_points() < 100);
    }

    #[test]
    fn test_draw_uses_model_and_leaves_matrices() {
        let (mut device, mut pca, mut mirror) = setup();
        pca.add_data(&line(2, 0.5));
        mirror.update_points(&mut device, pca.point_cloud());

        let model = Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0));
        mirror.set_model_matrix(model);
        let projection = Matrix4::new_perspective(1.0, 1.0, 0.1, 10.0);
        let view = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -3.0));
        let (projection_before, view_before) = (projection, view);

        mirror.draw(&mut device, &projection, &view);

        assert_eq!(projection, projection_before);
        assert_eq!(view, view_before);
        let draw = device.draws()[0];
        assert_eq!(draw.program, mirror.program());
        assert_eq!(draw.uniforms, PointUniforms::new(&model, &view, &projection));
        assert!((draw.uniforms.mvp() - projection * view * model).norm() < 1e-5);
    }

    #[test]
    fn test_destroy_releases_device_resources() {
        let (mut device, mut pca, mut mirror) = setup();
        pca.add_data(&line(2000, 0.02));
        mirror.update_points(&mut device, pca.point_cloud());

        mirror.destroy(&mut device);
        assert_eq!(device.store().live_buffers(), 0);
        assert_eq!(device.store().live_programs(), 0);
    }

    #[test]
    fn test_construction_fails_on_bad_shader() {
        let mut device = HeadlessDevice::new();
        let pca = PointCloudAssembly::new();
        let broken = PointShader {
            source: "",
            ..POINT_SHADER
        };
        let result = PointCloudMirror::new(&mut device, pca.point_cloud(), &broken);
        assert!(matches!(result, Err(GpuError::ShaderCompilation { .. })));
        assert_eq!(device.store().live_buffers(), 0);
    }
}
