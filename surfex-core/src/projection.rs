/// Orbit camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};

/// Closest the orbit camera may get to its target
pub const MIN_CAMERA_DISTANCE: f32 = 0.1;

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    Orthographic,
    Perspective,
}

/// Camera looking at `target` from `distance` along the +Z axis
#[derive(Debug, Clone)]
pub struct Camera {
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mode: ProjectionMode,
    distance: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: Point3::origin(),
            up: Vector3::y(),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 100.0,
            mode: ProjectionMode::Perspective,
            distance: 3.5,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Move the camera along its view axis. Distances below
    /// [`MIN_CAMERA_DISTANCE`] are ignored.
    pub fn set_distance(&mut self, distance: f32) -> bool {
        if !(distance >= MIN_CAMERA_DISTANCE) {
            return false;
        }
        self.distance = distance;
        true
    }

    pub fn position(&self) -> Point3<f32> {
        self.target + Vector3::z() * self.distance
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position(), &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Perspective => {
                Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let height = self.distance;
                let width = height * self.aspect;
                Matrix4::new_orthographic(
                    -width / 2.0,
                    width / 2.0,
                    -height / 2.0,
                    height / 2.0,
                    self.near,
                    self.far,
                )
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Project a point through `mvp` to screen space. Returns `(x, y, depth)`
/// with depth in normalized device coordinates, or `None` when clipped.
pub fn project_to_screen(
    point: &Point3<f32>,
    mvp: &Matrix4<f32>,
    width: usize,
    height: usize,
) -> Option<(f32, f32, f32)> {
    let clip = mvp * point.to_homogeneous();

    // Behind the eye or on the eye plane
    if clip.w <= 1e-6 {
        return None;
    }

    let ndc = clip.xyz() / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z.abs() > 1.0 {
        return None;
    }

    let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
    let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;
    Some((screen_x, screen_y, ndc.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800, 600);
        assert_eq!(camera.mode, ProjectionMode::Perspective);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(camera.position(), Point3::new(0.0, 0.0, 3.5));
    }

    #[test]
    fn test_distance_floor() {
        let mut camera = Camera::default();
        assert!(!camera.set_distance(0.05));
        assert!(!camera.set_distance(f32::NAN));
        assert_eq!(camera.distance(), 3.5);
        assert!(camera.set_distance(0.1));
        assert_eq!(camera.distance(), 0.1);
    }

    #[test]
    fn test_origin_projects_to_center() {
        let camera = Camera::new(100, 100);
        let mvp = Transform::mvp_matrix(
            &Matrix4::identity(),
            &camera.view_matrix(),
            &camera.projection_matrix(),
        );
        let (x, y, depth) = project_to_screen(&Point3::origin(), &mvp, 100, 100).unwrap();
        assert!((x - 50.0).abs() < 1e-3);
        assert!((y - 50.0).abs() < 1e-3);
        assert!(depth > -1.0 && depth < 1.0);
    }

    #[test]
    fn test_point_behind_camera_is_clipped() {
        let camera = Camera::new(100, 100);
        let mvp = camera.projection_matrix() * camera.view_matrix();
        assert!(project_to_screen(&Point3::new(0.0, 0.0, 10.0), &mvp, 100, 100).is_none());
    }
}
