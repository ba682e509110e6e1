/// Simulated multi-view scan of a reference mesh.
///
/// Cameras sit on the vertices of a subdivided icosahedron around the
/// origin. Each view casts a square grid of rays through a 45 degree
/// frustum toward the origin and keeps the nearest front-facing hit, which
/// yields one frame of surface samples per view.
use log::debug;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

use crate::frame::{Frame, SampleSource};
use crate::geometry::{Mesh, Ray};
use crate::projection::MIN_CAMERA_DISTANCE;

/// View directions on the unit sphere from an icosahedron subdivided
/// `subdivisions` times (12, 42, 162, ... directions).
pub fn icosphere_directions(subdivisions: u32) -> Vec<Vector3<f32>> {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let mut vertices: Vec<Vector3<f32>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .iter()
    .map(|v| Vector3::from(*v).normalize())
    .collect();

    #[rustfmt::skip]
    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vector3<f32>>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                vertices.push(((vertices[a] + vertices[b]) * 0.5).normalize());
                vertices.len() - 1
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }

    vertices
}

/// Scans a mesh from icosphere viewpoints, one frame per viewpoint.
#[derive(Debug, Clone)]
pub struct PolyhedronViewSampler {
    mesh: Mesh,
    views: Vec<Point3<f32>>,
    resolution: u32,
    half_fov_tan: f32,
    next_view: usize,
    frame: Frame,
}

impl PolyhedronViewSampler {
    /// `camera_distance` below the camera floor falls back to the floor.
    pub fn new(mesh: Mesh, camera_distance: f32, subdivisions: u32, resolution: u32) -> Self {
        let distance = camera_distance.max(MIN_CAMERA_DISTANCE);
        let views = icosphere_directions(subdivisions)
            .into_iter()
            .map(|d| Point3::from(d * distance))
            .collect();

        Self {
            mesh,
            views,
            resolution: resolution.max(1),
            half_fov_tan: (std::f32::consts::FRAC_PI_4 / 2.0).tan(),
            next_view: 0,
            frame: Frame::new(),
        }
    }

    pub fn views(&self) -> &[Point3<f32>] {
        &self.views
    }

    pub fn frames_captured(&self) -> usize {
        self.next_view
    }

    fn capture(&mut self, eye: Point3<f32>) {
        self.frame.clear();

        let forward = (-eye.coords).normalize();
        let helper = if forward.y.abs() > 0.99 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let right = forward.cross(&helper).normalize();
        let up = right.cross(&forward);

        let n = self.resolution as f32;
        for row in 0..self.resolution {
            for col in 0..self.resolution {
                let u = (2.0 * (col as f32 + 0.5) / n - 1.0) * self.half_fov_tan;
                let v = (1.0 - 2.0 * (row as f32 + 0.5) / n) * self.half_fov_tan;
                let ray = Ray::new(eye, forward + right * u + up * v);
                if let Some(hit) = self.mesh.cast_ray(&ray, true) {
                    self.frame.push(hit.position, hit.normal);
                }
            }
        }
    }
}

impl SampleSource for PolyhedronViewSampler {
    fn draw_next_frame(&mut self) -> bool {
        if let Some(&eye) = self.views.get(self.next_view) {
            self.capture(eye);
            self.next_view += 1;
            debug!(
                "view {}/{}: {} samples",
                self.next_view,
                self.views.len(),
                self.frame.len()
            );
        }
        self.next_view >= self.views.len()
    }

    fn current_frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.views.len())
    }
}
