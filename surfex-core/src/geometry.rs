/// Geometry primitives for the reference model and ray casting
use nalgebra::{Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A ray with an origin and a (not necessarily normalized) direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Calculate the face normal from the triangle's vertices
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.vertices.map(|v| v.position);
        (v1 - v0).cross(&(v2 - v0)).normalize()
    }

    /// Möller–Trumbore intersection. Returns the ray parameter of the hit.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        const EPSILON: f32 = 1e-7;

        let [v0, v1, v2] = self.vertices.map(|v| v.position);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = ray.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = ray.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

/// Nearest intersection of a ray with a mesh
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounding box of all vertices, `None` for an empty mesh
    pub fn bounds(&self) -> Option<Bounds> {
        let mut vertices = self.triangles.iter().flat_map(|t| t.vertices.iter());
        let first = vertices.next()?.position;
        let bounds = vertices.fold(Bounds { min: first, max: first }, |b, v| Bounds {
            min: b.min.inf(&v.position),
            max: b.max.sup(&v.position),
        });
        Some(bounds)
    }

    /// Recentre the mesh on the origin and scale it into the unit sphere
    pub fn normalized(&self) -> Self {
        let Some(bounds) = self.bounds() else {
            return self.clone();
        };
        let center = bounds.center();
        let radius = self
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter())
            .map(|v| (v.position - center).norm())
            .fold(0.0f32, f32::max);
        let scale = if radius > f32::EPSILON { 1.0 / radius } else { 1.0 };

        let triangles = self
            .triangles
            .iter()
            .map(|t| Triangle {
                vertices: t.vertices.map(|v| Vertex {
                    position: Point3::from((v.position - center) * scale),
                    normal: v.normal,
                }),
            })
            .collect();
        Self { triangles }
    }

    /// Nearest hit of `ray` against all triangles. With `front_faces_only`
    /// a nearest hit on a face turned away from the ray occludes and yields
    /// `None`.
    pub fn cast_ray(&self, ray: &Ray, front_faces_only: bool) -> Option<Hit> {
        let mut nearest: Option<(f32, &Triangle)> = None;
        for triangle in &self.triangles {
            let Some(t) = triangle.intersect(ray) else {
                continue;
            };
            if nearest.map_or(true, |(best, _)| t < best) {
                nearest = Some((t, triangle));
            }
        }

        let (t, triangle) = nearest?;
        let normal = triangle.calculate_normal();
        if front_faces_only && normal.dot(&ray.direction) >= 0.0 {
            return None;
        }
        Some(Hit {
            t,
            position: ray.at(t),
            normal,
        })
    }

    /// Create an axis-aligned cube mesh centred on the origin
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        // (normal, u axis, v axis) for each face, wound counter-clockwise
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ];

        let mut mesh = Self::with_capacity(12);
        for (n, u, v) in faces {
            let n = Vector3::from(n);
            let u = Vector3::from(u);
            let v = Vector3::from(v);
            let corner = |su: f32, sv: f32| {
                let p = (n + u * su + v * sv) * half;
                Vertex::new(p.x, p.y, p.z, n.x, n.y, n.z)
            };
            let (a, b, c, d) = (
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
            );
            mesh.add_triangle(Triangle::new(a, b, c));
            mesh.add_triangle(Triangle::new(a, c, d));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.triangles.len(), 12);
        for triangle in &cube.triangles {
            let face = triangle.calculate_normal();
            let declared = triangle.vertices[0].normal;
            assert!((face - declared).norm() < 1e-5, "{face:?} vs {declared:?}");
        }
    }

    #[test]
    fn test_cube_bounds() {
        let bounds = Mesh::cube(2.0).bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_cast_ray_hits_front_face() {
        let cube = Mesh::cube(2.0);
        let ray = Ray::new(Point3::new(0.2, 0.1, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = cube.cast_ray(&ray, true).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-5);
        assert!((hit.position.z - 1.0).abs() < 1e-5);
        assert!((hit.normal - Vector3::z()).norm() < 1e-5);
    }

    #[test]
    fn test_cast_ray_misses() {
        let cube = Mesh::cube(2.0);
        let ray = Ray::new(Point3::new(3.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(cube.cast_ray(&ray, true).is_none());
    }

    #[test]
    fn test_back_face_occludes_front_face() {
        let at = |z: f32, flipped: bool| {
            let (a, b) = (
                Vertex::new(-1.0, -1.0, z, 0.0, 0.0, 1.0),
                Vertex::new(1.0, -1.0, z, 0.0, 0.0, 1.0),
            );
            let c = Vertex::new(0.0, 1.0, z, 0.0, 0.0, 1.0);
            if flipped {
                Triangle::new(b, a, c)
            } else {
                Triangle::new(a, b, c)
            }
        };
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));

        let mut mesh = Mesh::new();
        mesh.add_triangle(at(0.0, false));
        assert!((mesh.cast_ray(&ray, true).unwrap().t - 5.0).abs() < 1e-5);

        // A back face between the ray origin and the front face hides it
        mesh.add_triangle(at(1.0, true));
        assert!(mesh.cast_ray(&ray, true).is_none());
        let hit = mesh.cast_ray(&ray, false).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalized_fits_unit_sphere() {
        let mesh = Mesh::cube(10.0).normalized();
        let bounds = mesh.bounds().unwrap();
        assert!(bounds.center().coords.norm() < 1e-5);
        let corner = (bounds.max - bounds.center()).norm();
        assert!((corner - 1.0).abs() < 1e-5);
    }
}
