/// Incremental point cloud assembly with minimum-separation de-duplication
use std::path::Path;

use log::{info, warn};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

use crate::frame::Frame;
use crate::obj::{self, ExportError};
use crate::spatial::VoxelGrid;

/// Minimum spatial separation between retained points.
///
/// Valid values lie in `[Density::MIN, Density::MAX)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Density(f32);

impl Density {
    pub const MIN: f32 = 0.005;
    pub const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Result<Self, AssemblyError> {
        if (Self::MIN..Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AssemblyError::InvalidDensity(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Density {
    fn default() -> Self {
        Self(0.025)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error(
        "invalid point cloud density {0}, expected {min} <= density < {max}",
        min = Density::MIN,
        max = Density::MAX
    )]
    InvalidDensity(f32),
}

/// Read-only view of the assembled cloud. Positions and normals are
/// parallel slices of equal length.
#[derive(Debug, Clone, Copy)]
pub struct PointCloudView<'a> {
    pub positions: &'a [Point3<f32>],
    pub normals: &'a [Vector3<f32>],
}

impl<'a> PointCloudView<'a> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a Point3<f32>, &'a Vector3<f32>)> {
        self.positions.iter().zip(self.normals.iter())
    }
}

/// Owns the canonical point cloud.
///
/// A sample is accepted iff no accepted point lies strictly closer than the
/// current density. Points at exactly the density distance are kept.
#[derive(Debug, Clone)]
pub struct PointCloudAssembly {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    density: Density,
    grid: VoxelGrid,
    verbose: bool,
}

impl PointCloudAssembly {
    pub fn new() -> Self {
        Self::with_density(Density::default())
    }

    pub fn with_density(density: Density) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            density,
            grid: VoxelGrid::new(density.get()),
            verbose: false,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Set the separation used by subsequent merges. Already accepted points
    /// are left alone; call [`resample`](Self::resample) to enforce the new
    /// value on them.
    pub fn set_density(&mut self, density: f32) -> Result<(), AssemblyError> {
        let density = self.validate(density)?;
        self.density = density;
        self.rebuild_grid();
        Ok(())
    }

    pub fn density(&self) -> f32 {
        self.density.get()
    }

    pub fn num_points(&self) -> usize {
        self.positions.len()
    }

    pub fn point_cloud(&self) -> PointCloudView<'_> {
        PointCloudView {
            positions: &self.positions,
            normals: &self.normals,
        }
    }

    /// Merge one frame of samples in order. Returns the number accepted.
    pub fn add_data(&mut self, frame: &Frame) -> usize {
        let before = self.positions.len();
        for (position, normal) in frame.iter() {
            self.try_insert(position, normal);
        }
        let accepted = self.positions.len() - before;

        if self.verbose {
            info!(
                "merged frame: {} of {} samples accepted, {} points total",
                accepted,
                frame.len(),
                self.positions.len()
            );
        }
        accepted
    }

    /// Rebuild the cloud from its current points at a new density. Points
    /// are replayed in storage order, so earlier points win.
    pub fn resample(&mut self, density: f32) -> Result<usize, AssemblyError> {
        let density = self.validate(density)?;
        let before = self.positions.len();

        let positions = std::mem::take(&mut self.positions);
        let normals = std::mem::take(&mut self.normals);
        self.density = density;
        self.grid = VoxelGrid::new(density.get());

        for (position, normal) in positions.iter().zip(normals.iter()) {
            self.try_insert(position, normal);
        }

        if self.verbose {
            info!(
                "resampled at density {}: {} -> {} points",
                density.get(),
                before,
                self.positions.len()
            );
        }
        Ok(self.positions.len())
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.grid.clear();
    }

    /// Write the cloud as a point file. The cloud itself is not modified.
    pub fn write_to_file_obj<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        let path = path.as_ref();
        match obj::write_points_file(path, self.point_cloud()) {
            Ok(()) => {
                if self.verbose {
                    info!("wrote {} points to {}", self.positions.len(), path.display());
                }
                Ok(())
            }
            Err(e) => {
                if self.verbose {
                    warn!("failed to write {}: {}", path.display(), e);
                }
                Err(e)
            }
        }
    }

    fn validate(&self, density: f32) -> Result<Density, AssemblyError> {
        Density::new(density).map_err(|e| {
            if self.verbose {
                warn!("{}, keeping {}", e, self.density.get());
            }
            e
        })
    }

    fn try_insert(&mut self, position: &Point3<f32>, normal: &Vector3<f32>) -> bool {
        if !position.coords.iter().all(|c| c.is_finite()) {
            return false;
        }
        if self.grid.has_neighbor_within(&self.positions, position) {
            return false;
        }
        self.grid.insert(self.positions.len() as u32, position);
        self.positions.push(*position);
        self.normals.push(*normal);
        true
    }

    fn rebuild_grid(&mut self) {
        self.grid = VoxelGrid::new(self.density.get());
        for (i, p) in self.positions.iter().enumerate() {
            self.grid.insert(i as u32, p);
        }
    }
}

impl Default for PointCloudAssembly {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(points: &[[f32; 3]]) -> Frame {
        let mut frame = Frame::new();
        for p in points {
            frame.push(Point3::from(*p), Vector3::z());
        }
        frame
    }

    fn assembly(density: f32) -> PointCloudAssembly {
        PointCloudAssembly::with_density(Density::new(density).unwrap())
    }

    fn brute_force_min_distance(view: PointCloudView<'_>) -> f32 {
        let mut min = f32::INFINITY;
        for (i, a) in view.positions.iter().enumerate() {
            for b in &view.positions[i + 1..] {
                min = min.min((a - b).norm());
            }
        }
        min
    }

    #[test]
    fn test_density_floor() {
        let mut pca = assembly(0.1);
        for bad in [0.004, 0.0, -1.0, 1.0, 2.0, f32::NAN] {
            assert!(pca.set_density(bad).is_err());
            assert_eq!(pca.density(), 0.1);
        }
        assert!(pca.set_density(0.005).is_ok());
        assert_eq!(pca.density(), 0.005);
    }

    #[test]
    fn test_merge_and_resample_scenario() {
        let mut pca = assembly(0.1);
        assert_eq!(pca.add_data(&frame(&[[0.0, 0.0, 0.0], [0.05, 0.0, 0.0]])), 1);
        assert_eq!(pca.num_points(), 1);

        pca.add_data(&frame(&[[1.0, 0.0, 0.0]]));
        assert_eq!(pca.num_points(), 2);

        assert_eq!(pca.resample(0.01), Ok(2));
        assert_eq!(pca.density(), 0.01);
    }

    #[test]
    fn test_first_inserted_wins() {
        let mut pca = assembly(0.1);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0], [0.06, 0.0, 0.0], [0.12, 0.0, 0.0]]));
        // 0.06 is rejected by 0.0; 0.12 is then clear of everything kept
        assert_eq!(pca.point_cloud().positions, &[Point3::origin(), Point3::new(0.12, 0.0, 0.0)]);
    }

    #[test]
    fn test_exact_density_distance_is_kept() {
        let mut pca = assembly(0.5);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]));
        assert_eq!(pca.num_points(), 2);
    }

    #[test]
    fn test_resample_coarsens_collinear_points() {
        let mut pca = assembly(0.005);
        let points: Vec<[f32; 3]> = (0..100).map(|i| [i as f32 * 0.01, 0.0, 0.0]).collect();
        pca.add_data(&frame(&points));
        assert_eq!(pca.num_points(), 100);

        let kept = pca.resample(0.5).unwrap();
        // span 0.99 at 0.5 spacing, roughly span / 0.5 + 1
        assert!((2..=3).contains(&kept), "kept {kept}");
        assert!(brute_force_min_distance(pca.point_cloud()) >= 0.5 - 1e-6);
    }

    #[test]
    fn test_resample_never_increases_count() {
        let mut pca = assembly(0.2);
        let points: Vec<[f32; 3]> = (0..50).map(|i| [i as f32 * 0.03, (i % 7) as f32 * 0.05, 0.0]).collect();
        pca.add_data(&frame(&points));
        let before = pca.num_points();
        assert!(pca.resample(0.005).unwrap() <= before);
        assert!(pca.resample(0.9).unwrap() <= before);
    }

    #[test]
    fn test_invalid_resample_keeps_state() {
        let mut pca = assembly(0.1);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]));
        assert_eq!(pca.resample(0.001), Err(AssemblyError::InvalidDensity(0.001)));
        assert_eq!(pca.num_points(), 2);
        assert_eq!(pca.density(), 0.1);
    }

    #[test]
    fn test_dedup_invariant_over_many_frames() {
        let mut pca = assembly(0.05);
        // Deterministic pseudo-random samples in the unit cube
        let mut seed = 0x2545_f491_u32;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed % 10_000) as f32 / 10_000.0
        };
        for _ in 0..10 {
            let points: Vec<[f32; 3]> = (0..200).map(|_| [next(), next(), next()]).collect();
            pca.add_data(&frame(&points));
        }
        let view = pca.point_cloud();
        assert_eq!(view.positions.len(), view.normals.len());
        assert!(brute_force_min_distance(view) >= 0.05 - 1e-6);
    }

    #[test]
    fn test_grid_matches_brute_force_acceptance() {
        let mut seed = 0x9e37_79b9_u32;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as f32 / u32::MAX as f32
        };

        for density in [0.005, 0.0137, 0.05, 0.1, 0.333, 0.999] {
            let mut pca = assembly(density);
            let mut kept: Vec<Point3<f32>> = Vec::new();
            // Spread so that every density sees both accepts and rejects
            let extent = density * 20.0;
            for _ in 0..2_000 {
                let p = Point3::new(next() - 0.5, next() - 0.5, next() - 0.5) * extent;
                let expected = kept
                    .iter()
                    .all(|k| (k - p).norm_squared() >= density * density);
                if expected {
                    kept.push(p);
                }
                let accepted = pca.add_data(&frame(&[p.coords.into()])) == 1;
                assert_eq!(accepted, expected, "density {density} at {p}");
            }
            assert_eq!(pca.point_cloud().positions, kept.as_slice());
        }
    }

    #[test]
    fn test_far_duplicates_are_rejected() {
        let mut pca = assembly(0.1);
        assert_eq!(pca.add_data(&frame(&[[1.0e12, 0.0, 0.0], [1.0e12, 0.0, 0.0]])), 1);

        let mut pca = assembly(0.005);
        let points = [[3.0e38, -3.0e38, 1.0e10], [3.0e38, -3.0e38, 1.0e10]];
        assert_eq!(pca.add_data(&frame(&points)), 1);
        assert_eq!(pca.num_points(), 1);
    }

    #[test]
    fn test_set_density_applies_to_new_samples() {
        let mut pca = assembly(0.01);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0]]));
        pca.set_density(0.5).unwrap();
        assert_eq!(pca.add_data(&frame(&[[0.3, 0.0, 0.0]])), 0);
        assert_eq!(pca.add_data(&frame(&[[0.6, 0.0, 0.0]])), 1);
    }

    #[test]
    fn test_non_finite_samples_are_discarded() {
        let mut pca = assembly(0.1);
        assert_eq!(pca.add_data(&frame(&[[f32::NAN, 0.0, 0.0], [f32::INFINITY, 1.0, 0.0]])), 0);
        assert_eq!(pca.num_points(), 0);
    }

    #[test]
    fn test_clear() {
        let mut pca = assembly(0.1);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0]]));
        pca.clear();
        assert_eq!(pca.num_points(), 0);
        assert_eq!(pca.add_data(&frame(&[[0.0, 0.0, 0.0]])), 1);
    }

    #[test]
    fn test_write_does_not_modify_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let mut pca = assembly(0.1);
        pca.add_data(&frame(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]));
        pca.write_to_file_obj(dir.path().join("cloud.obj")).unwrap();
        assert_eq!(pca.num_points(), 2);
        assert!(pca.write_to_file_obj(dir.path().join("missing/cloud.obj")).is_err());
    }
}
