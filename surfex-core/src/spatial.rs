/// Uniform voxel hash grid for minimum-separation queries
///
/// Cells are cubes whose side equals the separation radius, so every point
/// closer than the radius to a query lies in the cells overlapped by the
/// query's radius box. Lookups are O(1) amortized for a bounded point density.
use nalgebra::Point3;
use rustc_hash::FxHashMap;

type CellKey = (i64, i64, i64);

/// Spatial hash of point indices keyed by `floor(coordinate / radius)`.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    radius: f32,
    inv_cell_size: f32,
    cells: FxHashMap<CellKey, Vec<u32>>,
}

impl VoxelGrid {
    pub fn new(radius: f32) -> Self {
        debug_assert!(radius > 0.0, "radius must be positive");
        Self {
            radius,
            inv_cell_size: 1.0 / radius,
            cells: FxHashMap::default(),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    // `as` saturates, so coordinates beyond the key range share the edge cell
    fn cell_index(&self, c: f32) -> i64 {
        (c * self.inv_cell_size).floor() as i64
    }

    fn cell_of(&self, p: &Point3<f32>) -> CellKey {
        (self.cell_index(p.x), self.cell_index(p.y), self.cell_index(p.z))
    }

    fn cell_range(&self, c: f32) -> std::ops::RangeInclusive<i64> {
        self.cell_index(c - self.radius)..=self.cell_index(c + self.radius)
    }

    /// Registers `index` as the point stored at `positions[index]`.
    pub fn insert(&mut self, index: u32, position: &Point3<f32>) {
        let key = self.cell_of(position);
        self.cells.entry(key).or_default().push(index);
    }

    /// True if some registered point lies strictly closer than the radius to
    /// `query`. A point at exactly the radius does not count.
    pub fn has_neighbor_within(&self, positions: &[Point3<f32>], query: &Point3<f32>) -> bool {
        let radius_sq = self.radius * self.radius;

        for gx in self.cell_range(query.x) {
            for gy in self.cell_range(query.y) {
                for gz in self.cell_range(query.z) {
                    let Some(indices) = self.cells.get(&(gx, gy, gz)) else {
                        continue;
                    };
                    let close = indices.iter().any(|&i| {
                        (positions[i as usize] - query).norm_squared() < radius_sq
                    });
                    if close {
                        return true;
                    }
                }
            }
        }
        false
    }
}
