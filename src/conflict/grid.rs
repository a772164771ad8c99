//! Coarse spatial index over burn centroids

use std::collections::HashMap;

use crate::types::GeoPoint;

/// Cell edge length, m.
const CELL_SIZE_M: f64 = 1_000.0;

/// Meters per degree of latitude.
const M_PER_DEG_LAT: f64 = 111_320.0;

/// A 1 km grid index mapping centroids to cells for candidate
/// gathering. Queries return every entry within a radius, scanning only
/// the cells the radius touches.
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<GeoPoint>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_of(point: &GeoPoint) -> (i64, i64) {
        let y = point.lat * M_PER_DEG_LAT / CELL_SIZE_M;
        let x = point.lon * M_PER_DEG_LAT * point.lat.to_radians().cos() / CELL_SIZE_M;
        (y.floor() as i64, x.floor() as i64)
    }

    /// Insert a centroid, returning its index.
    pub fn insert(&mut self, point: GeoPoint) -> usize {
        let idx = self.points.len();
        self.points.push(point);
        self.cells.entry(Self::cell_of(&point)).or_default().push(idx);
        idx
    }

    /// Indices of all entries within `radius_m` of `center`, excluding
    /// `center` itself when it was inserted (callers filter by index).
    pub fn within(&self, center: &GeoPoint, radius_m: f64) -> Vec<usize> {
        let (cy, cx) = Self::cell_of(center);
        let span = (radius_m / CELL_SIZE_M).ceil() as i64 + 1;

        let mut hits = Vec::new();
        for dy in -span..=span {
            for dx in -span..=span {
                if let Some(indices) = self.cells.get(&(cy + dy, cx + dx)) {
                    for &idx in indices {
                        if center.distance_m(&self.points[idx]) <= radius_m {
                            hits.push(idx);
                        }
                    }
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
