//! Nearest-grid-point sampling of a forecast field at plant coordinates.

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::{forecast::Grid, reading::registry::Coordinate};

/// Grid point positions as unit vectors; the smallest chord distance is the
/// smallest great-circle distance.
pub struct GridIndex {
    points: Vec<[f64; 3]>,
}

impl GridIndex {
    pub fn new(latlons: &[(f32, f32)]) -> Self {
        let points = latlons
            .iter()
            .map(|&(lat, lon)| unit_vector(lat as f64, lon as f64))
            .collect();

        GridIndex { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the grid point closest to `(latitude, longitude)`.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<usize> {
        let target = unit_vector(latitude, longitude);

        self.points
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, chord_squared(p, &target)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
    }
}

/// The grid point chosen for one requested coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledPoint {
    pub point: Coordinate,
    pub grid_index: usize,
    pub grid_latitude: f32,
    pub grid_longitude: f32,
}

/// Matches every coordinate to its nearest grid point.
pub fn pick_points(index: &GridIndex, latlons: &[(f32, f32)], coords: &[Coordinate]) -> Vec<SampledPoint> {
    coords
        .par_iter()
        .filter_map(|c| {
            index.nearest(c.latitude, c.longitude).map(|grid_index| {
                let (grid_latitude, grid_longitude) = latlons[grid_index];
                SampledPoint {
                    point: *c,
                    grid_index,
                    grid_latitude,
                    grid_longitude,
                }
            })
        })
        .collect()
}

/// Sampled values for every point, one row per timestamp.
pub fn sample(grid: &Grid, points: &[SampledPoint]) -> Vec<Option<f32>> {
    points.iter().map(|p| grid.value(p.grid_index)).collect()
}

/// Hourly samples for a fixed set of points, stored time-major.
#[derive(Debug, Clone, Default)]
pub struct PointSeries {
    pub points: Vec<SampledPoint>,
    pub times: Vec<NaiveDateTime>,
    pub values: Vec<Vec<Option<f32>>>,
}

impl PointSeries {
    pub fn new(points: Vec<SampledPoint>) -> Self {
        PointSeries {
            points,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, time: NaiveDateTime, grid: &Grid) {
        let row = sample(grid, &self.points);
        self.times.push(time);
        self.values.push(row);
    }

    /// Number of flat `(time, point)` samples.
    pub fn len(&self) -> usize {
        self.times.len() * self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unit_vector(latitude: f64, longitude: f64) -> [f64; 3] {
    let (lat, lon) = (latitude.to_radians(), longitude.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn chord_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

// -- Tests -------------------------------------------------------------------
