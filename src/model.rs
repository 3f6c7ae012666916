use serde::{Deserialize, Serialize};

use crate::error::{DemError, Result};
use crate::mesh::MeshCode;

/// One elevation sample.
///
/// `Absent` marks a surveyed point without a value. It is kept apart from
/// any numeric sentinel until the output rasters are built.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sample {
    Present(f32),
    #[default]
    Absent,
}

impl Sample {
    pub fn value(self) -> Option<f32> {
        match self {
            Sample::Present(v) => Some(v),
            Sample::Absent => None,
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Sample::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

/// Geographic bounds as `{lower_left: {lat, lon}, upper_right: {lat, lon}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsLatLng {
    pub lower_left: LatLng,
    pub upper_right: LatLng,
}

impl BoundsLatLng {
    pub fn width(&self) -> f64 {
        self.upper_right.lon - self.lower_left.lon
    }

    pub fn height(&self) -> f64 {
        self.upper_right.lat - self.lower_left.lat
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &BoundsLatLng) -> BoundsLatLng {
        BoundsLatLng {
            lower_left: LatLng {
                lat: self.lower_left.lat.min(other.lower_left.lat),
                lon: self.lower_left.lon.min(other.lower_left.lon),
            },
            upper_right: LatLng {
                lat: self.upper_right.lat.max(other.upper_right.lat),
                lon: self.upper_right.lon.max(other.upper_right.lon),
            },
        }
    }
}

/// DEMのメタデータ
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub mesh_code: MeshCode,
    /// 例: "5mメッシュ（標高）"
    pub dem_type: String,
    /// 例: "fguuid:jgd2011.bl"
    pub crs_identifier: String,
}

/// One parsed mesh cell.
///
/// Bounds are pixel-edge aligned: `lower_left` is the south-west corner of the
/// south-west pixel and `upper_right` the north-east corner of the north-east
/// pixel. `values` are row-major, north to south then west to east.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshCell {
    pub metadata: Metadata,
    pub lower_left: LatLng,
    pub upper_right: LatLng,
    pub rows: usize,
    pub cols: usize,
    /// (x, y) of the first listed sample
    pub start_point: (usize, usize),
    pub values: Vec<Sample>,
}

impl MeshCell {
    pub fn new(
        metadata: Metadata,
        lower_left: LatLng,
        upper_right: LatLng,
        rows: usize,
        cols: usize,
        start_point: (usize, usize),
        values: Vec<Sample>,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(DemError::Format(format!(
                "Empty grid for mesh {}: {} x {}",
                metadata.mesh_code, cols, rows
            )));
        }
        if !(lower_left.lat < upper_right.lat && lower_left.lon < upper_right.lon) {
            return Err(DemError::Format(format!(
                "Degenerate bounds for mesh {}: ({}, {}) - ({}, {})",
                metadata.mesh_code, lower_left.lat, lower_left.lon, upper_right.lat, upper_right.lon
            )));
        }
        if values.len() != rows * cols {
            return Err(DemError::GridSize {
                mesh_code: metadata.mesh_code.to_string(),
                expected: rows * cols,
                found: values.len(),
            });
        }

        Ok(Self {
            metadata,
            lower_left,
            upper_right,
            rows,
            cols,
            start_point,
            values,
        })
    }

    pub fn mesh_code(&self) -> &MeshCode {
        &self.metadata.mesh_code
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn bounds(&self) -> BoundsLatLng {
        BoundsLatLng {
            lower_left: self.lower_left,
            upper_right: self.upper_right,
        }
    }

    pub fn pixel_size_lon(&self) -> f64 {
        (self.upper_right.lon - self.lower_left.lon) / self.cols as f64
    }

    pub fn pixel_size_lat(&self) -> f64 {
        (self.upper_right.lat - self.lower_left.lat) / self.rows as f64
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Sample> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }
}
