//! Mosaicking of mesh cells into one contiguous grid.

use tracing::{debug, info};

use crate::error::{DemError, Result};
use crate::mesh::{MeshCode, MeshLevel};
use crate::model::{BoundsLatLng, LatLng, MeshCell, Sample};

#[derive(Debug, Clone, Copy)]
pub struct MosaicOptions {
    /// Allowed pixel size difference between cells, in degrees.
    pub tolerance: f64,
    /// Rows or columns at or above this are rejected.
    pub max_dimension: usize,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            // GeoTIFFのサイズ上限（約4GB）に合わせる
            max_dimension: 32000,
        }
    }
}

/// A single elevation grid built from one or more mesh cells.
///
/// `origin` is the north-west corner of the north-west pixel. Pixels not
/// covered by any cell are [`Sample::Absent`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    origin: LatLng,
    pixel_size_lat: f64,
    pixel_size_lon: f64,
    rows: usize,
    cols: usize,
    grid: Vec<Sample>,
    bounds: BoundsLatLng,
    mesh_codes: Vec<MeshCode>,
    dem_type: String,
}

impl Mosaic {
    /// Merges `cells` into one grid.
    ///
    /// Cells are placed in mesh code order; cells sharing a code keep their
    /// input order and the later one wins where they overlap.
    pub fn merge(mut cells: Vec<MeshCell>, options: &MosaicOptions) -> Result<Self> {
        if cells.is_empty() {
            return Err(DemError::EmptyInput);
        }

        for cell in &cells {
            if cell.values.len() != cell.rows * cell.cols {
                return Err(DemError::GridSize {
                    mesh_code: cell.mesh_code().to_string(),
                    expected: cell.rows * cell.cols,
                    found: cell.values.len(),
                });
            }
        }

        check_mesh_levels(&cells)?;

        cells.sort_by(|a, b| a.mesh_code().cmp(b.mesh_code()));

        let reference = &cells[0];
        let ref_lon = reference.pixel_size_lon();
        let ref_lat = reference.pixel_size_lat();

        for cell in &cells {
            let lon = cell.pixel_size_lon();
            let lat = cell.pixel_size_lat();
            if (lon - ref_lon).abs() > options.tolerance || (lat - ref_lat).abs() > options.tolerance
            {
                return Err(DemError::InconsistentResolution {
                    mesh_code: cell.mesh_code().to_string(),
                    expected_lon: ref_lon,
                    expected_lat: ref_lat,
                    found_lon: lon,
                    found_lat: lat,
                });
            }
        }

        let bounds = cells
            .iter()
            .skip(1)
            .fold(reference.bounds(), |acc, cell| acc.union(&cell.bounds()));

        let cols = ((bounds.width() / ref_lon).round() as usize).max(1);
        let rows = ((bounds.height() / ref_lat).round() as usize).max(1);

        if cols >= options.max_dimension || rows >= options.max_dimension {
            return Err(DemError::ImageTooLarge {
                cols,
                rows,
                limit: options.max_dimension,
            });
        }

        // 全体範囲を画素数で割り直し、ジオトランスフォームが範囲と一致するようにする
        let pixel_size_lon = bounds.width() / cols as f64;
        let pixel_size_lat = bounds.height() / rows as f64;
        let origin = LatLng {
            lat: bounds.upper_right.lat,
            lon: bounds.lower_left.lon,
        };

        info!(
            "Merging {} cells into {} x {} pixels",
            cells.len(),
            cols,
            rows
        );

        let mut grid = vec![Sample::Absent; rows * cols];
        for cell in &cells {
            let col_offset = ((cell.lower_left.lon - origin.lon) / pixel_size_lon).round() as i64;
            let row_offset = ((origin.lat - cell.upper_right.lat) / pixel_size_lat).round() as i64;
            debug!(
                "Placing mesh {} at row {}, col {}",
                cell.mesh_code(),
                row_offset,
                col_offset
            );
            place(&mut grid, rows, cols, cell, row_offset, col_offset);
        }

        let dem_type = reference.metadata.dem_type.clone();
        let mesh_codes = cells.into_iter().map(|c| c.metadata.mesh_code).collect();

        Ok(Self {
            origin,
            pixel_size_lat,
            pixel_size_lon,
            rows,
            cols,
            grid,
            bounds,
            mesh_codes,
            dem_type,
        })
    }

    pub fn origin(&self) -> LatLng {
        self.origin
    }

    pub fn pixel_size_lat(&self) -> f64 {
        self.pixel_size_lat
    }

    pub fn pixel_size_lon(&self) -> f64 {
        self.pixel_size_lon
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn bounds(&self) -> BoundsLatLng {
        self.bounds
    }

    pub fn mesh_codes(&self) -> &[MeshCode] {
        &self.mesh_codes
    }

    /// `<type>` of the first cell in mesh code order.
    pub fn dem_type(&self) -> &str {
        &self.dem_type
    }

    pub fn values(&self) -> &[Sample] {
        &self.grid
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Sample> {
        if row < self.rows && col < self.cols {
            Some(self.grid[row * self.cols + col])
        } else {
            None
        }
    }

    /// GDAL order: `[origin_lon, px_lon, 0, origin_lat, 0, -px_lat]`.
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.origin.lon,
            self.pixel_size_lon,
            0.0,
            self.origin.lat,
            0.0,
            -self.pixel_size_lat,
        ]
    }

    /// True when at least one pixel holds a value.
    pub fn has_elevation(&self) -> bool {
        self.grid.iter().any(|s| !s.is_absent())
    }

    pub fn absent_count(&self) -> usize {
        self.grid.iter().filter(|s| s.is_absent()).count()
    }
}

fn check_mesh_levels(cells: &[MeshCell]) -> Result<()> {
    let second = cells
        .iter()
        .find(|c| c.mesh_code().level() == MeshLevel::Second);
    let third = cells
        .iter()
        .find(|c| c.mesh_code().level() == MeshLevel::Third);

    if let (Some(second), Some(third)) = (second, third) {
        return Err(DemError::MixedMeshLevel {
            second: second.mesh_code().to_string(),
            third: third.mesh_code().to_string(),
        });
    }

    Ok(())
}

/// Copies `cell` into `grid` at the given offset, dropping pixels outside it.
fn place(
    grid: &mut [Sample],
    rows: usize,
    cols: usize,
    cell: &MeshCell,
    row_offset: i64,
    col_offset: i64,
) {
    let col_start = col_offset.max(0);
    let col_end = (col_offset + cell.cols as i64).min(cols as i64);
    if col_start >= col_end {
        return;
    }
    let src_col_start = (col_start - col_offset) as usize;
    let width = (col_end - col_start) as usize;

    for r in 0..cell.rows {
        let dst_row = row_offset + r as i64;
        if dst_row < 0 || dst_row >= rows as i64 {
            continue;
        }
        let src = r * cell.cols + src_col_start;
        let dst = dst_row as usize * cols + col_start as usize;
        grid[dst..dst + width].copy_from_slice(&cell.values[src..src + width]);
    }
}
