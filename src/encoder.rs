//! Conversion of a [`Mosaic`] into output raster arrays.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::mosaic::Mosaic;
use crate::terrain_rgb::{find_elevation_range, OutOfRange, TerrainRgbConfig};

/// 単バンドGeoTIFFのNoData値
pub const DEFAULT_NODATA: f32 = -9999.0;

/// JGD2011 geographic 2D
pub const EPSG_JGD2011: u32 = 6668;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    /// GDAL order: `[origin_lon, px_lon, 0, origin_lat, 0, -px_lat]`
    pub geo_transform: [f64; 6],
    pub epsg: u32,
}

impl GeoReference {
    pub fn from_mosaic(mosaic: &Mosaic) -> Self {
        Self {
            geo_transform: mosaic.geo_transform(),
            epsg: EPSG_JGD2011,
        }
    }
}

/// Descriptive tags stored with the written rasters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterMetadata {
    pub mesh_codes: Vec<String>,
    pub dem_type: String,
}

impl RasterMetadata {
    pub fn from_mosaic(mosaic: &Mosaic) -> Self {
        Self {
            mesh_codes: mosaic.mesh_codes().iter().map(|c| c.to_string()).collect(),
            dem_type: mosaic.dem_type().to_string(),
        }
    }
}

/// Single band elevation, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRaster {
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
    pub metadata: RasterMetadata,
    pub values: Vec<f32>,
    pub nodata: f32,
}

impl ElevationRaster {
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.height && col < self.width).then(|| self.values[row * self.width + col])
    }
}

/// Three byte bands, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainRgbRaster {
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
    pub metadata: RasterMetadata,
    pub red: Vec<u8>,
    pub green: Vec<u8>,
    pub blue: Vec<u8>,
}

impl TerrainRgbRaster {
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        (row < self.height && col < self.width).then(|| {
            let i = row * self.width + col;
            [self.red[i], self.green[i], self.blue[i]]
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRaster {
    pub elevation: ElevationRaster,
    pub terrain_rgb: TerrainRgbRaster,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationEncoder {
    pub nodata: f32,
    pub rgb: TerrainRgbConfig,
}

impl Default for ElevationEncoder {
    fn default() -> Self {
        Self {
            nodata: DEFAULT_NODATA,
            rgb: TerrainRgbConfig::default(),
        }
    }
}

impl ElevationEncoder {
    pub fn new(rgb: TerrainRgbConfig) -> Self {
        Self {
            rgb,
            ..Default::default()
        }
    }

    pub fn elevation_raster(&self, mosaic: &Mosaic) -> ElevationRaster {
        let values = mosaic
            .values()
            .par_iter()
            .map(|s| s.value().unwrap_or(self.nodata))
            .collect();

        ElevationRaster {
            width: mosaic.cols(),
            height: mosaic.rows(),
            georef: GeoReference::from_mosaic(mosaic),
            metadata: RasterMetadata::from_mosaic(mosaic),
            values,
            nodata: self.nodata,
        }
    }

    pub fn terrain_rgb_raster(&self, mosaic: &Mosaic) -> Result<TerrainRgbRaster> {
        let (rows, cols) = mosaic.shape();

        if let Some((min, max)) = find_elevation_range(mosaic.values()) {
            info!("Elevation range: {} .. {}", min, max);
        }

        if self.rgb.out_of_range == OutOfRange::Clamp {
            let clamped = mosaic
                .values()
                .par_iter()
                .filter_map(|s| s.value())
                .filter(|&e| !self.rgb.is_encodable(e))
                .count();
            if clamped > 0 {
                warn!(
                    "{} pixels are outside [{}, {}] and were clamped",
                    clamped,
                    self.rgb.min_elevation(),
                    self.rgb.max_elevation()
                );
            }
        }

        let encoded: Vec<[u8; 3]> = mosaic
            .values()
            .par_iter()
            .map(|s| self.rgb.encode_sample(*s))
            .collect::<Result<_>>()?;

        let mut red = Vec::with_capacity(rows * cols);
        let mut green = Vec::with_capacity(rows * cols);
        let mut blue = Vec::with_capacity(rows * cols);
        for [r, g, b] in encoded {
            red.push(r);
            green.push(g);
            blue.push(b);
        }

        Ok(TerrainRgbRaster {
            width: cols,
            height: rows,
            georef: GeoReference::from_mosaic(mosaic),
            metadata: RasterMetadata::from_mosaic(mosaic),
            red,
            green,
            blue,
        })
    }

    /// Builds both rasters, or neither.
    pub fn encode(&self, mosaic: &Mosaic) -> Result<EncodedRaster> {
        let terrain_rgb = self.terrain_rgb_raster(mosaic)?;
        let elevation = self.elevation_raster(mosaic);
        Ok(EncodedRaster {
            elevation,
            terrain_rgb,
        })
    }
}
