use anyhow::Result;
use std::path::Path;

use crate::encoder::{ElevationRaster, TerrainRgbRaster};

#[cfg(feature = "gdal")]
mod geotiff;

#[cfg(feature = "gdal")]
pub use geotiff::GeoTiffWriter;

/// Persists encoded rasters.
pub trait RasterSink {
    fn write_elevation(&self, raster: &ElevationRaster, output_path: &Path) -> Result<()>;

    fn write_terrain_rgb(&self, raster: &TerrainRgbRaster, output_path: &Path) -> Result<()>;
}
