use anyhow::{Context, Result};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use std::path::Path;

use super::RasterSink;
use crate::encoder::{ElevationRaster, GeoReference, RasterMetadata, TerrainRgbRaster};

/// Writes rasters as GeoTIFF through GDAL.
#[derive(Default)]
pub struct GeoTiffWriter {}

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self {}
    }

    fn set_georeference(&self, dataset: &mut Dataset, georef: &GeoReference) -> Result<()> {
        // ジオトランスフォームを設定
        dataset
            .set_geo_transform(&georef.geo_transform)
            .context("Failed to set geo transform")?;

        // 座標系を設定
        let srs = SpatialRef::from_epsg(georef.epsg)
            .context(format!("Failed to create SpatialRef from EPSG:{}", georef.epsg))?;
        let wkt = srs
            .to_wkt()
            .context("Failed to convert SpatialRef to WKT")?;
        dataset
            .set_projection(&wkt)
            .context("Failed to set projection")?;

        Ok(())
    }

    fn set_metadata(&self, dataset: &mut Dataset, metadata: &RasterMetadata) -> Result<()> {
        // メタデータを設定
        dataset
            .set_metadata_item("MESHCODE", &metadata.mesh_codes.join(","), "")
            .context("Failed to set meshcode metadata")?;
        dataset
            .set_metadata_item("DEM_TYPE", &metadata.dem_type, "")
            .context("Failed to set dem_type metadata")?;
        Ok(())
    }

    fn write_band<T: gdal::raster::GdalType + Copy>(
        &self,
        dataset: &mut Dataset,
        index: usize,
        cols: usize,
        rows: usize,
        data: Vec<T>,
    ) -> Result<()> {
        let mut band = dataset
            .rasterband(index)
            .context(format!("Failed to get raster band {}", index))?;
        let mut buffer = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &mut buffer)
            .context(format!("Failed to write band {}", index))?;
        Ok(())
    }
}

impl RasterSink for GeoTiffWriter {
    fn write_elevation(&self, raster: &ElevationRaster, output_path: &Path) -> Result<()> {
        let (cols, rows) = (raster.width, raster.height);

        tracing::info!("Writing elevation GeoTIFF: {} x {} pixels", cols, rows);

        // GTiffドライバーを取得
        let driver =
            DriverManager::get_driver_by_name("GTiff").context("Failed to get GTiff driver")?;

        let mut dataset = driver
            .create_with_band_type::<f32, _>(output_path, cols, rows, 1)
            .context("Failed to create dataset")?;

        self.set_georeference(&mut dataset, &raster.georef)?;
        self.set_metadata(&mut dataset, &raster.metadata)?;

        // NoData値を設定
        {
            let mut band = dataset.rasterband(1).context("Failed to get raster band")?;
            band.set_no_data_value(Some(raster.nodata as f64))
                .context("Failed to set no data value")?;
        }

        // データを書き込み（GDALは行優先順を期待）
        self.write_band(&mut dataset, 1, cols, rows, raster.values.clone())?;

        Ok(())
    }

    fn write_terrain_rgb(&self, raster: &TerrainRgbRaster, output_path: &Path) -> Result<()> {
        let (cols, rows) = (raster.width, raster.height);

        tracing::info!("Writing Terrain-RGB GeoTIFF: {} x {} pixels", cols, rows);

        let driver =
            DriverManager::get_driver_by_name("GTiff").context("Failed to get GTiff driver")?;

        // 8-bit RGB GeoTIFFを作成
        let mut dataset = driver
            .create_with_band_type::<u8, _>(output_path, cols, rows, 3)
            .context("Failed to create dataset")?;

        self.set_georeference(&mut dataset, &raster.georef)?;
        self.set_metadata(&mut dataset, &raster.metadata)?;

        self.write_band(&mut dataset, 1, cols, rows, raster.red.clone())?;
        self.write_band(&mut dataset, 2, cols, rows, raster.green.clone())?;
        self.write_band(&mut dataset, 3, cols, rows, raster.blue.clone())?;

        Ok(())
    }
}
