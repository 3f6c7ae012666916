use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info};

use crate::encoder::{ElevationEncoder, ElevationRaster, EncodedRaster, TerrainRgbRaster};
use crate::error::{DemError, Result};
use crate::mesh::MeshCode;
use crate::model::{BoundsLatLng, MeshCell};
use crate::mosaic::{Mosaic, MosaicOptions};
use crate::parser::{parse_dem_xml_with, ParseOptions};
use crate::source::{open_source, DocumentSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetOptions {
    pub parse: ParseOptions,
    pub mosaic: MosaicOptions,
    pub encoder: ElevationEncoder,
}

/// All mesh cells found under one input, merged into a single mosaic.
///
/// Read-only once opened.
///
/// ```ignore
/// use fgd_dem::DemDataset;
///
/// let dataset = DemDataset::open("FG-GML-6441-31-DEM10B.zip")?;
/// println!("{:?}", dataset.bounds_latlng());
/// let elevation = dataset.to_elevation_raster();
/// let terrain_rgb = dataset.to_terrain_rgb_raster()?;
/// ```
#[derive(Debug, Clone)]
pub struct DemDataset {
    location: PathBuf,
    mosaic: Mosaic,
    encoder: ElevationEncoder,
}

impl DemDataset {
    /// Opens an `.xml` file, a `.zip` archive or a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &DatasetOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &DatasetOptions) -> Result<Self> {
        let source = open_source(path.as_ref())?;
        Self::from_source(&*source, options)
    }

    pub fn from_source(source: &dyn DocumentSource, options: &DatasetOptions) -> Result<Self> {
        let mut documents = source.documents()?;
        if documents.is_empty() {
            return Err(DemError::NoXmlFound(source.location().to_path_buf()));
        }

        // ファイル名順に並べて結合結果を決定的にする
        documents.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            "Parsing {} XML documents from {}",
            documents.len(),
            source.location().display()
        );

        let results: Vec<Result<MeshCell>> = documents
            .par_iter()
            .map(|doc| {
                parse_dem_xml_with(doc.bytes.as_slice(), &options.parse).inspect_err(|e| {
                    error!("Failed to parse {}: {}", doc.name, e);
                })
            })
            .collect();

        // 名前順で最初のエラーを返す
        let cells = results.into_iter().collect::<Result<Vec<_>>>()?;

        let mosaic = Mosaic::merge(cells, &options.mosaic)?;

        Ok(Self {
            location: source.location().to_path_buf(),
            mosaic,
            encoder: options.encoder,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Lower-left and upper-right corners of the merged area.
    pub fn bounds_latlng(&self) -> BoundsLatLng {
        self.mosaic.bounds()
    }

    pub fn mosaic(&self) -> &Mosaic {
        &self.mosaic
    }

    pub fn mesh_codes(&self) -> &[MeshCode] {
        self.mosaic.mesh_codes()
    }

    pub fn has_elevation(&self) -> bool {
        self.mosaic.has_elevation()
    }

    pub fn to_elevation_raster(&self) -> ElevationRaster {
        self.encoder.elevation_raster(&self.mosaic)
    }

    pub fn to_terrain_rgb_raster(&self) -> Result<TerrainRgbRaster> {
        self.encoder.terrain_rgb_raster(&self.mosaic)
    }

    /// Both rasters; fails before producing either if encoding fails.
    pub fn encode(&self) -> Result<EncodedRaster> {
        self.encoder.encode(&self.mosaic)
    }
}
