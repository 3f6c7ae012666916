//! Convert GSI Fundamental Geospatial Data (FGD) DEM XML into an elevation
//! raster and a Terrain-RGB raster.
//!
//! Input documents come from an `.xml` file, a directory or a `.zip` archive.
//! Every mesh cell found is merged into one [`Mosaic`] before encoding.

pub mod dataset;
pub mod encoder;
pub mod error;
pub mod mesh;
pub mod model;
pub mod mosaic;
pub mod parser;
pub mod source;
pub mod terrain_rgb;
pub mod writer;
pub mod zip_handler;

pub use dataset::{DatasetOptions, DemDataset};
pub use encoder::{
    ElevationEncoder, ElevationRaster, EncodedRaster, GeoReference, RasterMetadata,
    TerrainRgbRaster,
};
pub use error::{DemError, Result};
pub use mesh::{MeshCode, MeshLevel};
pub use model::{BoundsLatLng, LatLng, MeshCell, Metadata, Sample};
pub use mosaic::{Mosaic, MosaicOptions};
pub use parser::ParseOptions;
pub use source::{DocumentSource, NamedDocument};
pub use terrain_rgb::{OutOfRange, TerrainRgbConfig};
#[cfg(feature = "gdal")]
pub use writer::GeoTiffWriter;
pub use writer::RasterSink;
pub use zip_handler::ZipHandler;
