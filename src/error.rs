use std::path::PathBuf;
use thiserror::Error;

/// DEM変換で発生するエラー
#[derive(Error, Debug)]
pub enum DemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML read error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// 必須要素の欠落や不正な値
    #[error("Invalid DEM XML: {0}")]
    Format(String),

    #[error("Sample count mismatch for mesh {mesh_code}: expected {expected}, found {found}")]
    GridSize {
        mesh_code: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "Pixel size of mesh {mesh_code} ({found_lon}, {found_lat}) differs from reference ({expected_lon}, {expected_lat})"
    )]
    InconsistentResolution {
        mesh_code: String,
        expected_lon: f64,
        expected_lat: f64,
        found_lon: f64,
        found_lat: f64,
    },

    #[error("Second and third level meshes are mixed: {second} and {third}")]
    MixedMeshLevel { second: String, third: String },

    #[error("No mesh cells to merge")]
    EmptyInput,

    #[error("No XML files found in {0}")]
    NoXmlFound(PathBuf),

    #[error("Image size is too large: {cols} x {rows} (limit {limit})")]
    ImageTooLarge {
        cols: usize,
        rows: usize,
        limit: usize,
    },

    #[error("Elevation {elevation} is outside the Terrain-RGB range [{min}, {max}]")]
    EncodingRange { elevation: f32, min: f64, max: f64 },

    #[error("Input must be .xml, .zip or a directory: {0}")]
    UnsupportedInput(PathBuf),
}

pub type Result<T> = std::result::Result<T, DemError>;
