//! JIS X 0410 standard regional mesh codes.
//!
//! FGD DEM documents are distributed per second-level mesh (6 digits, 5' x 7.5')
//! or per third-level mesh (8 digits, 30" x 45").

use std::fmt;
use std::str::FromStr;

use crate::error::{DemError, Result};
use crate::model::LatLng;

/// Mesh level of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshLevel {
    /// 2次メッシュ
    Second,
    /// 3次メッシュ
    Third,
}

impl MeshLevel {
    /// (lat, lon) extent of one mesh of this level, in degrees.
    pub fn extent(&self) -> (f64, f64) {
        match self {
            MeshLevel::Second => (1.0 / 12.0, 1.0 / 8.0),
            MeshLevel::Third => (1.0 / 120.0, 1.0 / 80.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshCode(String);

impl MeshCode {
    pub fn parse(text: &str) -> Result<Self> {
        let code = text.trim();

        if !(code.len() == 6 || code.len() == 8) || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DemError::Format(format!("Invalid mesh code: {:?}", code)));
        }

        let digits = code.as_bytes();
        // 2次メッシュの区画番号は0-7
        if digits[4] > b'7' || digits[5] > b'7' {
            return Err(DemError::Format(format!(
                "Invalid second level digits in mesh code: {}",
                code
            )));
        }

        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn level(&self) -> MeshLevel {
        if self.0.len() == 6 {
            MeshLevel::Second
        } else {
            MeshLevel::Third
        }
    }

    /// South-west corner of the mesh derived from the code alone.
    pub fn lower_left(&self) -> LatLng {
        let d: Vec<f64> = self.0.bytes().map(|b| (b - b'0') as f64).collect();

        let mut lat = (d[0] * 10.0 + d[1]) / 1.5;
        let mut lon = d[2] * 10.0 + d[3] + 100.0;

        lat += d[4] / 12.0;
        lon += d[5] / 8.0;

        if self.level() == MeshLevel::Third {
            lat += d[6] / 120.0;
            lon += d[7] / 80.0;
        }

        LatLng { lat, lon }
    }

    /// North-east corner of the mesh derived from the code alone.
    pub fn upper_right(&self) -> LatLng {
        let lower_left = self.lower_left();
        let (lat_extent, lon_extent) = self.level().extent();
        LatLng {
            lat: lower_left.lat + lat_extent,
            lon: lower_left.lon + lon_extent,
        }
    }
}

impl FromStr for MeshCode {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MeshCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
