use crate::error::{DemError, Result};
use crate::model::Sample;

/// RGB written for absent pixels.
///
/// It decodes to `encoded == 0`, which is kept out of the valid range.
pub const NODATA_RGB: [u8; 3] = [0, 0, 0];

const MIN_ENCODED: i64 = 1;
const MAX_ENCODED: i64 = 0xFF_FFFF;

/// What to do with an elevation that does not fit in 24 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfRange {
    /// Fail the conversion with [`DemError::EncodingRange`].
    #[default]
    Fail,
    /// Clamp to the nearest encodable elevation.
    Clamp,
}

/// Quantization constants for Terrain-RGB.
///
/// `elevation = base_elevation + encoded * interval`. The default is the
/// Mapbox Terrain-RGB calibration (-10000 m, 0.1 m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainRgbConfig {
    pub base_elevation: f64,
    pub interval: f64,
    pub out_of_range: OutOfRange,
}

impl Default for TerrainRgbConfig {
    fn default() -> Self {
        Self {
            base_elevation: -10000.0,
            interval: 0.1,
            out_of_range: OutOfRange::Fail,
        }
    }
}

impl TerrainRgbConfig {
    /// Lowest elevation with its own code.
    pub fn min_elevation(&self) -> f64 {
        self.base_elevation + MIN_ENCODED as f64 * self.interval
    }

    /// Highest elevation with its own code.
    pub fn max_elevation(&self) -> f64 {
        self.base_elevation + MAX_ENCODED as f64 * self.interval
    }

    fn quantize(&self, elevation: f32) -> i64 {
        ((elevation as f64 - self.base_elevation) / self.interval).round() as i64
    }

    pub fn is_encodable(&self, elevation: f32) -> bool {
        !elevation.is_nan() && (MIN_ENCODED..=MAX_ENCODED).contains(&self.quantize(elevation))
    }

    pub fn encode(&self, elevation: f32) -> Result<[u8; 3]> {
        let mut encoded = self.quantize(elevation);

        if elevation.is_nan() || !(MIN_ENCODED..=MAX_ENCODED).contains(&encoded) {
            match self.out_of_range {
                OutOfRange::Fail => {
                    return Err(DemError::EncodingRange {
                        elevation,
                        min: self.min_elevation(),
                        max: self.max_elevation(),
                    })
                }
                OutOfRange::Clamp => {
                    encoded = if elevation.is_nan() {
                        MIN_ENCODED
                    } else {
                        encoded.clamp(MIN_ENCODED, MAX_ENCODED)
                    };
                }
            }
        }

        let r = ((encoded >> 16) & 0xFF) as u8;
        let g = ((encoded >> 8) & 0xFF) as u8;
        let b = (encoded & 0xFF) as u8;

        Ok([r, g, b])
    }

    pub fn encode_sample(&self, sample: Sample) -> Result<[u8; 3]> {
        match sample {
            Sample::Present(elevation) => self.encode(elevation),
            Sample::Absent => Ok(NODATA_RGB),
        }
    }

    /// `None` for [`NODATA_RGB`].
    pub fn decode(&self, rgb: [u8; 3]) -> Option<f64> {
        let [r, g, b] = rgb;
        let encoded = ((r as i64) << 16) | ((g as i64) << 8) | (b as i64);

        if encoded < MIN_ENCODED {
            return None;
        }

        Some(self.base_elevation + encoded as f64 * self.interval)
    }
}

/// Encodes with the default Mapbox calibration.
pub fn elevation_to_rgb(elevation: f32) -> Result<(u8, u8, u8)> {
    let [r, g, b] = TerrainRgbConfig::default().encode(elevation)?;
    Ok((r, g, b))
}

pub fn rgb_to_elevation(r: u8, g: u8, b: u8) -> Option<f32> {
    TerrainRgbConfig::default()
        .decode([r, g, b])
        .map(|e| e as f32)
}

/// (min, max) over present samples.
pub fn find_elevation_range(samples: &[Sample]) -> Option<(f32, f32)> {
    samples
        .iter()
        .filter_map(|s| s.value())
        .fold(None, |range, value| match range {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(config: &TerrainRgbConfig, elevation: f32) {
        let rgb = config.encode(elevation).unwrap();
        assert_ne!(rgb, NODATA_RGB, "elevation {} hit the nodata code", elevation);

        let decoded = config.decode(rgb).unwrap();
        let diff = (decoded - elevation as f64).abs();
        assert!(
            diff <= config.interval / 2.0 + 1e-6,
            "Elevation {} decoded to {} (diff: {})",
            elevation,
            decoded,
            diff
        );
    }

    #[test]
    fn test_elevation_rgb_conversion() {
        let config = TerrainRgbConfig::default();
        for elevation in [0.0, 0.04, 100.0, 1000.0, 3776.24, 8848.0] {
            assert_round_trip(&config, elevation);
        }
    }

    #[test]
    fn test_negative_elevation_handling() {
        let config = TerrainRgbConfig::default();
        for elevation in [-1000.0, -500.0, -10.0, -0.07, -9999.9] {
            assert_round_trip(&config, elevation);
        }
    }

    #[test]
    fn test_round_trip_across_range() {
        let config = TerrainRgbConfig::default();
        let max = config.max_elevation() as f32;
        let mut elevation = -9999.0f32;
        while elevation < max {
            assert_round_trip(&config, elevation);
            elevation += 373.13;
        }
    }

    #[test]
    fn test_range_edges() {
        let config = TerrainRgbConfig::default();
        let min = config.min_elevation() as f32;
        let max = config.max_elevation() as f32;
        assert_eq!(max, 1_667_721.5);

        assert_round_trip(&config, min);
        assert_round_trip(&config, max);
        assert_eq!(config.encode(min).unwrap(), [0, 0, 1]);
        assert_eq!(config.encode(max).unwrap(), [0xFF, 0xFF, 0xFF]);

        // 両端のすぐ外側
        for elevation in [-9999.96, 1_667_721.75] {
            assert!(!config.is_encodable(elevation));
            assert!(matches!(
                config.encode(elevation),
                Err(DemError::EncodingRange { .. })
            ));
        }
    }

    #[test]
    fn test_known_encodings() {
        // 0m -> 100000 = 0x0186A0
        assert_eq!(elevation_to_rgb(0.0).unwrap(), (0x01, 0x86, 0xA0));
        assert_eq!(rgb_to_elevation(0x01, 0x86, 0xA0), Some(0.0));
        assert_eq!(rgb_to_elevation(0, 0, 0), None);
    }

    #[test]
    fn test_zero_is_not_nodata() {
        let config = TerrainRgbConfig::default();
        assert_ne!(config.encode(0.0).unwrap(), NODATA_RGB);
        assert_eq!(config.encode_sample(Sample::Absent).unwrap(), NODATA_RGB);
        assert_eq!(config.decode(NODATA_RGB), None);
    }

    #[test]
    fn test_out_of_range_fails() {
        let config = TerrainRgbConfig::default();
        assert!(matches!(
            config.encode(-10000.0),
            Err(DemError::EncodingRange { .. })
        ));
        assert!(matches!(
            config.encode(2_000_000.0),
            Err(DemError::EncodingRange { .. })
        ));
        assert!(!config.is_encodable(-20000.0));
        assert!(config.is_encodable(-9999.9));
    }

    #[test]
    fn test_out_of_range_clamps() {
        let config = TerrainRgbConfig {
            out_of_range: OutOfRange::Clamp,
            ..Default::default()
        };
        assert_eq!(config.encode(-20000.0).unwrap(), [0, 0, 1]);
        assert_eq!(config.encode(2_000_000.0).unwrap(), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_custom_precision() {
        let config = TerrainRgbConfig {
            base_elevation: -100.0,
            interval: 0.01,
            out_of_range: OutOfRange::Fail,
        };
        assert_round_trip(&config, 12.345);
        assert_round_trip(&config, -99.99);
    }

    #[test]
    fn test_find_elevation_range() {
        let samples = [
            Sample::Absent,
            Sample::Present(12.0),
            Sample::Present(-3.5),
            Sample::Present(7.0),
        ];
        assert_eq!(find_elevation_range(&samples), Some((-3.5, 12.0)));
        assert_eq!(find_elevation_range(&[Sample::Absent]), None);
    }
}
