//! FGD DEM XML parser.
//!
//! Reads one `<DEM>` document (JPGIS / FGD GML schema) into a [`MeshCell`].
//! Elements are matched by local name, so the `gml:` and default namespace
//! prefixes are not significant.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::{DemError, Result};
use crate::mesh::MeshCode;
use crate::model::{LatLng, MeshCell, Metadata, Sample};

/// 欠測を表す値
pub const NODATA_MARKER: f32 = -9999.0;

const NO_DATA_KIND: &str = "データなし";
const SEA_SURFACE_KIND: &str = "海水面";
const JGD2011_IDENTIFIER: &str = "fguuid:jgd2011.bl";

/// Tolerance used when comparing the envelope with the mesh code corner.
const CORNER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Treat no-data sea surface points as elevation 0 instead of absent.
    pub sea_at_zero: bool,
    /// Accept a tuple list shorter than the grid and leave the tail absent.
    pub allow_short_tuple_list: bool,
    /// Grids with this many rows or columns or more are rejected before allocation.
    pub max_dimension: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sea_at_zero: false,
            allow_short_tuple_list: false,
            max_dimension: 32000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Mesh,
    DemType,
    LowerCorner,
    UpperCorner,
    High,
    StartPoint,
    TupleList,
}

#[derive(Debug, Default)]
struct RawDem {
    mesh: Option<String>,
    dem_type: Option<String>,
    crs_identifier: Option<String>,
    lower_corner: Option<String>,
    upper_corner: Option<String>,
    high: Option<String>,
    start_point: Option<String>,
    tuple_list: Option<String>,
}

impl RawDem {
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Mesh => &mut self.mesh,
            Field::DemType => &mut self.dem_type,
            Field::LowerCorner => &mut self.lower_corner,
            Field::UpperCorner => &mut self.upper_corner,
            Field::High => &mut self.high,
            Field::StartPoint => &mut self.start_point,
            Field::TupleList => &mut self.tuple_list,
        };
        // 最初に出現した要素を採用
        if slot.is_none() {
            *slot = Some(text);
        }
    }
}

fn field_for(name: &[u8], parent: Option<&[u8]>) -> Option<Field> {
    match (name, parent) {
        (b"mesh", Some(b"DEM")) => Some(Field::Mesh),
        (b"type", Some(b"DEM")) => Some(Field::DemType),
        (b"lowerCorner", Some(b"Envelope")) => Some(Field::LowerCorner),
        (b"upperCorner", Some(b"Envelope")) => Some(Field::UpperCorner),
        (b"high", Some(b"GridEnvelope")) => Some(Field::High),
        (b"startPoint", _) => Some(Field::StartPoint),
        (b"tupleList", _) => Some(Field::TupleList),
        _ => None,
    }
}

pub fn parse_dem_xml<R: BufRead>(reader: R) -> Result<MeshCell> {
    parse_dem_xml_with(reader, &ParseOptions::default())
}

pub fn parse_dem_xml_with<R: BufRead>(reader: R, options: &ParseOptions) -> Result<MeshCell> {
    let raw = read_raw_dem(reader)?;
    build_cell(raw, options)
}

fn read_raw_dem<R: BufRead>(reader: R) -> Result<RawDem> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut raw = RawDem::default();
    let mut current: Option<(Field, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();

                if name == b"Envelope" && raw.crs_identifier.is_none() {
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        if attr.key.local_name().as_ref() == b"srsName" {
                            raw.crs_identifier = Some(attr.unescape_value()?.into_owned());
                        }
                    }
                }

                let parent = stack.last().map(|p| p.as_slice());
                current = field_for(&name, parent).map(|field| (field, String::new()));
                stack.push(name);
            }
            Event::Empty(e) => {
                let parent = stack.last().map(|p| p.as_slice());
                if let Some(field) = field_for(e.local_name().as_ref(), parent) {
                    raw.set(field, String::new());
                }
            }
            Event::Text(e) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                stack.pop();
                if let Some((field, text)) = current.take() {
                    raw.set(field, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(raw)
}

fn required(value: Option<String>, element: &str) -> Result<String> {
    value.ok_or_else(|| DemError::Format(format!("<{}> is missing", element)))
}

fn parse_pair<T: std::str::FromStr>(text: &str, element: &str) -> Result<(T, T)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [a, b] => match (a.parse::<T>(), b.parse::<T>()) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            _ => Err(DemError::Format(format!(
                "<{}> must hold two numbers: {:?}",
                element, text
            ))),
        },
        _ => Err(DemError::Format(format!(
            "<{}> must hold two values: {:?}",
            element, text
        ))),
    }
}

fn parse_sample(line: &str, line_no: usize, options: &ParseOptions) -> Result<Sample> {
    let (kind, value) = line.split_once(',').ok_or_else(|| {
        DemError::Format(format!(
            "tupleList line {} is not \"<kind>,<value>\": {:?}",
            line_no, line
        ))
    })?;
    let kind = kind.trim();
    // NaNやinfは数値として解釈できても標高ではない
    let value = value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            DemError::Format(format!(
                "tupleList line {} has an invalid elevation: {:?}",
                line_no, line
            ))
        })?;

    if value == NODATA_MARKER || kind == NO_DATA_KIND {
        if options.sea_at_zero && kind == SEA_SURFACE_KIND {
            return Ok(Sample::Present(0.0));
        }
        return Ok(Sample::Absent);
    }

    Ok(Sample::Present(value))
}

/// Number of pixels along one axis from its `gml:high` index.
fn grid_length(high: usize, axis: &str, limit: usize) -> Result<usize> {
    match high.checked_add(1) {
        Some(length) if length < limit => Ok(length),
        _ => Err(DemError::Format(format!(
            "gml:high {} on the {} axis exceeds the {} pixel limit",
            high, axis, limit
        ))),
    }
}

fn build_cell(raw: RawDem, options: &ParseOptions) -> Result<MeshCell> {
    let mesh_code = MeshCode::parse(&required(raw.mesh, "mesh")?)?;

    let (lower_lat, lower_lon) =
        parse_pair::<f64>(&required(raw.lower_corner, "gml:lowerCorner")?, "gml:lowerCorner")?;
    let (upper_lat, upper_lon) =
        parse_pair::<f64>(&required(raw.upper_corner, "gml:upperCorner")?, "gml:upperCorner")?;
    let lower_left = LatLng {
        lat: lower_lat,
        lon: lower_lon,
    };
    let upper_right = LatLng {
        lat: upper_lat,
        lon: upper_lon,
    };

    // gml:highは最大インデックスなので+1する
    let (high_x, high_y) = parse_pair::<usize>(&required(raw.high, "gml:high")?, "gml:high")?;
    let cols = grid_length(high_x, "x", options.max_dimension)?;
    let rows = grid_length(high_y, "y", options.max_dimension)?;
    let total = rows.checked_mul(cols).ok_or_else(|| {
        DemError::Format(format!("{} x {} grid is too large", cols, rows))
    })?;

    let start_point = match raw.start_point {
        Some(text) => parse_pair::<usize>(&text, "gml:startPoint")?,
        None => (0, 0),
    };
    if start_point.0 >= cols || start_point.1 >= rows {
        return Err(DemError::Format(format!(
            "gml:startPoint {:?} lies outside the {} x {} grid",
            start_point, cols, rows
        )));
    }

    let tuple_list = required(raw.tuple_list, "gml:tupleList")?;
    let samples = tuple_list
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| parse_sample(line, i + 1, options))
        .collect::<Result<Vec<_>>>()?;

    // startPoint以前の点は欠測扱い
    let offset = start_point.1 * cols + start_point.0;
    let capacity = total - offset;
    if samples.len() > capacity
        || (samples.len() < capacity && !options.allow_short_tuple_list)
    {
        return Err(DemError::GridSize {
            mesh_code: mesh_code.to_string(),
            expected: capacity,
            found: samples.len(),
        });
    }
    if samples.len() < capacity {
        debug!(
            "Mesh {}: {} trailing points missing, filled as absent",
            mesh_code,
            capacity - samples.len()
        );
    }

    let mut values = vec![Sample::Absent; total];
    values[offset..offset + samples.len()].copy_from_slice(&samples);

    let expected_corner = mesh_code.lower_left();
    if (expected_corner.lat - lower_left.lat).abs() > CORNER_TOLERANCE
        || (expected_corner.lon - lower_left.lon).abs() > CORNER_TOLERANCE
    {
        warn!(
            "Envelope of mesh {} starts at ({}, {}) but the code implies ({}, {})",
            mesh_code, lower_left.lat, lower_left.lon, expected_corner.lat, expected_corner.lon
        );
    }

    let crs_identifier = raw.crs_identifier.unwrap_or_default();
    if crs_identifier != JGD2011_IDENTIFIER {
        warn!(
            "Mesh {}: unexpected CRS identifier {:?}, treating as JGD2011",
            mesh_code, crs_identifier
        );
    }

    debug!(
        "Parsed mesh {} ({} x {}, start {:?})",
        mesh_code, cols, rows, start_point
    );

    MeshCell::new(
        Metadata {
            mesh_code,
            dem_type: raw.dem_type.unwrap_or_default(),
            crs_identifier,
        },
        lower_left,
        upper_right,
        rows,
        cols,
        start_point,
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dem_xml(high: &str, start_point: &str, tuples: &[&str]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Dataset xmlns="http://fgd.gsi.go.jp/spec/2008/FGD_GMLSchema" xmlns:gml="http://www.opengis.net/gml/3.2">
<DEM gml:id="DEM001">
<type>10mメッシュ（標高）</type>
<mesh>644131</mesh>
<coverage gml:id="DEM001-3">
<gml:boundedBy>
<gml:Envelope srsName="fguuid:jgd2011.bl">
<gml:lowerCorner>42.916666667 141.125000000</gml:lowerCorner>
<gml:upperCorner>43.000000000 141.250000000</gml:upperCorner>
</gml:Envelope>
</gml:boundedBy>
<gml:gridDomain>
<gml:Grid dimension="2" gml:id="DEM001-4">
<gml:limits>
<gml:GridEnvelope>
<gml:low>0 0</gml:low>
<gml:high>{}</gml:high>
</gml:GridEnvelope>
</gml:limits>
</gml:Grid>
</gml:gridDomain>
<gml:rangeSet>
<gml:DataBlock>
<gml:tupleList>
{}
</gml:tupleList>
</gml:DataBlock>
</gml:rangeSet>
<gml:coverageFunction>
<gml:GridFunction>
<gml:sequenceRule order="+x-y">Linear</gml:sequenceRule>
<gml:startPoint>{}</gml:startPoint>
</gml:GridFunction>
</gml:coverageFunction>
</coverage>
</DEM>
</Dataset>
"#,
            high,
            tuples.join("\n"),
            start_point
        )
    }

    fn parse(xml: &str, options: &ParseOptions) -> Result<MeshCell> {
        parse_dem_xml_with(xml.as_bytes(), options)
    }

    #[test]
    fn test_parse_basic_document() {
        let xml = dem_xml(
            "2 1",
            "0 0",
            &[
                "地表面,10.5",
                "地表面,0.0",
                "地表面,-1.25",
                "地表面,20",
                "表層面,30.75",
                "地表面,40.",
            ],
        );
        let cell = parse(&xml, &ParseOptions::default()).unwrap();

        assert_eq!(cell.mesh_code().as_str(), "644131");
        assert_eq!(cell.metadata.dem_type, "10mメッシュ（標高）");
        assert_eq!(cell.metadata.crs_identifier, "fguuid:jgd2011.bl");
        assert_eq!(cell.shape(), (2, 3));
        assert_eq!(cell.lower_left, LatLng { lat: 42.916666667, lon: 141.125 });
        assert_eq!(cell.upper_right, LatLng { lat: 43.0, lon: 141.25 });
        assert_eq!(cell.values[0], Sample::Present(10.5));
        // 0mは有効な標高
        assert_eq!(cell.values[1], Sample::Present(0.0));
        assert_eq!(cell.values[2], Sample::Present(-1.25));
        assert_eq!(cell.values[5], Sample::Present(40.0));
    }

    #[test]
    fn test_nodata_markers_become_absent() {
        let xml = dem_xml(
            "1 1",
            "0 0",
            &["データなし,-9999.", "海水面,-9999.", "内水面,-9999.00", "地表面,5.0"],
        );
        let cell = parse(&xml, &ParseOptions::default()).unwrap();
        assert_eq!(
            cell.values,
            vec![Sample::Absent, Sample::Absent, Sample::Absent, Sample::Present(5.0)]
        );

        let options = ParseOptions {
            sea_at_zero: true,
            ..Default::default()
        };
        let cell = parse(&xml, &options).unwrap();
        assert_eq!(cell.values[0], Sample::Absent);
        assert_eq!(cell.values[1], Sample::Present(0.0));
        assert_eq!(cell.values[2], Sample::Absent);
    }

    #[test]
    fn test_start_point_offsets_samples() {
        let xml = dem_xml("1 1", "1 0", &["地表面,1.0", "地表面,2.0", "地表面,3.0"]);
        let cell = parse(&xml, &ParseOptions::default()).unwrap();
        assert_eq!(
            cell.values,
            vec![
                Sample::Absent,
                Sample::Present(1.0),
                Sample::Present(2.0),
                Sample::Present(3.0)
            ]
        );
        assert_eq!(cell.start_point, (1, 0));
    }

    #[test]
    fn test_sample_count_mismatch() {
        let short = dem_xml("1 1", "0 0", &["地表面,1.0", "地表面,2.0", "地表面,3.0"]);
        assert!(matches!(
            parse(&short, &ParseOptions::default()),
            Err(DemError::GridSize {
                expected: 4,
                found: 3,
                ..
            })
        ));

        let long = dem_xml(
            "1 1",
            "0 0",
            &["地表面,1", "地表面,2", "地表面,3", "地表面,4", "地表面,5"],
        );
        let lenient = ParseOptions {
            allow_short_tuple_list: true,
            ..Default::default()
        };
        assert!(matches!(
            parse(&long, &lenient),
            Err(DemError::GridSize {
                expected: 4,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_short_tuple_list_allowed() {
        let xml = dem_xml("1 1", "0 0", &["地表面,1.0", "地表面,2.0"]);
        let options = ParseOptions {
            allow_short_tuple_list: true,
            ..Default::default()
        };
        let cell = parse(&xml, &options).unwrap();
        assert_eq!(cell.values[1], Sample::Present(2.0));
        assert_eq!(cell.values[2], Sample::Absent);
        assert_eq!(cell.values[3], Sample::Absent);
    }

    #[test]
    fn test_missing_elements() {
        let xml = dem_xml("1 1", "0 0", &["地表面,1.0"; 4]).replace("<mesh>644131</mesh>", "");
        assert!(matches!(
            parse(&xml, &ParseOptions::default()),
            Err(DemError::Format(_))
        ));

        let xml = dem_xml("1 1", "0 0", &["地表面,1.0"; 4]).replace(
            "<gml:lowerCorner>42.916666667 141.125000000</gml:lowerCorner>",
            "",
        );
        assert!(matches!(
            parse(&xml, &ParseOptions::default()),
            Err(DemError::Format(_))
        ));
    }

    #[test]
    fn test_malformed_values() {
        let xml = dem_xml("1", "0 0", &["地表面,1.0"; 4]);
        assert!(matches!(
            parse(&xml, &ParseOptions::default()),
            Err(DemError::Format(_))
        ));

        let xml = dem_xml("1 1", "0 0", &["地表面,1.0", "地表面,abc", "地表面,1", "地表面,1"]);
        assert!(matches!(
            parse(&xml, &ParseOptions::default()),
            Err(DemError::Format(_))
        ));

        let xml = dem_xml("1 1", "2 0", &["地表面,1.0"; 2]);
        assert!(matches!(
            parse(&xml, &ParseOptions::default()),
            Err(DemError::Format(_))
        ));
    }

    #[test]
    fn test_non_finite_elevation() {
        for value in ["NaN", "inf", "-infinity"] {
            let line = format!("地表面,{}", value);
            let xml = dem_xml("1 1", "0 0", &["地表面,1.0", line.as_str(), "地表面,1", "地表面,1"]);
            assert!(
                matches!(parse(&xml, &ParseOptions::default()), Err(DemError::Format(_))),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_oversized_grid() {
        let lenient = ParseOptions {
            allow_short_tuple_list: true,
            ..Default::default()
        };

        // 加算・乗算が桁あふれする値と、確保前に上限で弾く値
        for high in ["18446744073709551615 0", "4294967296 4294967296", "39999 39999"] {
            let xml = dem_xml(high, "0 0", &["地表面,1.0"]);
            assert!(
                matches!(parse(&xml, &lenient), Err(DemError::Format(_))),
                "gml:high {} should be rejected",
                high
            );
        }

        let small = ParseOptions {
            max_dimension: 2,
            ..Default::default()
        };
        let xml = dem_xml("1 1", "0 0", &["地表面,1.0"; 4]);
        assert!(matches!(parse(&xml, &small), Err(DemError::Format(_))));
        let xml = dem_xml("0 0", "0 0", &["地表面,1.0"]);
        assert_eq!(parse(&xml, &small).unwrap().shape(), (1, 1));
    }

    #[test]
    fn test_broken_xml() {
        let xml = "<Dataset><DEM><mesh>644131</DEM></Dataset>";
        assert!(parse(xml, &ParseOptions::default()).is_err());
    }
}
