use std::io::{Cursor, Write};

/// Builds an FGD DEM document with a `cols` x `rows` grid.
pub fn dem_xml(
    mesh: &str,
    lower_corner: (f64, f64),
    upper_corner: (f64, f64),
    cols: usize,
    rows: usize,
    tuples: &[String],
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Dataset xmlns="http://fgd.gsi.go.jp/spec/2008/FGD_GMLSchema" xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="Dataset1">
<description>基盤地図情報メタデータ ID=fmdid:15-3101</description>
<DEM gml:id="DEM001">
<fid>fgoid:10-00100-15-6441-{mesh}</fid>
<type>5mメッシュ（標高）</type>
<mesh>{mesh}</mesh>
<coverage gml:id="DEM001-3">
<gml:boundedBy>
<gml:Envelope srsName="fguuid:jgd2011.bl">
<gml:lowerCorner>{} {}</gml:lowerCorner>
<gml:upperCorner>{} {}</gml:upperCorner>
</gml:Envelope>
</gml:boundedBy>
<gml:gridDomain>
<gml:Grid dimension="2" gml:id="DEM001-4">
<gml:limits>
<gml:GridEnvelope>
<gml:low>0 0</gml:low>
<gml:high>{} {}</gml:high>
</gml:GridEnvelope>
</gml:limits>
<gml:axisLabels>x y</gml:axisLabels>
</gml:Grid>
</gml:gridDomain>
<gml:rangeSet>
<gml:DataBlock>
<gml:rangeParameters><gml:QuantityList uom="DEM構成点"></gml:QuantityList></gml:rangeParameters>
<gml:tupleList>
{}
</gml:tupleList>
</gml:DataBlock>
</gml:rangeSet>
<gml:coverageFunction>
<gml:GridFunction>
<gml:sequenceRule order="+x-y">Linear</gml:sequenceRule>
<gml:startPoint>0 0</gml:startPoint>
</gml:GridFunction>
</gml:coverageFunction>
</coverage>
</DEM>
</Dataset>
"#,
        lower_corner.0,
        lower_corner.1,
        upper_corner.0,
        upper_corner.1,
        cols - 1,
        rows - 1,
        tuples.join("\n"),
        mesh = mesh,
    )
}

/// `count` ground-surface points starting at `base` metres.
pub fn ground(count: usize, base: f32) -> Vec<String> {
    (0..count)
        .map(|i| format!("地表面,{:.2}", base + i as f32))
        .collect()
}

pub fn zip_of(entries: &[(&str, String)]) -> Vec<u8> {
    let mut zip_buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut zip_buffer));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    zip_buffer
}
